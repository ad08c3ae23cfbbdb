use actix_web::web::{self, Data, JsonConfig, PathConfig, ServiceConfig};
use chrono::{NaiveDateTime, SecondsFormat};
use serde::Serializer;

use crate::persistent::{DbConn, DbPool};

pub mod identity;
pub mod leaderboard;
pub mod problems;
pub mod submissions;
pub mod users;

pub mod err;

#[cfg(test)]
mod tests;

use err::{Error, Reason};

/// Register every endpoint of the service
pub fn routes(cfg: &mut ServiceConfig) {
    // Config parameter extractor so that we return a unified JSON response when argument is invalid
    let path_cfg = PathConfig::default()
        .error_handler(|err, _| Error::new(Reason::InvalidArgument, err.to_string()).into());
    let json_cfg = JsonConfig::default()
        .error_handler(|err, _| Error::new(Reason::InvalidArgument, err.to_string()).into());

    cfg.app_data(path_cfg)
        .app_data(json_cfg)
        .service(users::new_user)
        .service(users::get_me)
        .service(users::update_profile)
        .service(users::get_users)
        .service(users::delete_user)
        .service(problems::get_problems)
        .service(problems::get_problem)
        .service(problems::new_problem)
        .service(problems::update_problem)
        .service(problems::delete_problem)
        .service(submissions::run)
        .service(submissions::submit)
        .service(submissions::get_submissions)
        .service(submissions::get_submission)
        .service(leaderboard::get_leaderboard)
        .service(leaderboard::events);
}

/// Check a connection out of the pool without blocking the worker
async fn connection(pool: &Data<DbPool>) -> Result<DbConn, Error> {
    let pool = pool.clone();
    Ok(web::block(move || pool.get()).await??)
}

fn serialize_date_time<S>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(dt.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true).as_str())
}
