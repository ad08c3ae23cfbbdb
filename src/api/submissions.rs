use actix_web::{
    get, post,
    web::{self, Data, Json, Path},
    HttpResponse,
};
use chrono::{NaiveDateTime, Utc};
use diesel::{
    backend::Backend,
    deserialize::FromSql,
    serialize::{IsNull, Output, ToSql},
    sql_types::Integer,
    sqlite::Sqlite,
    AsExpression, FromSqlRow,
};
use serde::{Deserialize, Serialize};

use super::err::{Error, Reason};
use super::identity::Caller;
use crate::broadcast::{Event, Hub};
use crate::config::{Config, Language};
use crate::executor::Executor;
use crate::judge::{self, CaseReport};
use crate::persistent::{models, DbPool};
use crate::ranking;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Integer)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Fail,
    Pass,
}

impl ToSql<Integer, Sqlite> for SubmissionStatus
where
    i32: ToSql<Integer, Sqlite>,
{
    fn to_sql<'a>(&'a self, out: &mut Output<'a, '_, Sqlite>) -> diesel::serialize::Result {
        out.set_value(*self as i32);
        Ok(IsNull::No)
    }
}

impl<DB> FromSql<Integer, DB> for SubmissionStatus
where
    DB: Backend,
    i32: FromSql<Integer, DB>,
{
    fn from_sql(bytes: DB::RawValue<'_>) -> diesel::deserialize::Result<Self> {
        match i32::from_sql(bytes)? {
            0 => Ok(SubmissionStatus::Fail),
            1 => Ok(SubmissionStatus::Pass),
            x => Err(format!("Unrecognized enum variant {x}").into()),
        }
    }
}

/// Code sent for grading
#[derive(Clone, Deserialize)]
pub struct Attempt {
    pub code: String,
    pub language: String,
    pub problem_id: i32,
}

#[derive(Clone, Debug, Serialize)]
pub struct Submission {
    pub id: i32,
    pub user_id: i32,
    pub problem_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem_title: Option<String>,
    pub code: String,
    pub language: String,
    pub status: SubmissionStatus,
    pub score: i32,
    pub output: Option<String>,
    #[serde(serialize_with = "super::serialize_date_time")]
    pub created_time: NaiveDateTime,
}

impl From<models::Submission> for Submission {
    fn from(submission: models::Submission) -> Self {
        Self {
            id: submission.id,
            user_id: submission.user_id,
            problem_id: submission.problem_id,
            problem_title: None,
            code: submission.code,
            language: submission.lang,
            status: submission.status,
            score: submission.score,
            output: submission.output,
            created_time: submission.created_time,
        }
    }
}

#[derive(Serialize)]
pub struct RunResponse {
    pub status: SubmissionStatus,
    pub results: Vec<CaseReport>,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub submission: Submission,
    pub results: Vec<CaseReport>,
}

/// Everything needed to grade an attempt
struct Prepared {
    user: models::User,
    lang: Language,
    problem: models::Problem,
    cases: Vec<models::TestCase>,
}

async fn prepare(
    target: &str,
    attempt: &Attempt,
    caller: Caller,
    config: &Config,
    pool: &Data<DbPool>,
) -> Result<Prepared, Error> {
    let lang = match config.get_lang(&attempt.language) {
        Some(lang) => lang.clone(),
        None => {
            log::info!(target: target, "No such language: {}", attempt.language);
            return Err(Error::new(
                Reason::NotFound,
                format!("No such language: {}", attempt.language),
            ));
        }
    };

    // Dropped on return, before any remote execution
    let conn = &mut super::connection(pool).await?;
    let user = caller.user(conn)?;
    let problem = models::get_problem(conn, attempt.problem_id).map_err(|err| {
        log::info!(target: target, "No such problem: {}", attempt.problem_id);
        err
    })?;
    let cases = models::get_test_cases(conn, problem.id)?;

    Ok(Prepared {
        user,
        lang,
        problem,
        cases,
    })
}

#[post("/run")]
/// Grade code against a problem without recording a submission
pub async fn run(
    attempt: Json<Attempt>,
    caller: Caller,
    config: Data<Config>,
    executor: Data<dyn Executor>,
    pool: Data<DbPool>,
) -> Result<Json<RunResponse>, Error> {
    const TARGET: &str = "POST /run";
    log::info!(target: TARGET, "Request received");

    let attempt = attempt.into_inner();
    let prepared = prepare(TARGET, &attempt, caller, &config, &pool).await?;

    log::info!(target: TARGET, "Judging started");
    let grade = judge::grade(
        executor.get_ref(),
        &prepared.lang,
        &attempt.code,
        &prepared.cases,
    )
    .await?;
    log::info!(target: TARGET, "Judging ended, result: {:?}", grade.status());

    log::info!(target: TARGET, "Request done");
    Ok(Json(RunResponse {
        status: grade.status(),
        results: grade.results,
    }))
}

#[post("/submissions")]
/// Grade code, record the submission and announce leaderboard changes
pub async fn submit(
    attempt: Json<Attempt>,
    caller: Caller,
    config: Data<Config>,
    executor: Data<dyn Executor>,
    hub: Data<Hub>,
    pool: Data<DbPool>,
) -> Result<HttpResponse, Error> {
    const TARGET: &str = "POST /submissions";
    log::info!(target: TARGET, "Request received");

    let attempt = attempt.into_inner();
    let prepared = prepare(TARGET, &attempt, caller, &config, &pool).await?;
    if !prepared.user.is_admin() && !prepared.user.is_profile_complete() {
        log::info!(target: TARGET, "User {} has an incomplete profile", prepared.user.id);
        return Err(Error::new(
            Reason::InvalidState,
            "Complete your profile before submitting.".to_string(),
        ));
    }

    log::info!(target: TARGET, "Judging started");
    let grade = judge::grade(
        executor.get_ref(),
        &prepared.lang,
        &attempt.code,
        &prepared.cases,
    )
    .await?;
    log::info!(target: TARGET, "Judging ended, result: {:?}", grade.status());

    let status = grade.status();
    let form = models::NewSubmission {
        user_id: prepared.user.id,
        problem_id: prepared.problem.id,
        code: attempt.code,
        lang: attempt.language,
        status,
        // Points are awarded only when every case passed
        score: match status {
            SubmissionStatus::Pass => prepared.problem.marks,
            SubmissionStatus::Fail => 0,
        },
        output: Some(grade.summary()),
        created_time: Utc::now().naive_utc(),
    };

    let pool = pool.clone();
    let (submission, board) = web::block(move || -> Result<_, Error> {
        let mut conn = pool.get()?;
        let submission = models::new_submission(&mut conn, form)?;
        let board = match submission.status {
            SubmissionStatus::Pass => Some(ranking::leaderboard(&mut conn)?),
            SubmissionStatus::Fail => None,
        };
        Ok((submission, board))
    })
    .await??;
    log::info!(target: TARGET, "Submission {} added", submission.id);

    if let Some(board) = board {
        let receivers = hub.publish(Event::LeaderboardUpdated(board));
        log::info!(target: TARGET, "Leaderboard sent to {receivers} client(s)");
    }

    let mut submission = Submission::from(submission);
    submission.problem_title = Some(prepared.problem.title);

    log::info!(target: TARGET, "Request done");
    Ok(HttpResponse::Created().json(SubmitResponse {
        submission,
        results: grade.results,
    }))
}

#[get("/submissions")]
/// Submissions of the caller, newest first
pub async fn get_submissions(
    caller: Caller,
    pool: Data<DbPool>,
) -> Result<Json<Vec<Submission>>, Error> {
    const TARGET: &str = "GET /submissions";
    log::info!(target: TARGET, "Request received");

    let pool = pool.clone();
    let submissions = web::block(move || -> Result<_, Error> {
        let mut conn = pool.get()?;
        let user = caller.user(&mut conn)?;
        models::get_submissions_for_user(&mut conn, user.id)
    })
    .await??;

    log::info!(target: TARGET, "Request done");
    Ok(Json(
        submissions
            .into_iter()
            .map(|(submission, title)| Submission {
                problem_title: Some(title),
                ..Submission::from(submission)
            })
            .collect(),
    ))
}

#[get("/submissions/{id}")]
pub async fn get_submission(
    id: Path<i32>,
    caller: Caller,
    pool: Data<DbPool>,
) -> Result<Json<Submission>, Error> {
    const TARGET: &str = "GET /submissions/{id}";
    log::info!(target: TARGET, "Request received");

    let id = id.into_inner();
    let conn = &mut super::connection(&pool).await?;
    let user = caller.user(conn)?;
    let submission = models::get_submission(conn, id)?;
    // Other users' submissions are only visible to admins
    if submission.user_id != user.id && !user.is_admin() {
        log::info!(target: TARGET, "User {} may not read submission {id}", user.id);
        return Err(Error::new(
            Reason::NotFound,
            format!("Submission {id} not found."),
        ));
    }

    log::info!(target: TARGET, "Request done");
    Ok(Json(submission.into()))
}
