use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use diesel::{
    backend::Backend,
    deserialize::FromSql,
    serialize::{IsNull, Output, ToSql},
    sql_types::Integer,
    sqlite::Sqlite,
    AsExpression, FromSqlRow, SqliteConnection,
};
use serde::{Deserialize, Serialize};

use super::err::{Error, Reason};
use crate::persistent::models::{self, User};

/// Header carrying the id of the authenticated user
pub const USER_HEADER: &str = "X-User-Id";

#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Integer)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl ToSql<Integer, Sqlite> for Role
where
    i32: ToSql<Integer, Sqlite>,
{
    fn to_sql<'a>(&'a self, out: &mut Output<'a, '_, Sqlite>) -> diesel::serialize::Result {
        out.set_value(*self as i32);
        Ok(IsNull::No)
    }
}

impl<DB> FromSql<Integer, DB> for Role
where
    DB: Backend,
    i32: FromSql<Integer, DB>,
{
    fn from_sql(bytes: DB::RawValue<'_>) -> diesel::deserialize::Result<Self> {
        match i32::from_sql(bytes)? {
            0 => Ok(Role::User),
            1 => Ok(Role::Admin),
            x => Err(format!("Unrecognized enum variant {x}").into()),
        }
    }
}

/// Id of the user making the request, taken from the `X-User-Id` header
#[derive(Clone, Copy, Debug)]
pub struct Caller(pub i32);

impl Caller {
    /// Load the calling user; unknown ids are treated as unauthenticated
    pub fn user(&self, conn: &mut SqliteConnection) -> Result<User, Error> {
        models::get_user(conn, self.0).map_err(|err| match err.reason {
            Reason::NotFound => Error::new(Reason::Unauthorized, "Unknown user.".to_string()),
            _ => err,
        })
    }

    /// Load the calling user and make sure they are an administrator
    pub fn admin(&self, conn: &mut SqliteConnection) -> Result<User, Error> {
        let user = self.user(conn)?;
        if !user.is_admin() {
            return Err(Error::new(
                Reason::Forbidden,
                "Admin access required".to_string(),
            ));
        }
        Ok(user)
    }
}

impl FromRequest for Caller {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let id = req
            .headers()
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i32>().ok());
        ready(match id {
            Some(id) => Ok(Caller(id)),
            None => Err(Error::new(
                Reason::Unauthorized,
                "Unauthorized".to_string(),
            )),
        })
    }
}
