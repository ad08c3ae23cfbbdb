use actix_web::{
    delete, get, post, put,
    web::{Data, Json, Path},
    HttpResponse,
};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::err::{Error, Reason};
use super::identity::{Caller, Role};
use crate::broadcast::Hub;
use crate::persistent::{models, DbPool};

const MIN_AGE: i32 = 16;
const MAX_AGE: i32 = 100;

#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub age: Option<i32>,
    pub college: Option<String>,
    pub department: Option<String>,
    pub profile_image_url: Option<String>,
    pub profile_complete: bool,
    #[serde(serialize_with = "super::serialize_date_time")]
    pub created_time: NaiveDateTime,
}

impl From<models::User> for User {
    fn from(user: models::User) -> Self {
        Self {
            profile_complete: user.is_profile_complete(),
            id: user.id,
            name: user.user_name,
            email: user.email,
            role: user.user_role,
            age: user.age,
            college: user.college,
            department: user.department,
            profile_image_url: user.profile_image_url,
            created_time: user.created_time,
        }
    }
}

#[derive(Deserialize)]
pub struct Registration {
    name: String,
    email: Option<String>,
}

#[derive(Deserialize)]
pub struct Profile {
    pub age: i32,
    pub college: String,
    pub department: String,
    pub profile_image_url: Option<String>,
}

impl Profile {
    /// Check bounds and trim text fields
    pub fn validate(self) -> Result<Self, Error> {
        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            return Err(Error::new(
                Reason::InvalidArgument,
                format!("Age must be between {MIN_AGE} and {MAX_AGE}"),
            ));
        }
        let college = self.college.trim().to_string();
        if college.chars().count() < 2 {
            return Err(Error::new(
                Reason::InvalidArgument,
                "College name required".to_string(),
            ));
        }
        let department = self.department.trim().to_string();
        if department.chars().count() < 2 {
            return Err(Error::new(
                Reason::InvalidArgument,
                "Department required".to_string(),
            ));
        }
        Ok(Self {
            college,
            department,
            ..self
        })
    }
}

#[post("/users")]
/// Register a new user
pub async fn new_user(
    registration: Json<Registration>,
    pool: Data<DbPool>,
) -> Result<HttpResponse, Error> {
    const TARGET: &str = "POST /users";
    log::info!(target: TARGET, "Request received");

    let Registration { name, email } = registration.into_inner();
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(Error::new(
            Reason::InvalidArgument,
            "Username must not be empty".to_string(),
        ));
    }

    let conn = &mut super::connection(&pool).await?;
    let now = Utc::now().naive_utc();
    let user = models::new_user(
        conn,
        models::NewUser {
            user_name: name,
            email,
            user_role: Role::User,
            created_time: now,
            updated_time: now,
        },
    )?;
    log::info!(target: TARGET, "User {} created", user.id);

    log::info!(target: TARGET, "Request done");
    Ok(HttpResponse::Created().json(User::from(user)))
}

#[get("/users/me")]
pub async fn get_me(caller: Caller, pool: Data<DbPool>) -> Result<Json<User>, Error> {
    const TARGET: &str = "GET /users/me";
    log::info!(target: TARGET, "Request received");

    let conn = &mut super::connection(&pool).await?;
    let user = caller.user(conn)?;

    log::info!(target: TARGET, "Request done");
    Ok(Json(user.into()))
}

#[put("/profile")]
pub async fn update_profile(
    profile: Json<Profile>,
    caller: Caller,
    pool: Data<DbPool>,
) -> Result<Json<User>, Error> {
    const TARGET: &str = "PUT /profile";
    log::info!(target: TARGET, "Request received");

    let profile = profile.into_inner().validate().map_err(|err| {
        log::info!(target: TARGET, "Invalid profile: {err}");
        err
    })?;

    let conn = &mut super::connection(&pool).await?;
    let user = caller.user(conn)?;
    let user = models::update_profile(
        conn,
        user.id,
        models::ProfileForm {
            age: Some(profile.age),
            college: Some(profile.college),
            department: Some(profile.department),
            profile_image_url: profile.profile_image_url,
            updated_time: Utc::now().naive_utc(),
        },
    )?;

    log::info!(target: TARGET, "Request done");
    Ok(Json(user.into()))
}

#[get("/users")]
pub async fn get_users(caller: Caller, pool: Data<DbPool>) -> Result<Json<Vec<User>>, Error> {
    const TARGET: &str = "GET /users";
    log::info!(target: TARGET, "Request received");

    let conn = &mut super::connection(&pool).await?;
    caller.admin(conn)?;
    let users = models::get_users(conn)?;

    log::info!(target: TARGET, "Request done");
    Ok(Json(users.into_iter().map(|user| user.into()).collect()))
}

#[delete("/users/{id}")]
pub async fn delete_user(
    id: Path<i32>,
    caller: Caller,
    hub: Data<Hub>,
    pool: Data<DbPool>,
) -> Result<HttpResponse, Error> {
    const TARGET: &str = "DELETE /users/{id}";
    log::info!(target: TARGET, "Request received");

    let id = id.into_inner();
    let conn = &mut super::connection(&pool).await?;
    let admin = caller.admin(conn)?;
    if admin.id == id {
        log::info!(target: TARGET, "Admin {id} tried to delete themselves");
        return Err(Error::new(
            Reason::InvalidState,
            "You cannot delete yourself.".to_string(),
        ));
    }
    models::delete_user(conn, id)?;
    log::info!(target: TARGET, "User {id} deleted");
    super::leaderboard::announce(TARGET, conn, &hub)?;

    log::info!(target: TARGET, "Request done");
    Ok(HttpResponse::NoContent().finish())
}
