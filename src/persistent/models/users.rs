use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::api::err::{Error, Reason};
use crate::api::identity::Role;
use crate::persistent::schema::{submissions, users};

#[derive(Clone, Debug, PartialEq, Queryable, Identifiable)]
pub struct User {
    pub id: i32,
    pub user_name: String,
    pub email: Option<String>,
    pub user_role: Role,
    pub age: Option<i32>,
    pub college: Option<String>,
    pub department: Option<String>,
    pub profile_image_url: Option<String>,
    pub created_time: NaiveDateTime,
    pub updated_time: NaiveDateTime,
}

impl User {
    /// Age, college and department are all filled in
    pub fn is_profile_complete(&self) -> bool {
        self.age.is_some() && self.college.is_some() && self.department.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user_role == Role::Admin
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub user_name: String,
    pub email: Option<String>,
    pub user_role: Role,
    pub created_time: NaiveDateTime,
    pub updated_time: NaiveDateTime,
}

#[derive(AsChangeset)]
#[diesel(table_name = users)]
pub struct ProfileForm {
    pub age: Option<i32>,
    pub college: Option<String>,
    pub department: Option<String>,
    pub profile_image_url: Option<String>,
    pub updated_time: NaiveDateTime,
}

/// Get user id by username
pub fn get_id_by_username(conn: &mut SqliteConnection, name: &str) -> Result<Option<i32>, Error> {
    use self::users::dsl::*;

    let uid: Option<i32> = users
        .select(id)
        .filter(user_name.eq(name))
        .first(conn)
        .optional()?;

    Ok(uid)
}

/// Insert a user, the username must be unused
pub fn new_user(conn: &mut SqliteConnection, form: NewUser) -> Result<User, Error> {
    use self::users::dsl::*;

    // Name check, insert and read back all happen under the write lock
    conn.immediate_transaction(|conn| {
        if get_id_by_username(conn, &form.user_name)?.is_some() {
            return Err(Error::new(
                Reason::InvalidArgument,
                format!("Username '{}' already exists.", form.user_name),
            ));
        }

        diesel::insert_into(users).values(form).execute(conn)?;

        Ok(users.order(id.desc()).first(conn)?)
    })
}

/// Update profile fields of a user
pub fn update_profile(
    conn: &mut SqliteConnection,
    uid: i32,
    form: ProfileForm,
) -> Result<User, Error> {
    use self::users::dsl::*;

    let updated = diesel::update(users.find(uid)).set(form).execute(conn)?;
    if updated == 0 {
        return Err(Error::new(Reason::NotFound, format!("User {uid} not found.")));
    }

    get_user(conn, uid)
}

/// Get user by id
pub fn get_user(conn: &mut SqliteConnection, uid: i32) -> Result<User, Error> {
    use self::users::dsl::*;

    users
        .find(uid)
        .first(conn)
        .optional()?
        .ok_or_else(|| Error::new(Reason::NotFound, format!("User {uid} not found.")))
}

/// Get all users, newest first
pub fn get_users(conn: &mut SqliteConnection) -> Result<Vec<User>, Error> {
    use self::users::dsl::*;

    Ok(users.order((created_time.desc(), id.desc())).load(conn)?)
}

/// Delete a user together with their submissions
pub fn delete_user(conn: &mut SqliteConnection, uid: i32) -> Result<(), Error> {
    conn.immediate_transaction(|conn| {
        diesel::delete(submissions::table.filter(submissions::user_id.eq(uid))).execute(conn)?;
        let deleted = diesel::delete(users::table.find(uid)).execute(conn)?;
        if deleted == 0 {
            return Err(Error::new(Reason::NotFound, format!("User {uid} not found.")));
        }
        Ok(())
    })
}
