use chrono::NaiveDateTime;
use diesel::dsl::max;
use diesel::prelude::*;

use crate::api::err::{Error, Reason};
use crate::api::submissions::SubmissionStatus;
use crate::persistent::schema::{problems, submissions};

#[derive(Clone, Debug, PartialEq, Queryable, Identifiable)]
pub struct Submission {
    pub id: i32,
    pub user_id: i32,
    pub problem_id: i32,
    pub code: String,
    pub lang: String,
    pub status: SubmissionStatus,
    pub score: i32,
    pub output: Option<String>,
    pub created_time: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = submissions)]
pub struct NewSubmission {
    pub user_id: i32,
    pub problem_id: i32,
    pub code: String,
    pub lang: String,
    pub status: SubmissionStatus,
    pub score: i32,
    pub output: Option<String>,
    pub created_time: NaiveDateTime,
}

/// Best score of a user on a problem among passing submissions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BestScore {
    pub user_id: i32,
    pub problem_id: i32,
    pub score: i32,
}

/// Add a new submission to the database
pub fn new_submission(
    conn: &mut SqliteConnection,
    form: NewSubmission,
) -> Result<Submission, Error> {
    use self::submissions::dsl::*;

    conn.immediate_transaction(|conn| {
        diesel::insert_into(submissions).values(form).execute(conn)?;
        Ok(submissions.order(id.desc()).first(conn)?)
    })
}

/// Get specific submission
pub fn get_submission(conn: &mut SqliteConnection, sid: i32) -> Result<Submission, Error> {
    use self::submissions::dsl::*;

    submissions
        .find(sid)
        .first(conn)
        .optional()?
        .ok_or_else(|| Error::new(Reason::NotFound, format!("Submission {sid} not found.")))
}

/// Submissions of a user with the title of their problem, newest first
pub fn get_submissions_for_user(
    conn: &mut SqliteConnection,
    uid: i32,
) -> Result<Vec<(Submission, String)>, Error> {
    Ok(submissions::table
        .inner_join(problems::table)
        .filter(submissions::user_id.eq(uid))
        .order((submissions::created_time.desc(), submissions::id.desc()))
        .select((submissions::all_columns, problems::title))
        .load(conn)?)
}

/// Best passing score for every (user, problem) pair that has one
pub fn get_best_scores(conn: &mut SqliteConnection) -> Result<Vec<BestScore>, Error> {
    use self::submissions::dsl::*;

    let rows: Vec<(i32, i32, Option<i32>)> = submissions
        .filter(status.eq(SubmissionStatus::Pass))
        .group_by((user_id, problem_id))
        .select((user_id, problem_id, max(score)))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(uid, pid, best)| BestScore {
            user_id: uid,
            problem_id: pid,
            score: best.unwrap_or_default(),
        })
        .collect())
}
