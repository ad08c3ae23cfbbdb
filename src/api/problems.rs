use actix_web::{
    delete, get, post, put,
    web::{Data, Json, Path},
    HttpResponse,
};
use chrono::{NaiveDateTime, Utc};
use diesel::SqliteConnection;
use serde::{Deserialize, Serialize};

use super::err::{Error, Reason};
use super::identity::Caller;
use crate::broadcast::Hub;
use crate::persistent::{models, DbPool};

fn get_default_marks() -> i32 {
    25
}

fn get_default_hidden() -> bool {
    true
}

#[derive(Clone, Debug, Serialize)]
pub struct Problem {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub constraints: String,
    pub sample_input: String,
    pub sample_output: String,
    pub marks: i32,
    #[serde(serialize_with = "super::serialize_date_time")]
    pub created_time: NaiveDateTime,
}

impl From<models::Problem> for Problem {
    fn from(problem: models::Problem) -> Self {
        Self {
            id: problem.id,
            title: problem.title,
            description: problem.description,
            constraints: problem.constraints,
            sample_input: problem.sample_input,
            sample_output: problem.sample_output,
            marks: problem.marks,
            created_time: problem.created_time,
        }
    }
}

/// A test case as shown to contestants
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TestCase {
    pub id: i32,
    pub input: String,
    pub expected_output: String,
    pub is_hidden: bool,
}

impl From<models::TestCase> for TestCase {
    fn from(case: models::TestCase) -> Self {
        if case.is_hidden {
            Self {
                id: case.id,
                input: "Hidden".to_string(),
                expected_output: "Hidden".to_string(),
                is_hidden: true,
            }
        } else {
            Self {
                id: case.id,
                input: case.input,
                expected_output: case.expected_output,
                is_hidden: false,
            }
        }
    }
}

#[derive(Serialize)]
pub struct ProblemDetail {
    #[serde(flatten)]
    pub problem: Problem,
    pub test_cases: Vec<TestCase>,
}

#[derive(Clone, Deserialize)]
pub struct CaseForm {
    pub input: String,
    pub expected_output: String,
    #[serde(default = "get_default_hidden")]
    pub is_hidden: bool,
}

impl From<CaseForm> for models::CaseForm {
    fn from(case: CaseForm) -> Self {
        Self {
            input: case.input,
            expected_output: case.expected_output,
            is_hidden: case.is_hidden,
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct ProblemForm {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub constraints: String,
    #[serde(default)]
    pub sample_input: String,
    #[serde(default)]
    pub sample_output: String,
    #[serde(default = "get_default_marks")]
    pub marks: i32,
    #[serde(default)]
    pub test_cases: Vec<CaseForm>,
}

#[derive(Deserialize)]
pub struct ProblemUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub constraints: Option<String>,
    pub sample_input: Option<String>,
    pub sample_output: Option<String>,
    pub marks: Option<i32>,
    /// Replaces every existing test case when present
    pub test_cases: Option<Vec<CaseForm>>,
}

fn check_title(title: &str) -> Result<(), Error> {
    if title.trim().is_empty() {
        return Err(Error::new(
            Reason::InvalidArgument,
            "Title must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn check_marks(marks: i32) -> Result<(), Error> {
    if marks < 0 {
        return Err(Error::new(
            Reason::InvalidArgument,
            format!("Marks must not be negative: {marks}"),
        ));
    }
    Ok(())
}

/// Insert a problem described by `form`
pub fn create(conn: &mut SqliteConnection, form: ProblemForm) -> Result<models::Problem, Error> {
    check_title(&form.title)?;
    check_marks(form.marks)?;

    models::new_problem(
        conn,
        models::NewProblem {
            title: form.title,
            description: form.description,
            constraints: form.constraints,
            sample_input: form.sample_input,
            sample_output: form.sample_output,
            marks: form.marks,
            created_time: Utc::now().naive_utc(),
        },
        form.test_cases.into_iter().map(|case| case.into()).collect(),
    )
}

#[get("/problems")]
pub async fn get_problems(
    caller: Caller,
    pool: Data<DbPool>,
) -> Result<Json<Vec<Problem>>, Error> {
    const TARGET: &str = "GET /problems";
    log::info!(target: TARGET, "Request received");

    let conn = &mut super::connection(&pool).await?;
    caller.user(conn)?;
    let problems = models::get_problems(conn)?;

    log::info!(target: TARGET, "Request done");
    Ok(Json(problems.into_iter().map(|p| p.into()).collect()))
}

#[get("/problems/{id}")]
pub async fn get_problem(
    id: Path<i32>,
    caller: Caller,
    pool: Data<DbPool>,
) -> Result<Json<ProblemDetail>, Error> {
    const TARGET: &str = "GET /problems/{id}";
    log::info!(target: TARGET, "Request received");

    let id = id.into_inner();
    let conn = &mut super::connection(&pool).await?;
    caller.user(conn)?;
    let problem = models::get_problem(conn, id).map_err(|err| {
        log::info!(target: TARGET, "No such problem: {id}");
        err
    })?;
    let test_cases = models::get_test_cases(conn, id)?;

    log::info!(target: TARGET, "Request done");
    Ok(Json(ProblemDetail {
        problem: problem.into(),
        test_cases: test_cases.into_iter().map(|case| case.into()).collect(),
    }))
}

#[post("/problems")]
pub async fn new_problem(
    form: Json<ProblemForm>,
    caller: Caller,
    pool: Data<DbPool>,
) -> Result<HttpResponse, Error> {
    const TARGET: &str = "POST /problems";
    log::info!(target: TARGET, "Request received");

    let conn = &mut super::connection(&pool).await?;
    caller.admin(conn)?;
    let problem = create(conn, form.into_inner())?;
    log::info!(target: TARGET, "Problem {} created", problem.id);

    log::info!(target: TARGET, "Request done");
    Ok(HttpResponse::Created().json(Problem::from(problem)))
}

#[put("/problems/{id}")]
pub async fn update_problem(
    id: Path<i32>,
    update: Json<ProblemUpdate>,
    caller: Caller,
    pool: Data<DbPool>,
) -> Result<Json<Problem>, Error> {
    const TARGET: &str = "PUT /problems/{id}";
    log::info!(target: TARGET, "Request received");

    let id = id.into_inner();
    let update = update.into_inner();
    if let Some(title) = &update.title {
        check_title(title)?;
    }
    if let Some(marks) = update.marks {
        check_marks(marks)?;
    }

    let conn = &mut super::connection(&pool).await?;
    caller.admin(conn)?;
    let problem = models::update_problem(
        conn,
        id,
        models::ProblemChanges {
            title: update.title,
            description: update.description,
            constraints: update.constraints,
            sample_input: update.sample_input,
            sample_output: update.sample_output,
            marks: update.marks,
        },
        update
            .test_cases
            .map(|cases| cases.into_iter().map(|case| case.into()).collect()),
    )?;
    log::info!(target: TARGET, "Problem {id} updated");

    log::info!(target: TARGET, "Request done");
    Ok(Json(problem.into()))
}

#[delete("/problems/{id}")]
pub async fn delete_problem(
    id: Path<i32>,
    caller: Caller,
    hub: Data<Hub>,
    pool: Data<DbPool>,
) -> Result<HttpResponse, Error> {
    const TARGET: &str = "DELETE /problems/{id}";
    log::info!(target: TARGET, "Request received");

    let id = id.into_inner();
    let conn = &mut super::connection(&pool).await?;
    caller.admin(conn)?;
    models::delete_problem(conn, id)?;
    log::info!(target: TARGET, "Problem {id} deleted");
    super::leaderboard::announce(TARGET, conn, &hub)?;

    log::info!(target: TARGET, "Request done");
    Ok(HttpResponse::NoContent().finish())
}
