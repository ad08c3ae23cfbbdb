use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::api::err::{Error, Reason};
use crate::persistent::schema::{problems, submissions, test_cases};

#[derive(Clone, Debug, PartialEq, Queryable, Identifiable)]
pub struct Problem {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub constraints: String,
    pub sample_input: String,
    pub sample_output: String,
    pub marks: i32,
    pub created_time: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = problems)]
pub struct NewProblem {
    pub title: String,
    pub description: String,
    pub constraints: String,
    pub sample_input: String,
    pub sample_output: String,
    pub marks: i32,
    pub created_time: NaiveDateTime,
}

/// Partial update of a problem, `None` fields are left untouched
#[derive(Default, AsChangeset)]
#[diesel(table_name = problems)]
pub struct ProblemChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub constraints: Option<String>,
    pub sample_input: Option<String>,
    pub sample_output: Option<String>,
    pub marks: Option<i32>,
}

impl ProblemChanges {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.constraints.is_none()
            && self.sample_input.is_none()
            && self.sample_output.is_none()
            && self.marks.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Queryable, Identifiable)]
pub struct TestCase {
    pub id: i32,
    pub problem_id: i32,
    pub input: String,
    pub expected_output: String,
    pub is_hidden: bool,
}

/// A test case not yet attached to a problem
#[derive(Clone, Debug)]
pub struct CaseForm {
    pub input: String,
    pub expected_output: String,
    pub is_hidden: bool,
}

#[derive(Insertable)]
#[diesel(table_name = test_cases)]
struct NewTestCase {
    problem_id: i32,
    input: String,
    expected_output: String,
    is_hidden: bool,
}

fn insert_cases(
    conn: &mut SqliteConnection,
    pid: i32,
    cases: Vec<CaseForm>,
) -> Result<(), Error> {
    let rows: Vec<NewTestCase> = cases
        .into_iter()
        .map(|case| NewTestCase {
            problem_id: pid,
            input: case.input,
            expected_output: case.expected_output,
            is_hidden: case.is_hidden,
        })
        .collect();
    if !rows.is_empty() {
        diesel::insert_into(test_cases::table)
            .values(rows)
            .execute(conn)?;
    }
    Ok(())
}

/// Get problems count
pub fn problems_count(conn: &mut SqliteConnection) -> Result<i64, Error> {
    use self::problems::dsl::*;

    Ok(problems.count().get_result(conn)?)
}

/// Get problem by id
pub fn get_problem(conn: &mut SqliteConnection, pid: i32) -> Result<Problem, Error> {
    use self::problems::dsl::*;

    problems
        .find(pid)
        .first(conn)
        .optional()?
        .ok_or_else(|| Error::new(Reason::NotFound, format!("Problem {pid} not found.")))
}

/// Get all problems, newest first
pub fn get_problems(conn: &mut SqliteConnection) -> Result<Vec<Problem>, Error> {
    use self::problems::dsl::*;

    Ok(problems.order((created_time.desc(), id.desc())).load(conn)?)
}

/// Get the test cases of a problem in insertion order
pub fn get_test_cases(conn: &mut SqliteConnection, pid: i32) -> Result<Vec<TestCase>, Error> {
    use self::test_cases::dsl::*;

    Ok(test_cases
        .filter(problem_id.eq(pid))
        .order(id.asc())
        .load(conn)?)
}

/// Insert a problem along with its test cases
pub fn new_problem(
    conn: &mut SqliteConnection,
    form: NewProblem,
    cases: Vec<CaseForm>,
) -> Result<Problem, Error> {
    conn.immediate_transaction(|conn| {
        diesel::insert_into(problems::table)
            .values(form)
            .execute(conn)?;
        let problem: Problem = problems::table.order(problems::id.desc()).first(conn)?;
        insert_cases(conn, problem.id, cases)?;
        Ok(problem)
    })
}

/// Update a problem; when `cases` is given, they replace the existing test cases
pub fn update_problem(
    conn: &mut SqliteConnection,
    pid: i32,
    changes: ProblemChanges,
    cases: Option<Vec<CaseForm>>,
) -> Result<Problem, Error> {
    conn.immediate_transaction(|conn| {
        // Make sure it exists before touching anything
        get_problem(conn, pid)?;

        if !changes.is_empty() {
            diesel::update(problems::table.find(pid))
                .set(changes)
                .execute(conn)?;
        }
        if let Some(cases) = cases {
            diesel::delete(test_cases::table.filter(test_cases::problem_id.eq(pid)))
                .execute(conn)?;
            insert_cases(conn, pid, cases)?;
        }
        get_problem(conn, pid)
    })
}

/// Delete a problem, its test cases and its submissions
pub fn delete_problem(conn: &mut SqliteConnection, pid: i32) -> Result<(), Error> {
    conn.immediate_transaction(|conn| {
        diesel::delete(test_cases::table.filter(test_cases::problem_id.eq(pid))).execute(conn)?;
        diesel::delete(submissions::table.filter(submissions::problem_id.eq(pid)))
            .execute(conn)?;
        let deleted = diesel::delete(problems::table.find(pid)).execute(conn)?;
        if deleted == 0 {
            return Err(Error::new(Reason::NotFound, format!("Problem {pid} not found.")));
        }
        Ok(())
    })
}
