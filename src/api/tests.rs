use std::sync::Arc;

use actix_web::{
    http::StatusCode,
    test::{self, TestRequest},
    web::Data,
    App,
};
use assert_json_diff::assert_json_include;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use super::identity::USER_HEADER;
use super::routes;
use crate::broadcast::{Event, Hub};
use crate::config::{self, Config, Language};
use crate::executor::{Executor, Outcome};
use crate::persistent::{self, DbPool};

const ROOT: i32 = 1;

/// `echo` prints its input, `crash` dies, anything else prints itself
struct Mirror;

#[async_trait]
impl Executor for Mirror {
    async fn execute(&self, _: &Language, code: &str, stdin: &str) -> Outcome {
        match code {
            "echo" => Outcome::Output(stdin.trim().to_string()),
            "crash" => Outcome::RuntimeError("boom".to_string()),
            other => Outcome::Output(other.to_string()),
        }
    }
}

fn config() -> Config {
    Config {
        server: config::Server::default(),
        database: ":memory:".to_string(),
        executor: config::Executor::default(),
        languages: vec![Language {
            name: "python".to_string(),
            runtime: "python".to_string(),
            file_name: "main.py".to_string(),
        }],
        problems: vec![],
    }
}

fn pool() -> DbPool {
    // A single connection so every checkout sees the same in-memory database
    let pool = persistent::create_pool(":memory:", 1).unwrap();
    persistent::run_migrations(&pool).unwrap();
    pool
}

macro_rules! app {
    ($pool:expr, $hub:expr) => {
        test::init_service(
            App::new()
                .app_data(Data::new(config()))
                .app_data(Data::new($pool.clone()))
                .app_data(Data::from(Arc::new(Mirror) as Arc<dyn Executor>))
                .app_data($hub.clone())
                .configure(routes),
        )
        .await
    };
}

fn as_user(req: TestRequest, id: i32) -> TestRequest {
    req.insert_header((USER_HEADER, id.to_string()))
}

macro_rules! call {
    ($app:expr, $req:expr) => {{
        let resp = test::call_service(&$app, $req.to_request()).await;
        let status = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }};
}

fn echo_problem(marks: i32) -> Value {
    json!({
        "title": "Echo",
        "description": "Print what you read",
        "sample_input": "1",
        "sample_output": "1",
        "marks": marks,
        "test_cases": [
            { "input": "1", "expected_output": "1", "is_hidden": false },
            { "input": "secret", "expected_output": "secret" }
        ]
    })
}

/// Register a user with a complete profile and return their id
macro_rules! contestant {
    ($app:expr, $name:expr) => {{
        let (status, user) = call!(
            $app,
            TestRequest::post().uri("/users").set_json(json!({ "name": $name }))
        );
        assert_eq!(status, StatusCode::CREATED);
        let id = user["id"].as_i64().unwrap() as i32;
        let (status, _) = call!(
            $app,
            as_user(TestRequest::put().uri("/profile"), id).set_json(json!({
                "age": 20, "college": "MIT", "department": "CS"
            }))
        );
        assert_eq!(status, StatusCode::OK);
        id
    }};
}

macro_rules! problem {
    ($app:expr, $marks:expr) => {{
        let (status, problem) = call!(
            $app,
            as_user(TestRequest::post().uri("/problems"), ROOT).set_json(echo_problem($marks))
        );
        assert_eq!(status, StatusCode::CREATED);
        problem["id"].as_i64().unwrap()
    }};
}

#[actix_web::test]
async fn registration_and_profile() {
    let pool = pool();
    let hub = Data::new(Hub::new(16));
    let app = app!(pool, hub);

    let (status, user) = call!(
        app,
        TestRequest::post()
            .uri("/users")
            .set_json(json!({ "name": "alice", "email": "alice@example.com" }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_json_include!(
        actual: user.clone(),
        expected: json!({ "id": 2, "name": "alice", "role": "User", "profile_complete": false })
    );

    let (status, err) = call!(
        app,
        TestRequest::post().uri("/users").set_json(json!({ "name": "alice" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["reason"], "ERR_INVALID_ARGUMENT");

    let (status, _) = call!(
        app,
        as_user(TestRequest::put().uri("/profile"), 2)
            .set_json(json!({ "age": 12, "college": "MIT", "department": "CS" }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, me) = call!(
        app,
        as_user(TestRequest::put().uri("/profile"), 2)
            .set_json(json!({ "age": 19, "college": " MIT ", "department": "CS" }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_json_include!(
        actual: me,
        expected: json!({ "age": 19, "college": "MIT", "profile_complete": true })
    );

    let (status, err) = call!(app, TestRequest::get().uri("/users/me"));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["code"], 4);

    let (status, _) = call!(app, as_user(TestRequest::get().uri("/users/me"), 99));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn only_admins_manage_problems() {
    let pool = pool();
    let hub = Data::new(Hub::new(16));
    let app = app!(pool, hub);
    let mut watcher = hub.clone().into_inner().subscribe();
    assert_eq!(watcher.next().await, Some(Event::ActiveUsers(1)));
    let alice = contestant!(app, "alice");

    let (status, err) = call!(
        app,
        as_user(TestRequest::post().uri("/problems"), alice).set_json(echo_problem(25))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["reason"], "ERR_FORBIDDEN");

    let (status, _) = call!(app, as_user(TestRequest::get().uri("/users"), alice));
    assert_eq!(status, StatusCode::FORBIDDEN);

    let id = problem!(app, 30);

    let (status, detail) = call!(
        app,
        as_user(TestRequest::get().uri(&format!("/problems/{id}")), alice)
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["title"], "Echo");
    assert_eq!(detail["marks"], 30);
    assert_json_include!(
        actual: detail["test_cases"].clone(),
        expected: json!([
            { "input": "1", "expected_output": "1", "is_hidden": false },
            { "input": "Hidden", "expected_output": "Hidden", "is_hidden": true }
        ])
    );

    // Replacing test cases and renaming
    let (status, updated) = call!(
        app,
        as_user(TestRequest::put().uri(&format!("/problems/{id}")), ROOT).set_json(json!({
            "title": "Echo II",
            "test_cases": [ { "input": "2", "expected_output": "2", "is_hidden": false } ]
        }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Echo II");
    assert_eq!(updated["marks"], 30);
    let (_, detail) = call!(
        app,
        as_user(TestRequest::get().uri(&format!("/problems/{id}")), alice)
    );
    assert_eq!(detail["test_cases"].as_array().unwrap().len(), 1);

    let (status, _) = call!(
        app,
        as_user(TestRequest::put().uri(&format!("/problems/{id}")), ROOT)
            .set_json(json!({ "marks": -1 }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        as_user(TestRequest::delete().uri(&format!("/problems/{id}")), ROOT).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(matches!(
        watcher.next().await,
        Some(Event::LeaderboardUpdated(board)) if board.len() == 2
    ));

    let (status, err) = call!(
        app,
        as_user(TestRequest::get().uri(&format!("/problems/{id}")), alice)
    );
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["reason"], "ERR_NOT_FOUND");
}

#[actix_web::test]
async fn run_grades_without_recording() {
    let pool = pool();
    let hub = Data::new(Hub::new(16));
    let app = app!(pool, hub);
    let alice = contestant!(app, "alice");
    let id = problem!(app, 25);

    let (status, body) = call!(
        app,
        as_user(TestRequest::post().uri("/run"), alice)
            .set_json(json!({ "code": "echo", "language": "python", "problem_id": id }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "status": "pass",
            "results": [
                { "passed": true, "input": "1", "expected_output": "1", "actual_output": "1", "is_hidden": false },
                { "passed": true, "input": "Hidden", "expected_output": "Hidden", "actual_output": "Hidden", "is_hidden": true }
            ]
        })
    );

    let (_, body) = call!(
        app,
        as_user(TestRequest::post().uri("/run"), alice)
            .set_json(json!({ "code": "1", "language": "python", "problem_id": id }))
    );
    assert_eq!(body["status"], "fail");
    assert_eq!(body["results"][0]["passed"], true);
    assert_eq!(body["results"][1]["actual_output"], "Incorrect");

    let (_, body) = call!(
        app,
        as_user(TestRequest::post().uri("/run"), alice)
            .set_json(json!({ "code": "crash", "language": "python", "problem_id": id }))
    );
    assert_eq!(body["status"], "fail");
    assert_eq!(body["results"][0]["error"], "Runtime Error:\nboom");
    assert_eq!(body["results"][1]["error"], "Runtime Error");

    let (status, _) = call!(
        app,
        as_user(TestRequest::post().uri("/run"), alice)
            .set_json(json!({ "code": "echo", "language": "cobol", "problem_id": id }))
    );
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call!(
        app,
        as_user(TestRequest::post().uri("/run"), alice)
            .set_json(json!({ "code": "echo", "language": "python", "problem_id": 404 }))
    );
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, submissions) = call!(app, as_user(TestRequest::get().uri("/submissions"), alice));
    assert_eq!(submissions, json!([]));
}

#[actix_web::test]
async fn submissions_feed_the_leaderboard() {
    let pool = pool();
    let hub = Data::new(Hub::new(16));
    let app = app!(pool, hub);
    let mut watcher = hub.clone().into_inner().subscribe();
    assert_eq!(watcher.next().await, Some(Event::ActiveUsers(1)));

    let easy = problem!(app, 25);
    let hard = problem!(app, 50);

    // Incomplete profiles cannot submit
    let (_, user) = call!(
        app,
        TestRequest::post().uri("/users").set_json(json!({ "name": "lazy" }))
    );
    let lazy = user["id"].as_i64().unwrap() as i32;
    let (status, err) = call!(
        app,
        as_user(TestRequest::post().uri("/submissions"), lazy)
            .set_json(json!({ "code": "echo", "language": "python", "problem_id": easy }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["reason"], "ERR_INVALID_STATE");

    let alice = contestant!(app, "alice");
    let bob = contestant!(app, "bob");

    // A failing submission is recorded with no points and no broadcast
    let (status, body) = call!(
        app,
        as_user(TestRequest::post().uri("/submissions"), alice)
            .set_json(json!({ "code": "wrong", "language": "python", "problem_id": easy }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_json_include!(
        actual: body["submission"].clone(),
        expected: json!({ "status": "fail", "score": 0, "output": "2 of 2 test cases failed" })
    );

    let (status, body) = call!(
        app,
        as_user(TestRequest::post().uri("/submissions"), alice)
            .set_json(json!({ "code": "echo", "language": "python", "problem_id": easy }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_json_include!(
        actual: body["submission"].clone(),
        expected: json!({
            "user_id": alice, "problem_id": easy, "problem_title": "Echo",
            "status": "pass", "score": 25, "output": "All test cases passed"
        })
    );

    match watcher.next().await {
        Some(Event::LeaderboardUpdated(board)) => {
            assert_eq!(board[0].user_id, alice);
            assert_eq!(board[0].total_score, 25);
        }
        other => panic!("unexpected event {other:?}"),
    }

    // Solving the same problem again does not add points
    call!(
        app,
        as_user(TestRequest::post().uri("/submissions"), alice)
            .set_json(json!({ "code": "echo", "language": "python", "problem_id": easy }))
    );
    call!(
        app,
        as_user(TestRequest::post().uri("/submissions"), bob)
            .set_json(json!({ "code": "echo", "language": "python", "problem_id": hard }))
    );

    let (status, board) = call!(app, TestRequest::get().uri("/leaderboard"));
    assert_eq!(status, StatusCode::OK);
    let rows: Vec<(i64, i64, i64, i64)> = board
        .as_array()
        .unwrap()
        .iter()
        .map(|e| {
            (
                e["user_id"].as_i64().unwrap(),
                e["total_score"].as_i64().unwrap(),
                e["problems_solved"].as_i64().unwrap(),
                e["rank"].as_i64().unwrap(),
            )
        })
        .collect();
    let (alice, bob, lazy) = (alice as i64, bob as i64, lazy as i64);
    assert_eq!(
        rows,
        vec![
            (bob, 50, 1, 1),
            (alice, 25, 1, 2),
            (ROOT as i64, 0, 0, 3),
            (lazy, 0, 0, 4),
        ]
    );

    let (_, mine) = call!(
        app,
        as_user(TestRequest::get().uri("/submissions"), alice as i32)
    );
    let statuses: Vec<&str> = mine
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["pass", "pass", "fail"]);
    assert_eq!(mine[0]["problem_title"], "Echo");

    // Someone else's submission is invisible, admins see everything
    let sid = mine[0]["id"].as_i64().unwrap();
    let (status, _) = call!(
        app,
        as_user(TestRequest::get().uri(&format!("/submissions/{sid}")), bob as i32)
    );
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call!(
        app,
        as_user(TestRequest::get().uri(&format!("/submissions/{sid}")), ROOT)
    );
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn deleting_a_user_removes_their_scores() {
    let pool = pool();
    let hub = Data::new(Hub::new(16));
    let app = app!(pool, hub);
    let mut watcher = hub.clone().into_inner().subscribe();
    assert_eq!(watcher.next().await, Some(Event::ActiveUsers(1)));
    let easy = problem!(app, 25);
    let alice = contestant!(app, "alice");
    call!(
        app,
        as_user(TestRequest::post().uri("/submissions"), alice)
            .set_json(json!({ "code": "echo", "language": "python", "problem_id": easy }))
    );
    assert!(matches!(
        watcher.next().await,
        Some(Event::LeaderboardUpdated(_))
    ));

    let (status, _) = call!(
        app,
        as_user(TestRequest::delete().uri(&format!("/users/{ROOT}")), ROOT)
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        as_user(TestRequest::delete().uri(&format!("/users/{alice}")), ROOT).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // Watchers learn about the removal right away
    match watcher.next().await {
        Some(Event::LeaderboardUpdated(board)) => {
            assert_eq!(board.len(), 1);
            assert_eq!(board[0].user_id, ROOT);
        }
        other => panic!("unexpected event {other:?}"),
    }

    let (_, board) = call!(app, TestRequest::get().uri("/leaderboard"));
    assert_eq!(board.as_array().unwrap().len(), 1);
    assert_eq!(board[0]["user_id"], ROOT);

    let (_, users) = call!(app, as_user(TestRequest::get().uri("/users"), ROOT));
    assert_eq!(users.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn event_stream_headers() {
    let pool = pool();
    let hub = Data::new(Hub::new(16));
    let app = app!(pool, hub);

    let resp = test::call_service(
        &app,
        TestRequest::get().uri("/leaderboard/events").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(hub.active_clients(), 1);

    drop(resp);
    assert_eq!(hub.active_clients(), 0);
}

#[actix_web::test]
async fn malformed_bodies_use_the_error_format() {
    let pool = pool();
    let hub = Data::new(Hub::new(16));
    let app = app!(pool, hub);

    let (status, err) = call!(
        app,
        as_user(TestRequest::post().uri("/run"), ROOT).set_json(json!({ "code": 1 }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["reason"], "ERR_INVALID_ARGUMENT");
}
