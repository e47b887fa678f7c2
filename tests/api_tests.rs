// tests/api_tests.rs

use classroom_backend::{config::Config, routes, session::SessionStore, state::AppState};
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
///
/// Each test gets its own in-memory SQLite database, so tests are fully
/// isolated. A single pooled connection keeps the in-memory database alive
/// for the lifetime of the app.
async fn spawn_app() -> String {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
    };

    let state = AppState {
        pool,
        config,
        sessions: SessionStore::default(),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// Registers a fresh user and logs in. Returns (user_id, bearer token).
async fn register_and_login(
    client: &reqwest::Client,
    address: &str,
    role: &str,
    full_name: &str,
) -> (i64, String) {
    let unique_name = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({
            "username": unique_name,
            "password": "password123",
            "full_name": full_name,
            "role": role
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(response.status().as_u16(), 201);

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({
            "username": unique_name,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to login");
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.expect("Invalid login body");
    let user_id = body["user_id"].as_i64().expect("missing user_id");
    let token = body["token"].as_str().expect("missing token").to_string();
    (user_id, token)
}

async fn create_classroom(client: &reqwest::Client, address: &str, token: &str) -> Value {
    let response = client
        .post(format!("{}/api/classrooms", address))
        .bearer_auth(token)
        .json(&json!({
            "name": "Computer Science 101",
            "description": "Intro course"
        }))
        .send()
        .await
        .expect("Failed to create classroom");
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.expect("Invalid classroom body")
}

async fn join_classroom(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    join_code: &str,
) -> reqwest::Response {
    client
        .post(format!("{}/api/classrooms/join", address))
        .bearer_auth(token)
        .json(&json!({ "join_code": join_code }))
        .send()
        .await
        .expect("Failed to send join request")
}

fn sample_questions(count: usize) -> Value {
    let items: Vec<Value> = (0..count)
        .map(|n| {
            json!({
                "question": format!("Question {n}?"),
                "options": ["yes", "no"],
                "correct": "yes"
            })
        })
        .collect();
    Value::Array(items)
}

async fn create_quiz(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    classroom_id: i64,
    question_count: usize,
) -> i64 {
    let response = client
        .post(format!("{}/api/classrooms/{}/quizzes", address, classroom_id))
        .bearer_auth(token)
        .json(&json!({
            "title": "Weekly quiz",
            "duration_minutes": 10,
            "questions": sample_questions(question_count)
        }))
        .send()
        .await
        .expect("Failed to create quiz");
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.expect("Invalid quiz body");
    body["id"].as_i64().expect("missing quiz id")
}

#[tokio::test]
async fn health_check_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Role outside student/faculty is rejected.
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({
            "username": "validname",
            "password": "password123",
            "full_name": "Some One",
            "role": "admin"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn register_duplicate_username_conflicts() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let payload = json!({
        "username": "twice_taken",
        "password": "password123",
        "full_name": "First User",
        "role": "student"
    });

    let first = client
        .post(format!("{}/api/auth/register", address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);

    let second = client
        .post(format!("{}/api/auth/register", address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/classrooms", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn students_cannot_create_classrooms() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, student_token) = register_and_login(&client, &address, "student", "Stu Dent").await;

    let response = client
        .post(format!("{}/api/classrooms", address))
        .bearer_auth(&student_token)
        .json(&json!({ "name": "Rogue Classroom" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn classroom_join_code_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, faculty_token) = register_and_login(&client, &address, "faculty", "Prof X").await;
    let (student_id, student_token) =
        register_and_login(&client, &address, "student", "Ada L").await;

    let classroom = create_classroom(&client, &address, &faculty_token).await;
    let classroom_id = classroom["id"].as_i64().unwrap();
    let join_code = classroom["join_code"].as_str().unwrap();
    assert_eq!(join_code, join_code.to_uppercase());
    assert_eq!(join_code.len(), 6);

    // Unknown code is a 404.
    let miss = join_classroom(&client, &address, &student_token, "ZZZZZZ").await;
    assert_eq!(miss.status().as_u16(), 404);

    // The code is matched case-insensitively (uppercased at both ends).
    let joined = join_classroom(&client, &address, &student_token, &join_code.to_lowercase()).await;
    assert_eq!(joined.status().as_u16(), 201);

    // Re-joining surfaces the membership UNIQUE constraint as a 409.
    let duplicate = join_classroom(&client, &address, &student_token, join_code).await;
    assert_eq!(duplicate.status().as_u16(), 409);

    // The classroom now shows up in the student's list.
    let list: Value = client
        .get(format!("{}/api/classrooms", address))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"].as_i64().unwrap(), classroom_id);
    assert_eq!(list[0]["faculty_name"].as_str().unwrap(), "Prof X");

    // Owner sees the enrolled student; students cannot list members.
    let members: Value = client
        .get(format!("{}/api/classrooms/{}/members", address, classroom_id))
        .bearer_auth(&faculty_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(members.as_array().unwrap().len(), 1);
    assert_eq!(members[0]["student_id"].as_i64().unwrap(), student_id);

    let forbidden = client
        .get(format!("{}/api/classrooms/{}/members", address, classroom_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);
}

#[tokio::test]
async fn announcements_are_posted_and_sanitized() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, faculty_token) = register_and_login(&client, &address, "faculty", "Prof X").await;
    let (_, student_token) = register_and_login(&client, &address, "student", "Ada L").await;

    let classroom = create_classroom(&client, &address, &faculty_token).await;
    let classroom_id = classroom["id"].as_i64().unwrap();
    let join_code = classroom["join_code"].as_str().unwrap();
    join_classroom(&client, &address, &student_token, join_code).await;

    let response = client
        .post(format!(
            "{}/api/classrooms/{}/announcements",
            address, classroom_id
        ))
        .bearer_auth(&faculty_token)
        .json(&json!({
            "title": "Midterm moved",
            "content": "Now on <b>Friday</b><script>alert('x')</script>"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let list: Value = client
        .get(format!(
            "{}/api/classrooms/{}/announcements",
            address, classroom_id
        ))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let content = list[0]["content"].as_str().unwrap();
    assert!(content.contains("<b>Friday</b>"));
    assert!(!content.contains("script"));
    assert_eq!(list[0]["author_name"].as_str().unwrap(), "Prof X");
}

#[tokio::test]
async fn malformed_question_sets_are_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, faculty_token) = register_and_login(&client, &address, "faculty", "Prof X").await;
    let classroom = create_classroom(&client, &address, &faculty_token).await;
    let classroom_id = classroom["id"].as_i64().unwrap();

    for bad_questions in [
        json!({"not": "an array"}),
        json!([]),
        json!([{ "question": "Missing key?", "options": ["a", "b"] }]),
        json!([{ "question": "Key off-list?", "options": ["a", "b"], "correct": "c" }]),
    ] {
        let response = client
            .post(format!("{}/api/classrooms/{}/quizzes", address, classroom_id))
            .bearer_auth(&faculty_token)
            .json(&json!({ "title": "Broken quiz", "questions": bad_questions }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
    }
}

#[tokio::test]
async fn quiz_session_lifecycle() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, faculty_token) = register_and_login(&client, &address, "faculty", "Prof X").await;
    let (_, student_token) = register_and_login(&client, &address, "student", "Ada L").await;

    let classroom = create_classroom(&client, &address, &faculty_token).await;
    let classroom_id = classroom["id"].as_i64().unwrap();
    let join_code = classroom["join_code"].as_str().unwrap();
    join_classroom(&client, &address, &student_token, join_code).await;

    // 15 authored questions: the session must present min(10, 15) = 10.
    let quiz_id = create_quiz(&client, &address, &faculty_token, classroom_id, 15).await;

    let response = client
        .post(format!("{}/api/quizzes/{}/session", address, quiz_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let session: Value = response.json().await.unwrap();

    let questions = session["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 10);
    assert_eq!(session["duration_seconds"].as_i64().unwrap(), 600);
    // Answer keys are stripped from the presented subset.
    for q in questions {
        assert!(q.get("correct").is_none());
    }
    // No duplicate prompts in the presented subset.
    let mut prompts: Vec<&str> = questions
        .iter()
        .map(|q| q["question"].as_str().unwrap())
        .collect();
    prompts.sort();
    prompts.dedup();
    assert_eq!(prompts.len(), 10);

    // Answer 8 of 10 correctly, one wrong, one overwritten then left wrong.
    for position in 0..8 {
        let response = client
            .put(format!("{}/api/quizzes/{}/session/answer", address, quiz_id))
            .bearer_auth(&student_token)
            .json(&json!({ "position": position, "answer": "yes" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 204);
    }
    client
        .put(format!("{}/api/quizzes/{}/session/answer", address, quiz_id))
        .bearer_auth(&student_token)
        .json(&json!({ "position": 8, "answer": "yes" }))
        .send()
        .await
        .unwrap();
    // Last write for a position wins.
    client
        .put(format!("{}/api/quizzes/{}/session/answer", address, quiz_id))
        .bearer_auth(&student_token)
        .json(&json!({ "position": 8, "answer": "no" }))
        .send()
        .await
        .unwrap();

    // Out-of-range position is rejected.
    let out_of_range = client
        .put(format!("{}/api/quizzes/{}/session/answer", address, quiz_id))
        .bearer_auth(&student_token)
        .json(&json!({ "position": 10, "answer": "yes" }))
        .send()
        .await
        .unwrap();
    assert_eq!(out_of_range.status().as_u16(), 400);

    let response = client
        .post(format!("{}/api/quizzes/{}/session/submit", address, quiz_id))
        .bearer_auth(&student_token)
        .json(&json!({ "reason": "manual" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["score"].as_i64().unwrap(), 8);
    assert_eq!(result["total_questions"].as_i64().unwrap(), 10);

    // Once the attempt is acknowledged, starting again is a 409.
    let again = client
        .post(format!("{}/api/quizzes/{}/session", address, quiz_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(again.status().as_u16(), 409);

    // The session is gone; a re-submit has nothing to act on.
    let resubmit = client
        .post(format!("{}/api/quizzes/{}/session/submit", address, quiz_id))
        .bearer_auth(&student_token)
        .json(&json!({ "reason": "manual" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resubmit.status().as_u16(), 404);
}

#[tokio::test]
async fn abandoning_a_session_records_nothing() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, faculty_token) = register_and_login(&client, &address, "faculty", "Prof X").await;
    let (_, student_token) = register_and_login(&client, &address, "student", "Ada L").await;

    let classroom = create_classroom(&client, &address, &faculty_token).await;
    let classroom_id = classroom["id"].as_i64().unwrap();
    let join_code = classroom["join_code"].as_str().unwrap();
    join_classroom(&client, &address, &student_token, join_code).await;
    let quiz_id = create_quiz(&client, &address, &faculty_token, classroom_id, 5).await;

    let started = client
        .post(format!("{}/api/quizzes/{}/session", address, quiz_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(started.status().as_u16(), 200);

    let abandoned = client
        .delete(format!("{}/api/quizzes/{}/session", address, quiz_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(abandoned.status().as_u16(), 204);

    // No attempt was written, so the student can start fresh.
    let restarted = client
        .post(format!("{}/api/quizzes/{}/session", address, quiz_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(restarted.status().as_u16(), 200);
    let session: Value = restarted.json().await.unwrap();
    assert!(!session["resumed"].as_bool().unwrap());

    let mine: Value = client
        .get(format!("{}/api/performance/me", address))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine["stats"]["total_quizzes"].as_u64().unwrap(), 0);
}

#[tokio::test]
async fn non_members_cannot_start_sessions() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, faculty_token) = register_and_login(&client, &address, "faculty", "Prof X").await;
    let (_, outsider_token) =
        register_and_login(&client, &address, "student", "Out Sider").await;

    let classroom = create_classroom(&client, &address, &faculty_token).await;
    let classroom_id = classroom["id"].as_i64().unwrap();
    let quiz_id = create_quiz(&client, &address, &faculty_token, classroom_id, 5).await;

    let response = client
        .post(format!("{}/api/quizzes/{}/session", address, quiz_id))
        .bearer_auth(&outsider_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn results_performance_and_leaderboards() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, faculty_token) = register_and_login(&client, &address, "faculty", "Prof X").await;
    let (ada_id, ada_token) = register_and_login(&client, &address, "student", "Ada L").await;
    let (grace_id, grace_token) =
        register_and_login(&client, &address, "student", "Grace H").await;

    let classroom = create_classroom(&client, &address, &faculty_token).await;
    let classroom_id = classroom["id"].as_i64().unwrap();
    let join_code = classroom["join_code"].as_str().unwrap();
    join_classroom(&client, &address, &ada_token, join_code).await;
    join_classroom(&client, &address, &grace_token, join_code).await;

    let quiz_id = create_quiz(&client, &address, &faculty_token, classroom_id, 4).await;

    // Ada answers everything correctly, Grace answers half.
    for (token, correct_count) in [(&ada_token, 4), (&grace_token, 2)] {
        let response = client
            .post(format!("{}/api/quizzes/{}/session", address, quiz_id))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        for position in 0..correct_count {
            client
                .put(format!("{}/api/quizzes/{}/session/answer", address, quiz_id))
                .bearer_auth(token)
                .json(&json!({ "position": position, "answer": "yes" }))
                .send()
                .await
                .unwrap();
        }
        let submitted = client
            .post(format!("{}/api/quizzes/{}/session/submit", address, quiz_id))
            .bearer_auth(token)
            .json(&json!({ "reason": "manual" }))
            .send()
            .await
            .unwrap();
        assert_eq!(submitted.status().as_u16(), 200);
    }

    // Faculty quiz results: pooled stats plus a ranked leaderboard.
    let results: Value = client
        .get(format!("{}/api/quizzes/{}/results", address, quiz_id))
        .bearer_auth(&faculty_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(results["stats"]["total_attempts"].as_u64().unwrap(), 2);
    // Pooled accuracy: (4 + 2) / (4 + 4) = 75%.
    let accuracy = results["stats"]["average_accuracy"].as_f64().unwrap();
    assert!((accuracy - 75.0).abs() < 1e-9);
    let leaderboard = results["leaderboard"].as_array().unwrap();
    assert_eq!(leaderboard[0]["student_id"].as_i64().unwrap(), ada_id);
    assert_eq!(leaderboard[0]["badge"].as_str().unwrap(), "gold");
    assert_eq!(leaderboard[1]["student_id"].as_i64().unwrap(), grace_id);
    assert_eq!(leaderboard[1]["badge"].as_str().unwrap(), "silver");

    // Student self view.
    let mine: Value = client
        .get(format!("{}/api/performance/me", address))
        .bearer_auth(&ada_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine["stats"]["total_quizzes"].as_u64().unwrap(), 1);
    assert!((mine["stats"]["average_accuracy"].as_f64().unwrap() - 100.0).abs() < 1e-9);
    assert_eq!(mine["attempts"].as_array().unwrap().len(), 1);
    assert_eq!(
        mine["attempts"][0]["quiz_title"].as_str().unwrap(),
        "Weekly quiz"
    );

    // Faculty class view: sorted best-first, attention flag for Grace (50%).
    let class: Value = client
        .get(format!(
            "{}/api/classrooms/{}/performance",
            address, classroom_id
        ))
        .bearer_auth(&faculty_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(class["class"]["total_students"].as_u64().unwrap(), 2);
    assert_eq!(class["class"]["needing_attention"].as_u64().unwrap(), 1);
    let students = class["students"].as_array().unwrap();
    assert_eq!(students[0]["student_id"].as_i64().unwrap(), ada_id);

    // Overall leaderboard visible to enrolled students.
    let overall: Value = client
        .get(format!(
            "{}/api/classrooms/{}/leaderboard",
            address, classroom_id
        ))
        .bearer_auth(&grace_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows = overall.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["student_id"].as_i64().unwrap(), ada_id);
    assert_eq!(rows[0]["total_score"].as_i64().unwrap(), 4);
    assert_eq!(rows[1]["badge"].as_str().unwrap(), "silver");
}
