// tests/api_tests.rs

use std::sync::Arc;

use examroom::{config::Config, realtime::Registry, routes, state::AppState, utils::hash::hash_pin};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

struct TestApp {
    address: String,
    pool: SqlitePool,
}

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL plus the pool, so tests can seed rows directly.
async fn spawn_app() -> TestApp {
    // 1. Every test gets its own in-memory database. One connection
    //    keeps it alive for the lifetime of the pool.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");

    // 2. Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    // 3. Create test configuration and state
    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_login_code: None,
        admin_pin: None,
        auto_submit_grace_secs: 10,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
        registry: Arc::new(Registry::new()),
    };

    // 4. Create the router with the app state
    let app = routes::create_router(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 6. Spawn the server in the background. The login rate limiter
    //    keys on the peer address, so the test server must serve with
    //    connect info like the real binary.
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp { address, pool }
}

async fn seed_user(pool: &SqlitePool, role: &str, pin: &str) -> (i64, String) {
    let login_code = format!(
        "{}_{}",
        role,
        &uuid::Uuid::new_v4().simple().to_string()[..8]
    )
    .to_uppercase();
    let pin_hash = hash_pin(pin).unwrap();
    let user_id = sqlx::query("INSERT INTO users (login_code, role, pin_hash) VALUES (?, ?, ?)")
        .bind(&login_code)
        .bind(role)
        .bind(&pin_hash)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid();
    (user_id, login_code)
}

async fn seed_group(pool: &SqlitePool) -> i64 {
    let code = format!("G{}", &uuid::Uuid::new_v4().simple().to_string()[..6]).to_uppercase();
    sqlx::query("INSERT INTO academic_groups (code, name) VALUES (?, ?)")
        .bind(&code)
        .bind("Seeded group")
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

async fn seed_subject(pool: &SqlitePool) -> i64 {
    let code = format!("S{}", &uuid::Uuid::new_v4().simple().to_string()[..6]).to_uppercase();
    sqlx::query("INSERT INTO subjects (code, name) VALUES (?, ?)")
        .bind(&code)
        .bind("Seeded subject")
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

async fn seed_student(pool: &SqlitePool, group_id: i64, pin: &str) -> (i64, i64, String) {
    let (user_id, login_code) = seed_user(pool, "student", pin).await;
    let student_id = sqlx::query(
        "INSERT INTO students (user_id, first_name, last_name, academic_group_id)
         VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind("Seeded")
    .bind("Student")
    .bind(group_id)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid();
    (user_id, student_id, login_code)
}

async fn seed_teacher(pool: &SqlitePool, pin: &str) -> (i64, i64, String) {
    let (user_id, login_code) = seed_user(pool, "teacher", pin).await;
    let teacher_id =
        sqlx::query("INSERT INTO teachers (user_id, first_name, last_name) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind("Seeded")
            .bind("Teacher")
            .execute(pool)
            .await
            .unwrap()
            .last_insert_rowid();
    (user_id, teacher_id, login_code)
}

/// Logs in and returns the whole response body (token, role, profile ids).
async fn login(
    client: &reqwest::Client,
    address: &str,
    login_code: &str,
    pin: &str,
) -> serde_json::Value {
    let response = client
        .post(&format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "login_code": login_code, "pin": pin }))
        .send()
        .await
        .unwrap();
    assert!(
        response.status().is_success(),
        "login failed for {}",
        login_code
    );
    response.json::<serde_json::Value>().await.unwrap()
}

#[tokio::test]
async fn test_health_check() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!("{}/health", app.address))
        .send()
        .await
        .unwrap();

    // Assert
    assert!(response.status().is_success());
    let body = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["realtime_connections"], 0);
}

#[tokio::test]
async fn test_login_returns_token_and_profile_id() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let group_id = seed_group(&app.pool).await;
    let (user_id, student_id, login_code) = seed_student(&app.pool, group_id, "1234").await;

    // Act: the code is accepted case-insensitively.
    let body = login(&client, &app.address, &login_code.to_lowercase(), "1234").await;

    // Assert
    assert!(!body["token"].as_str().unwrap().is_empty());
    assert_eq!(body["type"], "Bearer");
    assert_eq!(body["role"], "student");
    assert_eq!(body["user_id"], user_id);
    assert_eq!(body["student_id"], student_id);
    assert!(body["teacher_id"].is_null());

    let last_login =
        sqlx::query_scalar::<_, Option<String>>("SELECT last_login FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert!(last_login.is_some());
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let group_id = seed_group(&app.pool).await;
    let (_, _, login_code) = seed_student(&app.pool, group_id, "1234").await;

    // Act: wrong PIN, then unknown code.
    let wrong_pin = client
        .post(&format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "login_code": login_code, "pin": "9999" }))
        .send()
        .await
        .unwrap();
    let unknown = client
        .post(&format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "login_code": "NO_SUCH_CODE", "pin": "1234" }))
        .send()
        .await
        .unwrap();

    // Assert: both fail the same way, neither leaks which part was wrong.
    assert_eq!(wrong_pin.status().as_u16(), 401);
    assert_eq!(unknown.status().as_u16(), 401);
    let wrong_body = wrong_pin.json::<serde_json::Value>().await.unwrap();
    let unknown_body = unknown.json::<serde_json::Value>().await.unwrap();
    assert_eq!(wrong_body["error"], unknown_body["error"]);

    // Act + Assert: an empty login code never reaches the database.
    let invalid = client
        .post(&format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "login_code": "", "pin": "1234" }))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status().as_u16(), 400);
}

#[tokio::test]
async fn test_login_rejects_disabled_account() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let group_id = seed_group(&app.pool).await;
    let (user_id, _, login_code) = seed_student(&app.pool, group_id, "1234").await;
    sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
        .bind(user_id)
        .execute(&app.pool)
        .await
        .unwrap();

    // Act
    let response = client
        .post(&format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "login_code": login_code, "pin": "1234" }))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn test_login_rate_limited_after_burst() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Act: burn through the burst allowance with bad credentials.
    let mut statuses = Vec::new();
    for _ in 0..6 {
        let response = client
            .post(&format!("{}/api/auth/login", app.address))
            .json(&serde_json::json!({ "login_code": "NOBODY", "pin": "0000" }))
            .send()
            .await
            .unwrap();
        statuses.push(response.status().as_u16());
    }

    // Assert: five attempts go through to auth, the sixth is throttled.
    assert!(statuses[..5].iter().all(|s| *s == 401));
    assert_eq!(statuses[5], 429);
}

#[tokio::test]
async fn test_protected_routes_require_token_and_role() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let group_id = seed_group(&app.pool).await;
    let (_, _, login_code) = seed_student(&app.pool, group_id, "1234").await;
    let token = login(&client, &app.address, &login_code, "1234").await["token"]
        .as_str()
        .unwrap()
        .to_string();

    // Act + Assert: no token.
    let response = client
        .get(&format!("{}/api/student/attempts", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    // Act + Assert: garbage token.
    let response = client
        .get(&format!("{}/api/student/attempts", app.address))
        .header("Authorization", "Bearer not.a.jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    // Act + Assert: valid student token on a teacher route.
    let response = client
        .get(&format!("{}/api/teacher/exams", app.address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // Act + Assert: and on an admin route.
    let response = client
        .get(&format!("{}/api/admin/users", app.address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn test_admin_provisions_accounts_and_catalog() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, admin_code) = seed_user(&app.pool, "admin", "8080").await;
    let token = login(&client, &app.address, &admin_code, "8080").await["token"]
        .as_str()
        .unwrap()
        .to_string();
    let auth = format!("Bearer {}", token);

    // 1. Catalog: group and subject, codes stored uppercase.
    let response = client
        .post(&format!("{}/api/admin/groups", app.address))
        .header("Authorization", &auth)
        .json(&serde_json::json!({ "code": "cs-21", "name": "Computer Science 21" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let group = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(group["code"], "CS-21");
    let group_id = group["id"].as_i64().unwrap();

    let response = client
        .post(&format!("{}/api/admin/subjects", app.address))
        .header("Authorization", &auth)
        .json(&serde_json::json!({ "code": "math", "name": "Mathematics" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    // 2. A teacher and a student account.
    let response = client
        .post(&format!("{}/api/admin/teachers", app.address))
        .header("Authorization", &auth)
        .json(&serde_json::json!({
            "login_code": "t_prov_1",
            "pin": "4321",
            "first_name": "Tess",
            "last_name": "Teacher"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let response = client
        .post(&format!("{}/api/admin/students", app.address))
        .header("Authorization", &auth)
        .json(&serde_json::json!({
            "login_code": "s_prov_1",
            "pin": "1234",
            "first_name": "Stu",
            "last_name": "Student",
            "academic_group_id": group_id
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let student = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(student["login_code"], "S_PROV_1");
    let student_user_id = student["user_id"].as_i64().unwrap();

    // 3. Duplicate login code and unknown group are rejected.
    let response = client
        .post(&format!("{}/api/admin/students", app.address))
        .header("Authorization", &auth)
        .json(&serde_json::json!({
            "login_code": "S_PROV_1",
            "pin": "5678",
            "first_name": "Dup",
            "last_name": "Licate",
            "academic_group_id": group_id
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let response = client
        .post(&format!("{}/api/admin/students", app.address))
        .header("Authorization", &auth)
        .json(&serde_json::json!({
            "login_code": "s_prov_2",
            "pin": "5678",
            "first_name": "No",
            "last_name": "Group",
            "academic_group_id": 999_999
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // 4. The provisioned student can log in.
    let body = login(&client, &app.address, "S_PROV_1", "1234").await;
    assert_eq!(body["role"], "student");

    // 5. Disabling the account locks it out; re-enabling lets it back in.
    let response = client
        .put(&format!(
            "{}/api/admin/users/{}/active",
            app.address, student_user_id
        ))
        .header("Authorization", &auth)
        .json(&serde_json::json!({ "is_active": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .post(&format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "login_code": "S_PROV_1", "pin": "1234" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = client
        .put(&format!(
            "{}/api/admin/users/{}/active",
            app.address, student_user_id
        ))
        .header("Authorization", &auth)
        .json(&serde_json::json!({ "is_active": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    login(&client, &app.address, "S_PROV_1", "1234").await;

    // 6. Unknown user id.
    let response = client
        .put(&format!("{}/api/admin/users/999999/active", app.address))
        .header("Authorization", &auth)
        .json(&serde_json::json!({ "is_active": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // 7. The listing shows everything provisioned here.
    let response = client
        .get(&format!("{}/api/admin/users", app.address))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let users = response.json::<serde_json::Value>().await.unwrap();
    let codes: Vec<&str> = users
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["login_code"].as_str().unwrap())
        .collect();
    assert!(codes.contains(&"S_PROV_1"));
    assert!(codes.contains(&"T_PROV_1"));
}

#[tokio::test]
async fn test_admin_routes_forbidden_for_teachers() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, _, login_code) = seed_teacher(&app.pool, "4321").await;
    let token = login(&client, &app.address, &login_code, "4321").await["token"]
        .as_str()
        .unwrap()
        .to_string();

    // Act
    let response = client
        .post(&format!("{}/api/admin/groups", app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "code": "x1", "name": "Nope" }))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn test_teacher_exam_authoring_flow() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let subject_id = seed_subject(&app.pool).await;
    let (_, _, login_code) = seed_teacher(&app.pool, "4321").await;
    let token = login(&client, &app.address, &login_code, "4321").await["token"]
        .as_str()
        .unwrap()
        .to_string();
    let auth = format!("Bearer {}", token);

    // The catalog listings carry the ids exams are filed under.
    let response = client
        .get(&format!("{}/api/teacher/subjects", app.address))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let subjects = response.json::<serde_json::Value>().await.unwrap();
    assert!(
        subjects
            .as_array()
            .unwrap()
            .iter()
            .any(|s| s["id"].as_i64() == Some(subject_id))
    );

    let response = client
        .get(&format!("{}/api/teacher/groups", app.address))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.json::<serde_json::Value>().await.unwrap(),
        serde_json::json!([])
    );

    // 1. Create a draft exam; markup in the title is stripped and a join
    //    code is minted when none is supplied.
    let response = client
        .post(&format!("{}/api/teacher/exams", app.address))
        .header("Authorization", &auth)
        .json(&serde_json::json!({
            "subject_id": subject_id,
            "title": "<script>alert(1)</script>Algebra Midterm",
            "description": "Chapters 1 through 4",
            "duration_minutes": 45,
            "total_marks": 100,
            "passing_marks": 50
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let exam = response.json::<serde_json::Value>().await.unwrap();
    let exam_id = exam["id"].as_i64().unwrap();
    assert_eq!(exam["status"], "draft");
    assert_eq!(exam["title"], "Algebra Midterm");
    let exam_code = exam["exam_code"].as_str().unwrap();
    assert_eq!(exam_code.len(), 8);
    assert!(
        exam_code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    );

    // 2. Publishing an empty exam is refused.
    let response = client
        .post(&format!(
            "{}/api/teacher/exams/{}/publish",
            app.address, exam_id
        ))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // 3. A question with two correct options never lands.
    let response = client
        .post(&format!(
            "{}/api/teacher/exams/{}/questions",
            app.address, exam_id
        ))
        .header("Authorization", &auth)
        .json(&serde_json::json!({
            "question_text": "Broken question",
            "options": [
                { "option_letter": "A", "option_text": "Yes", "is_correct": true },
                { "option_letter": "B", "option_text": "Also yes", "is_correct": true }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // 4. Two valid questions land in authored order.
    for (index, correct) in ["A", "C"].iter().enumerate() {
        let response = client
            .post(&format!(
                "{}/api/teacher/exams/{}/questions",
                app.address, exam_id
            ))
            .header("Authorization", &auth)
            .json(&serde_json::json!({
                "question_text": format!("Question {}", index + 1),
                "difficulty": "easy",
                "options": [
                    { "option_letter": "a", "option_text": "First", "is_correct": *correct == "A" },
                    { "option_letter": "b", "option_text": "Second", "is_correct": *correct == "B" },
                    { "option_letter": "c", "option_text": "Third", "is_correct": *correct == "C" }
                ]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        let body = response.json::<serde_json::Value>().await.unwrap();
        assert_eq!(body["order_position"], (index + 1) as i64);
    }

    // 5. Publish succeeds exactly once.
    let response = client
        .post(&format!(
            "{}/api/teacher/exams/{}/publish",
            app.address, exam_id
        ))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["exam_code"], exam_code);

    let response = client
        .post(&format!(
            "{}/api/teacher/exams/{}/publish",
            app.address, exam_id
        ))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // 6. Published exams take no more questions.
    let response = client
        .post(&format!(
            "{}/api/teacher/exams/{}/questions",
            app.address, exam_id
        ))
        .header("Authorization", &auth)
        .json(&serde_json::json!({
            "question_text": "Too late",
            "options": [
                { "option_letter": "A", "option_text": "Yes", "is_correct": true },
                { "option_letter": "B", "option_text": "No", "is_correct": false }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // 7. The listing carries counts and the published state.
    let response = client
        .get(&format!("{}/api/teacher/exams", app.address))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let listing = response.json::<serde_json::Value>().await.unwrap();
    let listing = listing.as_array().unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0]["status"], "published");
    assert_eq!(listing[0]["question_count"], 2);
    assert_eq!(listing[0]["attempt_count"], 0);

    // 8. Statistics exist (empty) before anyone sits the exam.
    let response = client
        .get(&format!(
            "{}/api/teacher/exams/{}/statistics",
            app.address, exam_id
        ))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["statistics"]["total_attempts"], 0);

    // 9. Out-of-range durations are refused up front.
    let response = client
        .post(&format!("{}/api/teacher/exams", app.address))
        .header("Authorization", &auth)
        .json(&serde_json::json!({
            "subject_id": subject_id,
            "title": "Marathon",
            "duration_minutes": 0,
            "total_marks": 100,
            "passing_marks": 50
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn test_publish_refused_while_a_question_has_no_correct_option() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let subject_id = seed_subject(&app.pool).await;
    let (_, _, login_code) = seed_teacher(&app.pool, "4321").await;
    let token = login(&client, &app.address, &login_code, "4321").await["token"]
        .as_str()
        .unwrap()
        .to_string();
    let auth = format!("Bearer {}", token);

    let response = client
        .post(&format!("{}/api/teacher/exams", app.address))
        .header("Authorization", &auth)
        .json(&serde_json::json!({
            "subject_id": subject_id,
            "title": "History Quiz",
            "duration_minutes": 30,
            "total_marks": 20,
            "passing_marks": 10
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let exam_id = response.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    // A question without a correct option, seeded behind the API's back.
    let question_id = sqlx::query(
        "INSERT INTO questions (exam_id, question_text, marks, difficulty, order_position)
         VALUES (?, 'Orphan question', 1, 'easy', 1)",
    )
    .bind(exam_id)
    .execute(&app.pool)
    .await
    .unwrap()
    .last_insert_rowid();
    sqlx::query(
        "INSERT INTO options (question_id, option_letter, option_text, is_correct)
         VALUES (?, 'A', 'Wrong', 0), (?, 'B', 'Also wrong', 0)",
    )
    .bind(question_id)
    .bind(question_id)
    .execute(&app.pool)
    .await
    .unwrap();

    // Act
    let response = client
        .post(&format!(
            "{}/api/teacher/exams/{}/publish",
            app.address, exam_id
        ))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 409);
    let body = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(
        body["error"],
        "Every question needs a correct option before publishing"
    );
}

#[tokio::test]
async fn test_exam_code_conflicts_are_rejected() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let subject_id = seed_subject(&app.pool).await;
    let (_, _, login_code) = seed_teacher(&app.pool, "4321").await;
    let token = login(&client, &app.address, &login_code, "4321").await["token"]
        .as_str()
        .unwrap()
        .to_string();
    let auth = format!("Bearer {}", token);

    let create = |code: &str| {
        serde_json::json!({
            "subject_id": subject_id,
            "title": "Coded exam",
            "exam_code": code,
            "duration_minutes": 30,
            "total_marks": 50,
            "passing_marks": 25
        })
    };

    // Act: first claim goes through, uppercased.
    let response = client
        .post(&format!("{}/api/teacher/exams", app.address))
        .header("Authorization", &auth)
        .json(&create("math_2026"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let exam = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(exam["exam_code"], "MATH_2026");

    // Act + Assert: the same code again conflicts.
    let response = client
        .post(&format!("{}/api/teacher/exams", app.address))
        .header("Authorization", &auth)
        .json(&create("MATH_2026"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // Act + Assert: codes with forbidden characters are refused.
    let response = client
        .post(&format!("{}/api/teacher/exams", app.address))
        .header("Authorization", &auth)
        .json(&create("bad code!"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn test_concurrent_exam_code_claims_get_one_winner() {
    // Arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let subject_id = seed_subject(&app.pool).await;
    let (_, _, login_code) = seed_teacher(&app.pool, "4321").await;
    let token = login(&client, &app.address, &login_code, "4321").await["token"]
        .as_str()
        .unwrap()
        .to_string();
    let auth = format!("Bearer {}", token);

    let payload = serde_json::json!({
        "subject_id": subject_id,
        "title": "Coded exam",
        "exam_code": "SHARED_CODE",
        "duration_minutes": 30,
        "total_marks": 50,
        "passing_marks": 25
    });

    // Act: two requests race for the same code.
    let first = client
        .post(&format!("{}/api/teacher/exams", app.address))
        .header("Authorization", &auth)
        .json(&payload);
    let second = client
        .post(&format!("{}/api/teacher/exams", app.address))
        .header("Authorization", &auth)
        .json(&payload);
    let (first, second) = tokio::join!(first.send(), second.send());

    // Assert: exactly one claim lands, the loser gets the conflict.
    let mut statuses = [
        first.unwrap().status().as_u16(),
        second.unwrap().status().as_u16(),
    ];
    statuses.sort();
    assert_eq!(statuses, [201, 409]);

    let count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM exams WHERE exam_code = 'SHARED_CODE'")
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_foreign_exam_is_forbidden() {
    // Arrange: teacher A owns an exam, teacher B holds a valid token.
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let subject_id = seed_subject(&app.pool).await;
    let (_, teacher_a_id, _) = seed_teacher(&app.pool, "4321").await;
    let (_, _, login_b) = seed_teacher(&app.pool, "4321").await;

    let exam_id = sqlx::query(
        "INSERT INTO exams (teacher_id, subject_id, title, exam_code, duration_minutes,
                            total_marks, passing_marks)
         VALUES (?, ?, ?, ?, 30, 50, 25)",
    )
    .bind(teacher_a_id)
    .bind(subject_id)
    .bind("Private exam")
    .bind("PRIVATE1")
    .execute(&app.pool)
    .await
    .unwrap()
    .last_insert_rowid();

    let token = login(&client, &app.address, &login_b, "4321").await["token"]
        .as_str()
        .unwrap()
        .to_string();
    let auth = format!("Bearer {}", token);

    // Act + Assert: B cannot add questions, publish or read statistics.
    let response = client
        .post(&format!(
            "{}/api/teacher/exams/{}/questions",
            app.address, exam_id
        ))
        .header("Authorization", &auth)
        .json(&serde_json::json!({
            "question_text": "Intruding question",
            "options": [
                { "option_letter": "A", "option_text": "Yes", "is_correct": true },
                { "option_letter": "B", "option_text": "No", "is_correct": false }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = client
        .post(&format!(
            "{}/api/teacher/exams/{}/publish",
            app.address, exam_id
        ))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = client
        .get(&format!(
            "{}/api/teacher/exams/{}/statistics",
            app.address, exam_id
        ))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}
