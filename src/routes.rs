// src/routes.rs

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::Method,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, exam, student, teacher},
    realtime::socket,
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, student_middleware, teacher_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, exam, student, teacher, admin, ws).
/// * Applies global middleware (Trace, CORS) and rate limiting on login.
/// * Injects global state (pool, config, realtime registry).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    // 5 attempts, then one more every 3 minutes, per client IP.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(180)
            .burst_size(5)
            .finish()
            .unwrap(),
    );

    let auth_routes = Router::new().route(
        "/login",
        post(auth::login).layer(GovernorLayer::new(governor_conf)),
    );

    let exam_routes = Router::new()
        .route("/start", post(exam::start_exam))
        .route("/save-answer", post(exam::save_answer))
        .route("/track-action", post(exam::track_action))
        .route("/submit", post(exam::submit_exam))
        .route("/auto-submit", post(exam::auto_submit_exam))
        // Double middleware protection: Auth first, then role check
        .layer(middleware::from_fn(student_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let student_routes = Router::new()
        .route("/result", get(student::get_result))
        .route("/attempts", get(student::my_attempts))
        .route("/exams", get(student::available_exams))
        .layer(middleware::from_fn(student_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let teacher_routes = Router::new()
        .route("/exams", get(teacher::list_exams).post(teacher::create_exam))
        .route("/exams/{id}/questions", post(teacher::add_question))
        .route("/exams/{id}/publish", post(teacher::publish_exam))
        .route("/exams/{id}/leaderboard", get(teacher::get_leaderboard))
        .route("/exams/{id}/statistics", get(teacher::get_statistics))
        .route("/groups", get(teacher::list_groups))
        .route("/subjects", get(teacher::list_subjects))
        .layer(middleware::from_fn(teacher_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}/active", put(admin::set_user_active))
        .route("/students", post(admin::create_student))
        .route("/teachers", post(admin::create_teacher))
        .route("/groups", post(admin::create_group))
        .route("/subjects", post(admin::create_subject))
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/ws", get(socket::ws_handler))
        .nest("/api/auth", auth_routes)
        .nest("/api/exam", exam_routes)
        .nest("/api/student", student_routes)
        .nest("/api/teacher", teacher_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Liveness probe with the realtime connection count.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "realtime_connections": state.registry.connection_count()
    }))
}
