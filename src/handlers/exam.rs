// src/handlers/exam.rs

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
};
use chrono::Duration;
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    answers, attempts, delivery,
    error::AppError,
    models::{
        attempt::{AutoSubmitRequest, ExamAttempt, SaveAnswerRequest, StartExamRequest,
                  SubmitRequest, TrackActionRequest},
        exam::{Exam, ExamStatus},
        result::ExamResult,
    },
    realtime::{Channel, EventKind, Registry},
    state::AppState,
    utils::jwt::Claims,
};

pub(crate) const EXAM_COLUMNS: &str = "id, teacher_id, subject_id, academic_group_id, title, \
     description, exam_code, duration_minutes, total_marks, passing_marks, status, \
     show_results, randomize_questions, randomize_options, published_at, created_at";

/// Starts an exam for the authenticated student, or resumes the open
/// attempt for this (exam, student) pair.
///
/// Delivers the question set (shuffled per the exam's flags) together
/// with the attempt id, the server-side deadline and any answers saved
/// so far. A second call on an open attempt re-delivers, possibly in a
/// different order; answers are keyed by ids, not positions, so
/// already-saved answers stay valid.
pub async fn start_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    Json(payload): Json<StartExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let exam = exam_by_code(&state.pool, &payload.exam_code).await?;
    if exam.status != ExamStatus::Published {
        return Err(AppError::InvalidState(
            "Exam is not open for attempts".to_string(),
        ));
    }

    let student = super::require_student(&state.pool, &claims).await?;
    if let Some(group_id) = exam.academic_group_id {
        if group_id != student.academic_group_id {
            return Err(AppError::Forbidden(
                "This exam is scoped to a different academic group".to_string(),
            ));
        }
    }

    let questions = delivery::questions_for_student(
        &state.pool,
        exam.id,
        exam.randomize_questions,
        exam.randomize_options,
        rand::random::<u64>(),
    )
    .await?;
    if questions.is_empty() {
        return Err(AppError::InvalidState(
            "Exam has no questions yet".to_string(),
        ));
    }

    let (ip_address, user_agent) = client_meta(&headers);
    let (attempt, resumed) = attempts::start(
        &state.pool,
        exam.id,
        student.id,
        claims.user_id(),
        ip_address,
        user_agent,
    )
    .await?;

    let saved_answers = answers::list_for_attempt(&state.pool, attempt.id).await?;

    tracing::info!(
        "Attempt {} {} for exam {} ({}) by student {}",
        attempt.id,
        if resumed { "resumed" } else { "started" },
        exam.id,
        exam.exam_code,
        student.id
    );

    state.registry.publish(
        Channel::Exam(exam.id),
        EventKind::ExamProgress,
        json!({
            "exam_id": exam.id,
            "student_id": student.id,
            "attempt_id": attempt.id,
            "status": if resumed { "resumed" } else { "started" }
        }),
    );

    Ok(Json(json!({
        "attempt_id": attempt.id,
        "resumed": resumed,
        "message": if resumed { "Exam resumed" } else { "Exam started" },
        "exam": {
            "id": exam.id,
            "title": exam.title,
            "duration_minutes": exam.duration_minutes,
            "total_marks": exam.total_marks,
            "passing_marks": exam.passing_marks,
        },
        "duration_seconds": exam.duration_minutes * 60,
        "ends_at": attempt.started_at + Duration::minutes(exam.duration_minutes),
        "questions": questions,
        "answers": saved_answers
    })))
}

/// Saves (or overwrites) the answer for one question of an open,
/// caller-owned attempt.
pub async fn save_answer(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    attempts::find_owned(&pool, payload.attempt_id, claims.user_id()).await?;
    answers::save(
        &pool,
        payload.attempt_id,
        payload.question_id,
        payload.option_id,
        payload.is_skipped,
    )
    .await?;

    Ok(Json(json!({ "success": true, "message": "Answer saved" })))
}

/// Records one integrity event (tab switch, focus loss, minimize) on an
/// open, caller-owned attempt.
pub async fn track_action(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<TrackActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    attempts::find_owned(&pool, payload.attempt_id, claims.user_id()).await?;
    attempts::track(&pool, payload.attempt_id, payload.action).await?;

    Ok(Json(json!({ "success": true })))
}

/// Submits an attempt manually. At most one of any racing submissions
/// wins; the rest surface the already-completed conflict.
pub async fn submit_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = attempts::find_owned(&state.pool, payload.attempt_id, claims.user_id()).await?;
    let exam = exam_by_id(&state.pool, attempt.exam_id).await?;

    let result = attempts::submit(&state.pool, &attempt, &exam, None).await?;
    tracing::info!(
        "Attempt {} submitted: {}/{} marks, grade {}",
        attempt.id,
        result.obtained_marks,
        result.total_marks,
        result.grade
    );
    publish_result(&state.registry, &exam, &attempt, &result);

    Ok(Json(json!({
        "success": true,
        "message": "Exam submitted successfully",
        "result": result
    })))
}

/// Timer-driven submission. Refused while the server-side deadline has
/// not passed, regardless of what the client claims.
pub async fn auto_submit_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AutoSubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let attempt = attempts::find_owned(&state.pool, payload.attempt_id, claims.user_id()).await?;
    let exam = exam_by_id(&state.pool, attempt.exam_id).await?;

    let result = attempts::auto_submit(
        &state.pool,
        &attempt,
        &exam,
        payload.reason,
        state.config.auto_submit_grace_secs,
    )
    .await?;
    tracing::info!(
        "Attempt {} auto-submitted: {}/{} marks, grade {}",
        attempt.id,
        result.obtained_marks,
        result.total_marks,
        result.grade
    );
    publish_result(&state.registry, &exam, &attempt, &result);

    Ok(Json(json!({
        "success": true,
        "message": "Exam auto-submitted",
        "result": result
    })))
}

pub(crate) async fn exam_by_id(pool: &SqlitePool, exam_id: i64) -> Result<Exam, AppError> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = ?"))
        .bind(exam_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))
}

async fn exam_by_code(pool: &SqlitePool, exam_code: &str) -> Result<Exam, AppError> {
    let exam_code = exam_code.trim().to_uppercase();
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {EXAM_COLUMNS} FROM exams WHERE exam_code = ?"
    ))
    .bind(exam_code)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))
}

/// Client metadata captured when an attempt is created. The IP comes
/// from the forwarding proxy header when present.
fn client_meta(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());
    (ip_address, user_agent)
}

/// Fans the freshly graded result out: the exam channel sees the
/// submission and a leaderboard update, the student channel a personal
/// notification. Runs after the transaction committed; delivery is
/// best-effort.
fn publish_result(registry: &Registry, exam: &Exam, attempt: &ExamAttempt, result: &ExamResult) {
    registry.publish(
        Channel::Exam(exam.id),
        EventKind::ExamProgress,
        json!({
            "exam_id": exam.id,
            "student_id": attempt.student_id,
            "attempt_id": attempt.id,
            "status": "submitted"
        }),
    );
    registry.publish(
        Channel::Exam(exam.id),
        EventKind::LeaderboardUpdate,
        json!({
            "exam_id": exam.id,
            "student_id": attempt.student_id,
            "obtained_marks": result.obtained_marks,
            "total_marks": result.total_marks,
            "percentage": result.percentage,
            "grade": result.grade
        }),
    );
    registry.publish(
        Channel::Student(attempt.student_id),
        EventKind::Notification,
        json!({
            "title": "Exam graded",
            "message": format!(
                "You scored {}/{} ({:.2}%)",
                result.obtained_marks, result.total_marks, result.percentage
            ),
            "attempt_id": attempt.id
        }),
    );
}
