// src/handlers/student.rs

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{answers, attempts, error::AppError, utils::jwt::Claims};

#[derive(Debug, Deserialize)]
pub struct ResultQuery {
    pub attempt_id: i64,
}

/// Helper struct for the available-exams listing.
#[derive(sqlx::FromRow, serde::Serialize)]
struct AvailableExam {
    id: i64,
    title: String,
    exam_code: String,
    subject_name: String,
    duration_minutes: i64,
    total_marks: i64,
    attempt_id: Option<i64>,
    attempt_completed: Option<bool>,
}

/// Returns the graded result for an attempt the caller owns.
///
/// The numbers are always returned; the per-question review that
/// reveals correct options is only included when the exam allows it.
pub async fn get_result(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ResultQuery>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = attempts::find_owned(&pool, query.attempt_id, claims.user_id()).await?;
    let result = attempts::find_result(&pool, attempt.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Result not available yet".to_string()))?;
    let exam = super::exam::exam_by_id(&pool, attempt.exam_id).await?;

    let review = if exam.show_results {
        Some(answers::review_for_attempt(&pool, attempt.id, exam.id).await?)
    } else {
        None
    };

    Ok(Json(json!({
        "result": result,
        "exam": {
            "id": exam.id,
            "title": exam.title,
            "show_results": exam.show_results
        },
        "attempt": {
            "id": attempt.id,
            "started_at": attempt.started_at,
            "submitted_at": attempt.submitted_at,
            "auto_submitted": attempt.auto_submitted,
            "auto_submit_reason": attempt.auto_submit_reason,
            "tab_switch_count": attempt.tab_switch_count,
            "focus_lost_count": attempt.focus_lost_count,
            "window_minimized_count": attempt.window_minimized_count
        },
        "review": review
    })))
}

/// Recent attempts of the authenticated student, newest first.
pub async fn my_attempts(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student = super::require_student(&pool, &claims).await?;
    let attempts = attempts::summaries_for_student(&pool, student.id, 20).await?;
    Ok(Json(attempts))
}

/// Published exams the student can sit: scoped to their academic group
/// (or unscoped), each with the state of their own attempt if one
/// exists.
pub async fn available_exams(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student = super::require_student(&pool, &claims).await?;

    let exams = sqlx::query_as::<_, AvailableExam>(
        "SELECT e.id, e.title, e.exam_code, s.name AS subject_name,
                e.duration_minutes, e.total_marks,
                a.id AS attempt_id, a.is_completed AS attempt_completed
         FROM exams e
         JOIN subjects s ON s.id = e.subject_id
         LEFT JOIN exam_attempts a ON a.exam_id = e.id AND a.student_id = ?
         WHERE e.status = 'published'
           AND (e.academic_group_id IS NULL OR e.academic_group_id = ?)
         ORDER BY e.published_at DESC, e.id DESC",
    )
    .bind(student.id)
    .bind(student.academic_group_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch available exams: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(exams))
}
