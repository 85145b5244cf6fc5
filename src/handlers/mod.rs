// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod exam;
pub mod student;
pub mod teacher;

use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::student::{Student, Teacher};
use crate::utils::jwt::Claims;

/// Resolves the student profile behind an authenticated user.
/// Role middleware has already run; a missing profile row means the
/// account was provisioned without one.
pub(crate) async fn require_student(
    pool: &SqlitePool,
    claims: &Claims,
) -> Result<Student, AppError> {
    sqlx::query_as::<_, Student>(
        "SELECT id, user_id, first_name, last_name, academic_group_id, is_active, registered_at
         FROM students
         WHERE user_id = ?",
    )
    .bind(claims.user_id())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::Forbidden("No student profile for this account".to_string()))
}

/// Resolves the teacher profile behind an authenticated user.
pub(crate) async fn require_teacher(
    pool: &SqlitePool,
    claims: &Claims,
) -> Result<Teacher, AppError> {
    sqlx::query_as::<_, Teacher>(
        "SELECT id, user_id, first_name, last_name, is_active, registered_at
         FROM teachers
         WHERE user_id = ?",
    )
    .bind(claims.user_id())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::Forbidden("No teacher profile for this account".to_string()))
}

/// Maps a unique-constraint violation to a caller error; anything
/// else stays an internal failure.
pub(crate) fn unique_or_internal(e: sqlx::Error, message: String) -> AppError {
    if e.to_string().contains("UNIQUE constraint failed") {
        AppError::InvalidState(message)
    } else {
        tracing::error!("Database error: {:?}", e);
        AppError::from(e)
    }
}
