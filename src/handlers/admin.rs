// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        catalog::{CreateGroupRequest, CreateSubjectRequest},
        student::{CreateStudentRequest, CreateTeacherRequest},
        user::User,
    },
    utils::hash::hash_pin,
};

/// DTO for toggling an account on or off.
#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Lists all accounts.
/// Admin only.
pub async fn list_users(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT id, login_code, role, pin_hash, is_active, last_login, created_at
         FROM users
         ORDER BY id DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// Creates a student account together with its profile, atomically.
/// Admin only.
pub async fn create_student(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateStudentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let group_exists =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM academic_groups WHERE id = ?")
            .bind(payload.academic_group_id)
            .fetch_one(&pool)
            .await?;
    if group_exists == 0 {
        return Err(AppError::BadRequest("Unknown academic group".to_string()));
    }

    let login_code = payload.login_code.trim().to_uppercase();
    let pin_hash = hash_pin(&payload.pin)?;

    let mut tx = pool.begin().await?;

    let user = sqlx::query(
        "INSERT INTO users (login_code, role, pin_hash) VALUES (?, 'student', ?)",
    )
    .bind(&login_code)
    .bind(&pin_hash)
    .execute(&mut *tx)
    .await
    .map_err(|e| super::unique_or_internal(e, format!("Login code '{login_code}' already exists")))?;
    let user_id = user.last_insert_rowid();

    let student = sqlx::query(
        "INSERT INTO students (user_id, first_name, last_name, academic_group_id)
         VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(payload.academic_group_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!("Student account {} created", login_code);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user_id": user_id,
            "student_id": student.last_insert_rowid(),
            "login_code": login_code
        })),
    ))
}

/// Creates a teacher account together with its profile, atomically.
/// Admin only.
pub async fn create_teacher(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateTeacherRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let login_code = payload.login_code.trim().to_uppercase();
    let pin_hash = hash_pin(&payload.pin)?;

    let mut tx = pool.begin().await?;

    let user = sqlx::query(
        "INSERT INTO users (login_code, role, pin_hash) VALUES (?, 'teacher', ?)",
    )
    .bind(&login_code)
    .bind(&pin_hash)
    .execute(&mut *tx)
    .await
    .map_err(|e| super::unique_or_internal(e, format!("Login code '{login_code}' already exists")))?;
    let user_id = user.last_insert_rowid();

    let teacher = sqlx::query(
        "INSERT INTO teachers (user_id, first_name, last_name) VALUES (?, ?, ?)",
    )
    .bind(user_id)
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!("Teacher account {} created", login_code);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user_id": user_id,
            "teacher_id": teacher.last_insert_rowid(),
            "login_code": login_code
        })),
    ))
}

/// Creates an academic group.
/// Admin only.
pub async fn create_group(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let code = payload.code.trim().to_uppercase();
    let inserted = sqlx::query("INSERT INTO academic_groups (code, name) VALUES (?, ?)")
        .bind(&code)
        .bind(payload.name.trim())
        .execute(&pool)
        .await
        .map_err(|e| super::unique_or_internal(e, format!("Group code '{code}' already exists")))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": inserted.last_insert_rowid(), "code": code })),
    ))
}

/// Creates a subject.
/// Admin only.
pub async fn create_subject(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateSubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let code = payload.code.trim().to_uppercase();
    let inserted = sqlx::query("INSERT INTO subjects (code, name) VALUES (?, ?)")
        .bind(&code)
        .bind(payload.name.trim())
        .execute(&pool)
        .await
        .map_err(|e| super::unique_or_internal(e, format!("Subject code '{code}' already exists")))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": inserted.last_insert_rowid(), "code": code })),
    ))
}

/// Enables or disables an account. A disabled account cannot log in;
/// tokens already issued keep working until they expire.
/// Admin only.
pub async fn set_user_active(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let updated = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
        .bind(payload.is_active)
        .bind(id)
        .execute(&pool)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(
        "User {} {}",
        id,
        if payload.is_active { "enabled" } else { "disabled" }
    );
    Ok(Json(json!({ "success": true, "is_active": payload.is_active })))
}
