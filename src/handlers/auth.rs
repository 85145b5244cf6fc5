// src/handlers/auth.rs

use axum::{Json, extract::State, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, User},
    utils::{hash::verify_pin, jwt::sign_jwt},
};

/// Authenticates a user and returns a JWT token.
///
/// Looks the account up by login code, verifies the PIN against its
/// Argon2 hash and signs a token carrying the user's id and role. The
/// response also carries the linked student or teacher profile id so
/// clients do not need a second round trip.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let login_code = payload.login_code.trim().to_uppercase();

    let user = sqlx::query_as::<_, User>(
        "SELECT id, login_code, role, pin_hash, is_active, last_login, created_at
         FROM users
         WHERE login_code = ?",
    )
    .bind(&login_code)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    // Same message whether the code or the PIN was wrong.
    let user = user.ok_or(AppError::AuthError("Invalid login code or PIN".to_string()))?;

    if !user.is_active {
        return Err(AppError::Forbidden("Account is disabled".to_string()));
    }

    let is_valid = verify_pin(&payload.pin, &user.pin_hash)?;
    if !is_valid {
        tracing::warn!("Failed login attempt for {}", login_code);
        return Err(AppError::AuthError("Invalid login code or PIN".to_string()));
    }

    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user.id)
        .execute(&pool)
        .await?;

    let (student_id, teacher_id) = profile_ids(&pool, &user).await?;

    let token = sign_jwt(user.id, &user.role, &config.jwt_secret, config.jwt_expiration)?;

    tracing::info!("User {} logged in as {}", login_code, user.role);

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "user_id": user.id,
        "role": user.role,
        "student_id": student_id,
        "teacher_id": teacher_id
    })))
}

/// Profile row ids for the role, if the account has one.
async fn profile_ids(
    pool: &SqlitePool,
    user: &User,
) -> Result<(Option<i64>, Option<i64>), AppError> {
    match user.role.as_str() {
        "student" => {
            let id = sqlx::query_scalar::<_, i64>("SELECT id FROM students WHERE user_id = ?")
                .bind(user.id)
                .fetch_optional(pool)
                .await?;
            Ok((id, None))
        }
        "teacher" => {
            let id = sqlx::query_scalar::<_, i64>("SELECT id FROM teachers WHERE user_id = ?")
                .bind(user.id)
                .fetch_optional(pool)
                .await?;
            Ok((None, id))
        }
        _ => Ok((None, None)),
    }
}
