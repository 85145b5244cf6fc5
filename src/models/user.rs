// src/models/user.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Letters, digits, dashes and underscores, the charset school-issued
/// codes are minted from.
pub(crate) static LOGIN_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Represents the 'users' table in the database.
/// Base identity record shared by students, teachers and admins.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique login code handed out by the school (e.g. "STU-2024-0417").
    pub login_code: String,

    /// User role: 'student', 'teacher' or 'admin'.
    pub role: String,

    /// Argon2 hash of the short numeric PIN.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub pin_hash: String,

    /// Deactivated accounts cannot log in.
    pub is_active: bool,

    pub last_login: Option<chrono::DateTime<chrono::Utc>>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(
        length(
            min = 3,
            max = 50,
            message = "Login code length must be between 3 and 50 characters."
        ),
        regex(
            path = *LOGIN_CODE_RE,
            message = "Login code may only contain letters, digits, dashes and underscores."
        )
    )]
    pub login_code: String,
    #[validate(length(
        min = 4,
        max = 12,
        message = "PIN length must be between 4 and 12 characters."
    ))]
    pub pin: String,
}
