// src/models/student.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::user::LOGIN_CODE_RE;

/// Represents the 'students' table in the database.
/// One row per enrolled student, linked 1:1 to a `users` row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,

    pub user_id: i64,

    pub first_name: String,

    pub last_name: String,

    /// The class/grade/arm combination the student belongs to.
    /// Exams and leaderboards are scoped by this.
    pub academic_group_id: i64,

    pub is_active: bool,

    pub registered_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for provisioning a student account with its profile.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStudentRequest {
    #[validate(
        length(min = 3, max = 50),
        regex(
            path = *LOGIN_CODE_RE,
            message = "Login code may only contain letters, digits, dashes and underscores."
        )
    )]
    pub login_code: String,
    #[validate(length(min = 4, max = 12, message = "PIN length must be between 4 and 12 characters."))]
    pub pin: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    pub academic_group_id: i64,
}

/// DTO for provisioning a teacher account with its profile.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeacherRequest {
    #[validate(
        length(min = 3, max = 50),
        regex(
            path = *LOGIN_CODE_RE,
            message = "Login code may only contain letters, digits, dashes and underscores."
        )
    )]
    pub login_code: String,
    #[validate(length(min = 4, max = 12, message = "PIN length must be between 4 and 12 characters."))]
    pub pin: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
}

/// Represents the 'teachers' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Teacher {
    pub id: i64,

    pub user_id: i64,

    pub first_name: String,

    pub last_name: String,

    pub is_active: bool,

    pub registered_at: Option<chrono::DateTime<chrono::Utc>>,
}
