// src/models/catalog.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'academic_groups' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AcademicGroup {
    pub id: i64,

    /// Short unique code, e.g. "JSS2-A".
    pub code: String,

    pub name: String,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'subjects' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,

    pub code: String,

    pub name: String,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating an academic group.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

/// DTO for creating a subject.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubjectRequest {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}
