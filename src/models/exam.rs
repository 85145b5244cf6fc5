// src/models/exam.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Publication state of an exam. Attempts may only be created against a
/// 'published' exam; 'draft' exams are still editable, 'archived' ones are
/// retired from the join-by-code flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExamStatus {
    Draft,
    Published,
    Archived,
}

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,

    pub teacher_id: i64,

    pub subject_id: i64,

    /// Academic group the exam is addressed to. NULL means open to any group.
    pub academic_group_id: Option<i64>,

    pub title: String,

    pub description: Option<String>,

    /// Short join code students type in to start the exam (e.g. "K7Q2M9XA").
    pub exam_code: String,

    pub duration_minutes: i64,

    pub total_marks: i64,

    pub passing_marks: i64,

    pub status: ExamStatus,

    /// Whether students may view their own result after submission.
    pub show_results: bool,

    pub randomize_questions: bool,

    pub randomize_options: bool,

    pub published_at: Option<chrono::DateTime<chrono::Utc>>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a new exam (teacher only). The exam starts in 'draft'
/// status; a missing exam_code is generated server-side.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    pub subject_id: i64,
    pub academic_group_id: Option<i64>,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 4, max = 50))]
    pub exam_code: Option<String>,
    #[validate(range(min = 1, max = 480))]
    pub duration_minutes: i64,
    #[validate(range(min = 1, max = 1000))]
    pub total_marks: i64,
    #[validate(range(min = 0, max = 1000))]
    pub passing_marks: i64,
    pub show_results: Option<bool>,
    pub randomize_questions: Option<bool>,
    pub randomize_options: Option<bool>,
}

/// Aggregated per-exam numbers for the teacher dashboard.
#[derive(Debug, Serialize, FromRow)]
pub struct ExamStatistics {
    pub total_attempts: i64,
    pub avg_percentage: Option<f64>,
    pub highest_marks: Option<i64>,
    pub lowest_marks: Option<i64>,
    pub passed_count: i64,
}
