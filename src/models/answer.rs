// src/models/answer.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'exam_answers' table in the database.
/// One row per (attempt, question) pair; saves are upserts against it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamAnswer {
    pub id: i64,

    pub exam_attempt_id: i64,

    pub question_id: i64,

    /// Chosen option, or None when nothing was picked.
    pub selected_option_id: Option<i64>,

    pub is_skipped: bool,

    pub answered_at: chrono::DateTime<chrono::Utc>,
}

/// One question of the post-submission answer review, with the
/// correct option revealed alongside whatever the student picked.
#[derive(Debug, Serialize, FromRow)]
pub struct AnswerReview {
    pub question_id: i64,
    pub question_text: String,
    pub marks: i64,
    pub selected_option_id: Option<i64>,
    pub selected_option_text: Option<String>,
    pub correct_option_id: Option<i64>,
    pub correct_option_text: Option<String>,
    pub is_skipped: bool,
    pub is_correct: bool,
}
