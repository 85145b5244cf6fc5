// src/models/result.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'exam_results' table in the database.
/// Written exactly once per attempt, inside the submission transaction.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamResult {
    pub id: i64,

    pub exam_attempt_id: i64,

    pub exam_id: i64,

    pub student_id: i64,

    pub total_questions: i64,

    pub correct_answers: i64,

    pub skipped: i64,

    pub total_marks: i64,

    pub obtained_marks: i64,

    /// Percentage rounded to two decimal places.
    pub percentage: f64,

    pub is_passed: bool,

    /// Letter grade A..D or F.
    pub grade: String,

    pub graded_at: chrono::DateTime<chrono::Utc>,
}

/// One row of a teacher's leaderboard, ordered by marks then grading time.
#[derive(Debug, Serialize, FromRow)]
pub struct LeaderboardEntry {
    pub student_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub login_code: String,
    pub academic_group_id: Option<i64>,
    pub obtained_marks: i64,
    pub total_marks: i64,
    pub percentage: f64,
    pub grade: String,
    pub is_passed: bool,
    pub graded_at: chrono::DateTime<chrono::Utc>,
}
