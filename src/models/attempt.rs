// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Represents the 'exam_attempts' table in the database.
/// One row per (exam, student) pair; the pair is UNIQUE-constrained.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamAttempt {
    pub id: i64,

    pub exam_id: i64,

    pub student_id: i64,

    pub user_id: i64,

    pub started_at: chrono::DateTime<chrono::Utc>,

    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Client metadata captured once, at creation.
    pub ip_address: Option<String>,

    pub user_agent: Option<String>,

    /// Integrity counters, bumped by track-action calls while in progress.
    pub tab_switch_count: i64,

    pub focus_lost_count: i64,

    pub window_minimized_count: i64,

    pub is_completed: bool,

    pub auto_submitted: bool,

    pub auto_submit_reason: Option<String>,
}

/// How a completed attempt was finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
    Manual,
    Auto,
}

/// Explicit lifecycle state of one attempt.
///
/// `NotStarted` stands for "no row exists"; a `Completed` value always
/// carries its submission timestamp, so a completed attempt without one
/// cannot be represented past this point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    NotStarted,
    InProgress,
    Completed {
        kind: CompletionKind,
        submitted_at: chrono::DateTime<chrono::Utc>,
    },
}

impl AttemptState {
    /// Classifies an optional attempt row into its lifecycle state.
    ///
    /// A row flagged completed but missing its timestamp is storage
    /// corruption and is refused rather than guessed at.
    pub fn of(row: Option<&ExamAttempt>) -> Result<Self, AppError> {
        let Some(attempt) = row else {
            return Ok(AttemptState::NotStarted);
        };

        if !attempt.is_completed {
            return Ok(AttemptState::InProgress);
        }

        let submitted_at = attempt.submitted_at.ok_or_else(|| {
            AppError::InternalServerError(format!(
                "attempt {} is completed but has no submission timestamp",
                attempt.id
            ))
        })?;

        let kind = if attempt.auto_submitted {
            CompletionKind::Auto
        } else {
            CompletionKind::Manual
        };

        Ok(AttemptState::Completed { kind, submitted_at })
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, AttemptState::Completed { .. })
    }
}

/// Integrity event kinds a client may report during an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    TabSwitch,
    FocusLost,
    WindowMinimized,
}

impl TrackKind {
    /// Column the counter lives in.
    pub fn column(&self) -> &'static str {
        match self {
            TrackKind::TabSwitch => "tab_switch_count",
            TrackKind::FocusLost => "focus_lost_count",
            TrackKind::WindowMinimized => "window_minimized_count",
        }
    }
}

/// DTO for starting (or resuming) an exam by join code.
#[derive(Debug, Deserialize, Validate)]
pub struct StartExamRequest {
    #[validate(length(min = 1, max = 50, message = "Exam code required."))]
    pub exam_code: String,
}

/// DTO for the per-question autosave call.
#[derive(Debug, Deserialize, Validate)]
pub struct SaveAnswerRequest {
    pub attempt_id: i64,
    pub question_id: i64,
    pub option_id: Option<i64>,
    #[serde(default)]
    pub is_skipped: bool,
}

/// DTO for reporting an integrity event.
#[derive(Debug, Deserialize)]
pub struct TrackActionRequest {
    pub attempt_id: i64,
    pub action: TrackKind,
}

/// DTO for manual submission.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub attempt_id: i64,
}

/// DTO for timer-driven submission.
#[derive(Debug, Deserialize, Validate)]
pub struct AutoSubmitRequest {
    pub attempt_id: i64,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
}

/// One row of the student's recent-attempts dashboard list.
#[derive(Debug, Serialize, FromRow)]
pub struct AttemptSummary {
    pub id: i64,
    pub exam_id: i64,
    pub exam_title: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub is_completed: bool,
    pub auto_submitted: bool,
    pub is_graded: bool,
    pub obtained_marks: Option<i64>,
    pub total_marks: Option<i64>,
    pub percentage: Option<f64>,
}
