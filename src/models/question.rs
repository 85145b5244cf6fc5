// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// Difficulty tag on a question. Descriptive only; grading weights every
/// question equally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub exam_id: i64,

    /// The text content of the question.
    pub question_text: String,

    /// Storage key of an optional illustration.
    pub question_image: Option<String>,

    /// Descriptive weight; the scoring path derives marks-per-question from
    /// the exam's total_marks instead.
    pub marks: i64,

    pub difficulty: Difficulty,

    /// Position used when the exam is delivered without randomization.
    pub order_position: i64,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'options' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: i64,

    pub question_id: i64,

    /// 'A'..'D', unique within the question.
    pub option_letter: String,

    pub option_text: String,

    /// Exactly one option per question carries this flag.
    pub is_correct: bool,
}

/// DTO for one option inside a question-creation request.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct NewOption {
    #[validate(length(min = 1, max = 1, message = "Option letter must be a single character."))]
    pub option_letter: String,
    #[validate(length(min = 1, max = 500))]
    pub option_text: String,
    pub is_correct: bool,
}

/// DTO for adding a question (with its options) to a draft exam.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question_text: String,
    #[validate(length(max = 255))]
    pub question_image: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub marks: Option<i64>,
    pub difficulty: Option<Difficulty>,
    #[validate(nested, custom(function = validate_options))]
    pub options: Vec<NewOption>,
}

/// Options must be 2..=4 lettered A..D (either case) with exactly one
/// marked correct. Letters are compared case-insensitively because the
/// insert path uppercases them.
fn validate_options(options: &[NewOption]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 || options.len() > 4 {
        return Err(validator::ValidationError::new("need_2_to_4_options"));
    }
    let correct = options.iter().filter(|o| o.is_correct).count();
    if correct != 1 {
        return Err(validator::ValidationError::new("exactly_one_correct_option"));
    }
    let mut letters: Vec<String> = options
        .iter()
        .map(|o| o.option_letter.trim().to_uppercase())
        .collect();
    letters.sort_unstable();
    letters.dedup();
    if letters.len() != options.len() {
        return Err(validator::ValidationError::new("duplicate_option_letter"));
    }
    for letter in &letters {
        if !matches!(letter.as_str(), "A" | "B" | "C" | "D") {
            return Err(validator::ValidationError::new("option_letter_out_of_range"));
        }
    }
    Ok(())
}

/// DTO for one option as delivered to a student: never carries is_correct.
#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub id: i64,
    pub option_letter: String,
    pub option_text: String,
}

/// DTO for one question as delivered to a student taking the exam.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: i64,
    pub question_text: String,
    pub question_image: Option<String>,
    pub marks: i64,
    pub difficulty: Difficulty,
    pub options: Vec<OptionView>,
}
