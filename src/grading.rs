// src/grading.rs

use serde::Serialize;

use crate::error::AppError;

/// Everything the submission path needs to persist a result row.
/// Counts are echoed back so the caller writes the row from one value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeSheet {
    pub total_questions: i64,
    pub correct_answers: i64,
    pub skipped: i64,
    pub total_marks: i64,
    pub obtained_marks: i64,
    pub percentage: f64,
    pub is_passed: bool,
    pub grade: &'static str,
}

/// Grades one completed attempt from raw counts.
///
/// Marks are weighted equally across questions: each correct answer is
/// worth total_marks / total_questions, and the product is rounded
/// half-up to whole marks. The percentage is rounded to two decimals
/// and drives the letter grade; passing compares whole marks against
/// the exam's passing threshold.
///
/// Deterministic and side-effect free. An exam with zero questions (or
/// zero total marks) cannot be graded and is refused; callers check the
/// question count before ever getting here.
pub fn grade(
    total_questions: i64,
    correct_answers: i64,
    skipped: i64,
    total_marks: i64,
    passing_marks: i64,
) -> Result<GradeSheet, AppError> {
    if total_questions <= 0 {
        return Err(AppError::InternalServerError(
            "cannot grade an exam with no questions".to_string(),
        ));
    }
    if total_marks <= 0 {
        return Err(AppError::InternalServerError(
            "cannot grade an exam with no marks".to_string(),
        ));
    }

    let marks_per_question = total_marks as f64 / total_questions as f64;
    // f64::round is half-away-from-zero, which is half-up for the
    // non-negative values possible here.
    let obtained_marks = (correct_answers as f64 * marks_per_question).round() as i64;

    let percentage = round2(obtained_marks as f64 / total_marks as f64 * 100.0);

    Ok(GradeSheet {
        total_questions,
        correct_answers,
        skipped,
        total_marks,
        obtained_marks,
        percentage,
        is_passed: obtained_marks >= passing_marks,
        grade: letter_grade(percentage),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Thresholds are inclusive lower bounds on the rounded percentage.
fn letter_grade(percentage: f64) -> &'static str {
    if percentage >= 90.0 {
        "A"
    } else if percentage >= 80.0 {
        "B"
    } else if percentage >= 70.0 {
        "C"
    } else if percentage >= 60.0 {
        "D"
    } else {
        "F"
    }
}
