// src/answers.rs

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::AppError;
use crate::models::answer::{AnswerReview, ExamAnswer};

/// Saves one answer as an upsert keyed by (attempt, question).
///
/// Skipping clears any previously selected option and selecting an
/// option clears the skip flag; the two are normalized here so a row
/// never carries both. The insert itself is guarded by the attempt
/// still being open, so a save racing a submission either lands before
/// the graded snapshot or not at all.
pub async fn save(
    pool: &SqlitePool,
    attempt_id: i64,
    question_id: i64,
    option_id: Option<i64>,
    is_skipped: bool,
) -> Result<(), AppError> {
    let (option_id, is_skipped) = if is_skipped {
        (None, true)
    } else {
        (option_id, false)
    };

    let question_in_exam = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)
         FROM questions q
         JOIN exam_attempts a ON a.exam_id = q.exam_id
         WHERE q.id = ? AND a.id = ?",
    )
    .bind(question_id)
    .bind(attempt_id)
    .fetch_one(pool)
    .await?;
    if question_in_exam == 0 {
        return Err(AppError::NotFound(
            "Question does not belong to this exam.".to_string(),
        ));
    }

    if let Some(option_id) = option_id {
        let option_in_question = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM options WHERE id = ? AND question_id = ?",
        )
        .bind(option_id)
        .bind(question_id)
        .fetch_one(pool)
        .await?;
        if option_in_question == 0 {
            return Err(AppError::BadRequest(
                "Option does not belong to this question.".to_string(),
            ));
        }
    }

    let result = sqlx::query(
        "INSERT INTO exam_answers (exam_attempt_id, question_id, selected_option_id, is_skipped, answered_at)
         SELECT ?, ?, ?, ?, ?
         WHERE EXISTS (SELECT 1 FROM exam_attempts WHERE id = ? AND is_completed = 0)
         ON CONFLICT (exam_attempt_id, question_id) DO UPDATE SET
             selected_option_id = excluded.selected_option_id,
             is_skipped = excluded.is_skipped,
             answered_at = excluded.answered_at",
    )
    .bind(attempt_id)
    .bind(question_id)
    .bind(option_id)
    .bind(is_skipped)
    .bind(Utc::now())
    .bind(attempt_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::InvalidState(
            "Attempt is already completed.".to_string(),
        ));
    }

    Ok(())
}

/// Counts answers whose selected option is flagged correct. Rows with
/// no selected option never count.
pub async fn count_correct(
    conn: &mut SqliteConnection,
    attempt_id: i64,
) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)
         FROM exam_answers ea
         JOIN options o ON o.id = ea.selected_option_id
         WHERE ea.exam_attempt_id = ? AND o.is_correct = 1",
    )
    .bind(attempt_id)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// Counts answers explicitly marked skipped.
pub async fn count_skipped(
    conn: &mut SqliteConnection,
    attempt_id: i64,
) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM exam_answers WHERE exam_attempt_id = ? AND is_skipped = 1",
    )
    .bind(attempt_id)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// Counts saved answers that are not skips. Questions never touched
/// have no row at all, so they are not part of this count.
pub async fn count_answered(
    conn: &mut SqliteConnection,
    attempt_id: i64,
) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM exam_answers WHERE exam_attempt_id = ? AND is_skipped = 0",
    )
    .bind(attempt_id)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// Raw answer rows for one attempt, in question order.
pub async fn list_for_attempt(
    pool: &SqlitePool,
    attempt_id: i64,
) -> Result<Vec<ExamAnswer>, AppError> {
    let answers = sqlx::query_as::<_, ExamAnswer>(
        "SELECT id, exam_attempt_id, question_id, selected_option_id, is_skipped, answered_at
         FROM exam_answers
         WHERE exam_attempt_id = ?
         ORDER BY question_id",
    )
    .bind(attempt_id)
    .fetch_all(pool)
    .await?;
    Ok(answers)
}

/// Full answer review for one graded attempt: every exam question with
/// what was picked and what was correct. Questions never answered come
/// back with nothing selected.
pub async fn review_for_attempt(
    pool: &SqlitePool,
    attempt_id: i64,
    exam_id: i64,
) -> Result<Vec<AnswerReview>, AppError> {
    let review = sqlx::query_as::<_, AnswerReview>(
        "SELECT q.id AS question_id,
                q.question_text,
                q.marks,
                ea.selected_option_id,
                so.option_text AS selected_option_text,
                co.id AS correct_option_id,
                co.option_text AS correct_option_text,
                COALESCE(ea.is_skipped, 0) AS is_skipped,
                COALESCE(so.is_correct, 0) AS is_correct
         FROM questions q
         LEFT JOIN exam_answers ea ON ea.question_id = q.id AND ea.exam_attempt_id = ?
         LEFT JOIN options so ON so.id = ea.selected_option_id
         LEFT JOIN options co ON co.question_id = q.id AND co.is_correct = 1
         WHERE q.exam_id = ?
         ORDER BY q.order_position, q.id",
    )
    .bind(attempt_id)
    .bind(exam_id)
    .fetch_all(pool)
    .await?;
    Ok(review)
}
