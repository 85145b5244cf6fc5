// src/attempts.rs

use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use crate::answers;
use crate::error::AppError;
use crate::grading;
use crate::models::attempt::{AttemptState, AttemptSummary, ExamAttempt, TrackKind};
use crate::models::exam::Exam;
use crate::models::result::ExamResult;

const ATTEMPT_COLUMNS: &str = "id, exam_id, student_id, user_id, started_at, submitted_at, \
     ip_address, user_agent, tab_switch_count, focus_lost_count, window_minimized_count, \
     is_completed, auto_submitted, auto_submit_reason";

/// Starts an attempt, or resumes the open one for this (exam, student)
/// pair. Returns the attempt and whether it was resumed.
///
/// The insert is conflict-tolerant, so two racing starts converge on
/// the single row the unique constraint allows. A completed attempt
/// can never be restarted.
pub async fn start(
    pool: &SqlitePool,
    exam_id: i64,
    student_id: i64,
    user_id: i64,
    ip_address: Option<String>,
    user_agent: Option<String>,
) -> Result<(ExamAttempt, bool), AppError> {
    let inserted = sqlx::query(
        "INSERT INTO exam_attempts (exam_id, student_id, user_id, started_at, ip_address, user_agent)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (exam_id, student_id) DO NOTHING",
    )
    .bind(exam_id)
    .bind(student_id)
    .bind(user_id)
    .bind(Utc::now())
    .bind(&ip_address)
    .bind(&user_agent)
    .execute(pool)
    .await?;

    let attempt = find_by_pair(pool, exam_id, student_id).await?.ok_or_else(|| {
        AppError::InternalServerError("attempt row missing right after insert".to_string())
    })?;

    if AttemptState::of(Some(&attempt))?.is_completed() {
        return Err(AppError::InvalidState(
            "You have already completed this exam.".to_string(),
        ));
    }

    Ok((attempt, inserted.rows_affected() == 0))
}

/// Loads an attempt and verifies the caller owns it.
pub async fn find_owned(
    pool: &SqlitePool,
    attempt_id: i64,
    user_id: i64,
) -> Result<ExamAttempt, AppError> {
    let attempt = sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM exam_attempts WHERE id = ?"
    ))
    .bind(attempt_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Attempt not found.".to_string()))?;

    if attempt.user_id != user_id {
        return Err(AppError::Forbidden(
            "This attempt belongs to another student.".to_string(),
        ));
    }
    Ok(attempt)
}

pub async fn find_by_pair(
    pool: &SqlitePool,
    exam_id: i64,
    student_id: i64,
) -> Result<Option<ExamAttempt>, AppError> {
    let attempt = sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM exam_attempts WHERE exam_id = ? AND student_id = ?"
    ))
    .bind(exam_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;
    Ok(attempt)
}

/// Bumps one integrity counter. A single conditional UPDATE, so two
/// racing reports both land and a closed attempt takes none.
pub async fn track(pool: &SqlitePool, attempt_id: i64, kind: TrackKind) -> Result<(), AppError> {
    let column = kind.column();
    let sql = format!(
        "UPDATE exam_attempts SET {column} = {column} + 1 WHERE id = ? AND is_completed = 0"
    );
    let result = sqlx::query(&sql).bind(attempt_id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::InvalidState(
            "Attempt is already completed.".to_string(),
        ));
    }
    Ok(())
}

/// Finalizes an attempt: claims it, aggregates its answers, grades and
/// persists the result, all in one transaction.
///
/// The claim is a conditional UPDATE on is_completed, so exactly one of
/// any set of racing submissions wins; losers roll back and surface
/// `AlreadyCompleted`. Aggregation runs on the transaction connection,
/// after the claim, so saves landing mid-submission are either part of
/// the graded snapshot or refused by their own open-attempt guard.
pub async fn submit(
    pool: &SqlitePool,
    attempt: &ExamAttempt,
    exam: &Exam,
    auto_reason: Option<&str>,
) -> Result<ExamResult, AppError> {
    let mut tx = pool.begin().await?;
    let now = Utc::now();

    let claimed = sqlx::query(
        "UPDATE exam_attempts
         SET submitted_at = ?, is_completed = 1, auto_submitted = ?, auto_submit_reason = ?
         WHERE id = ? AND is_completed = 0",
    )
    .bind(now)
    .bind(auto_reason.is_some())
    .bind(auto_reason)
    .bind(attempt.id)
    .execute(&mut *tx)
    .await?;

    if claimed.rows_affected() == 0 {
        return Err(AppError::InvalidState(
            "You have already completed this exam.".to_string(),
        ));
    }

    let total_questions =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions WHERE exam_id = ?")
            .bind(exam.id)
            .fetch_one(&mut *tx)
            .await?;
    if total_questions == 0 {
        return Err(AppError::InvalidState(
            "Exam has no questions to grade.".to_string(),
        ));
    }

    let correct_answers = answers::count_correct(&mut tx, attempt.id).await?;
    let skipped = answers::count_skipped(&mut tx, attempt.id).await?;

    let sheet = grading::grade(
        total_questions,
        correct_answers,
        skipped,
        exam.total_marks,
        exam.passing_marks,
    )?;

    let inserted = sqlx::query(
        "INSERT INTO exam_results
             (exam_attempt_id, exam_id, student_id, total_questions, correct_answers,
              skipped, total_marks, obtained_marks, percentage, is_passed, grade, graded_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(attempt.id)
    .bind(exam.id)
    .bind(attempt.student_id)
    .bind(sheet.total_questions)
    .bind(sheet.correct_answers)
    .bind(sheet.skipped)
    .bind(sheet.total_marks)
    .bind(sheet.obtained_marks)
    .bind(sheet.percentage)
    .bind(sheet.is_passed)
    .bind(sheet.grade)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(ExamResult {
        id: inserted.last_insert_rowid(),
        exam_attempt_id: attempt.id,
        exam_id: exam.id,
        student_id: attempt.student_id,
        total_questions: sheet.total_questions,
        correct_answers: sheet.correct_answers,
        skipped: sheet.skipped,
        total_marks: sheet.total_marks,
        obtained_marks: sheet.obtained_marks,
        percentage: sheet.percentage,
        is_passed: sheet.is_passed,
        grade: sheet.grade.to_string(),
        graded_at: now,
    })
}

/// Timer-driven submission. The server keeps its own deadline from
/// started_at plus the exam duration; a call arriving before that
/// deadline (minus a small clock-skew grace) is refused, so a client
/// cannot finalize early by lying about elapsed time.
pub async fn auto_submit(
    pool: &SqlitePool,
    attempt: &ExamAttempt,
    exam: &Exam,
    reason: Option<String>,
    grace_secs: i64,
) -> Result<ExamResult, AppError> {
    let deadline = attempt.started_at + Duration::minutes(exam.duration_minutes)
        - Duration::seconds(grace_secs);
    if Utc::now() < deadline {
        return Err(AppError::InvalidState(
            "Exam time has not expired yet.".to_string(),
        ));
    }

    let reason = reason.unwrap_or_else(|| "Timer ended".to_string());
    submit(pool, attempt, exam, Some(&reason)).await
}

pub async fn find_result(
    pool: &SqlitePool,
    attempt_id: i64,
) -> Result<Option<ExamResult>, AppError> {
    let result = sqlx::query_as::<_, ExamResult>(
        "SELECT id, exam_attempt_id, exam_id, student_id, total_questions, correct_answers,
                skipped, total_marks, obtained_marks, percentage, is_passed, grade, graded_at
         FROM exam_results
         WHERE exam_attempt_id = ?",
    )
    .bind(attempt_id)
    .fetch_optional(pool)
    .await?;
    Ok(result)
}

/// Recent attempts for one student's dashboard, newest first.
pub async fn summaries_for_student(
    pool: &SqlitePool,
    student_id: i64,
    limit: i64,
) -> Result<Vec<AttemptSummary>, AppError> {
    let summaries = sqlx::query_as::<_, AttemptSummary>(
        "SELECT a.id, a.exam_id, e.title AS exam_title, a.started_at, a.is_completed,
                a.auto_submitted, r.id IS NOT NULL AS is_graded,
                r.obtained_marks, r.total_marks, r.percentage
         FROM exam_attempts a
         JOIN exams e ON e.id = a.exam_id
         LEFT JOIN exam_results r ON r.exam_attempt_id = a.id
         WHERE a.student_id = ?
         ORDER BY a.started_at DESC, a.id DESC
         LIMIT ?",
    )
    .bind(student_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(summaries)
}
