// src/handlers/teacher.rs

use std::sync::LazyLock;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        catalog::{AcademicGroup, Subject},
        exam::{CreateExamRequest, Exam, ExamStatistics, ExamStatus},
        question::CreateQuestionRequest,
        result::LeaderboardEntry,
        student::Teacher,
    },
    utils::{html::clean_html, jwt::Claims},
};

const EXAM_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const EXAM_CODE_LEN: usize = 8;

static EXAM_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9_-]{4,50}$").unwrap());

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub academic_group_id: Option<i64>,
    pub limit: Option<i64>,
}

/// Helper struct for the exam listing with its content/attempt counts.
#[derive(sqlx::FromRow, serde::Serialize)]
struct ExamListing {
    id: i64,
    title: String,
    exam_code: String,
    status: ExamStatus,
    duration_minutes: i64,
    total_marks: i64,
    passing_marks: i64,
    question_count: i64,
    attempt_count: i64,
    published_at: Option<chrono::DateTime<chrono::Utc>>,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Creates a draft exam owned by the authenticated teacher.
///
/// The join code is taken from the request (uppercased) or minted
/// randomly; either way it must be unique. Title and description are
/// sanitized before storage.
pub async fn create_exam(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let teacher = super::require_teacher(&pool, &claims).await?;

    let subject_exists =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM subjects WHERE id = ?")
            .bind(payload.subject_id)
            .fetch_one(&pool)
            .await?;
    if subject_exists == 0 {
        return Err(AppError::BadRequest("Unknown subject".to_string()));
    }

    if let Some(group_id) = payload.academic_group_id {
        let group_exists =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM academic_groups WHERE id = ?")
                .bind(group_id)
                .fetch_one(&pool)
                .await?;
        if group_exists == 0 {
            return Err(AppError::BadRequest("Unknown academic group".to_string()));
        }
    }

    let exam_code = match &payload.exam_code {
        Some(code) => {
            let code = code.trim().to_uppercase();
            if !EXAM_CODE_RE.is_match(&code) {
                return Err(AppError::BadRequest(
                    "Exam code must be 4-50 characters of letters, digits, dashes and underscores"
                        .to_string(),
                ));
            }
            if exam_code_taken(&pool, &code).await? {
                return Err(AppError::InvalidState(
                    "Exam code already in use".to_string(),
                ));
            }
            code
        }
        None => unique_exam_code(&pool).await?,
    };

    let title = clean_html(&payload.title);
    let description = payload.description.as_deref().map(clean_html);

    let inserted = sqlx::query(
        "INSERT INTO exams
             (teacher_id, subject_id, academic_group_id, title, description, exam_code,
              duration_minutes, total_marks, passing_marks, show_results,
              randomize_questions, randomize_options)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(teacher.id)
    .bind(payload.subject_id)
    .bind(payload.academic_group_id)
    .bind(&title)
    .bind(&description)
    .bind(&exam_code)
    .bind(payload.duration_minutes)
    .bind(payload.total_marks)
    .bind(payload.passing_marks)
    .bind(payload.show_results.unwrap_or(false))
    .bind(payload.randomize_questions.unwrap_or(true))
    .bind(payload.randomize_options.unwrap_or(true))
    .execute(&pool)
    .await
    // Two requests can race past exam_code_taken; the loser's unique
    // violation gets the same refusal the check would have given.
    .map_err(|e| super::unique_or_internal(e, "Exam code already in use".to_string()))?;

    let exam = super::exam::exam_by_id(&pool, inserted.last_insert_rowid()).await?;
    tracing::info!("Teacher {} created exam {} ({})", teacher.id, exam.id, exam.exam_code);

    Ok((StatusCode::CREATED, Json(exam)))
}

/// Adds one question (with its options) to a draft exam the caller
/// owns. Question and option texts are sanitized; the question lands at
/// the end of the authored order.
pub async fn add_question(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let exam = owned_exam(&pool, &claims, exam_id).await?;
    if exam.status != ExamStatus::Draft {
        return Err(AppError::InvalidState(
            "Questions can only be added while the exam is a draft".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let order_position = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(MAX(order_position), 0) + 1 FROM questions WHERE exam_id = ?",
    )
    .bind(exam.id)
    .fetch_one(&mut *tx)
    .await?;

    let question = sqlx::query(
        "INSERT INTO questions (exam_id, question_text, question_image, marks, difficulty, order_position)
         VALUES (?, ?, ?, ?, COALESCE(?, 'medium'), ?)",
    )
    .bind(exam.id)
    .bind(clean_html(&payload.question_text))
    .bind(&payload.question_image)
    .bind(payload.marks.unwrap_or(1))
    .bind(payload.difficulty)
    .bind(order_position)
    .execute(&mut *tx)
    .await?;
    let question_id = question.last_insert_rowid();

    for option in &payload.options {
        sqlx::query(
            "INSERT INTO options (question_id, option_letter, option_text, is_correct)
             VALUES (?, ?, ?, ?)",
        )
        .bind(question_id)
        .bind(option.option_letter.trim().to_uppercase())
        .bind(clean_html(&option.option_text))
        .bind(option.is_correct)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "question_id": question_id,
            "order_position": order_position
        })),
    ))
}

/// Publishes a draft exam, opening it to attempts. Refused while the
/// exam has no questions or a question has no correct option.
pub async fn publish_exam(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = owned_exam(&pool, &claims, exam_id).await?;
    if exam.status != ExamStatus::Draft {
        return Err(AppError::InvalidState(
            "Only draft exams can be published".to_string(),
        ));
    }

    let question_count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions WHERE exam_id = ?")
            .bind(exam.id)
            .fetch_one(&pool)
            .await?;
    if question_count == 0 {
        return Err(AppError::InvalidState(
            "Cannot publish an exam without questions".to_string(),
        ));
    }

    let keyless_questions = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)
         FROM questions q
         WHERE q.exam_id = ?
           AND NOT EXISTS (SELECT 1 FROM options o WHERE o.question_id = q.id AND o.is_correct = 1)",
    )
    .bind(exam.id)
    .fetch_one(&pool)
    .await?;
    if keyless_questions > 0 {
        return Err(AppError::InvalidState(
            "Every question needs a correct option before publishing".to_string(),
        ));
    }

    sqlx::query("UPDATE exams SET status = 'published', published_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(exam.id)
        .execute(&pool)
        .await?;

    tracing::info!("Exam {} ({}) published", exam.id, exam.exam_code);

    Ok(Json(json!({
        "success": true,
        "message": "Exam published",
        "exam_code": exam.exam_code
    })))
}

/// Lists the caller's exams with question and attempt counts.
pub async fn list_exams(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let teacher = super::require_teacher(&pool, &claims).await?;

    let exams = sqlx::query_as::<_, ExamListing>(
        "SELECT e.id, e.title, e.exam_code, e.status, e.duration_minutes, e.total_marks,
                e.passing_marks,
                (SELECT COUNT(*) FROM questions q WHERE q.exam_id = e.id) AS question_count,
                (SELECT COUNT(*) FROM exam_attempts a WHERE a.exam_id = e.id) AS attempt_count,
                e.published_at, e.created_at
         FROM exams e
         WHERE e.teacher_id = ?
         ORDER BY e.created_at DESC, e.id DESC",
    )
    .bind(teacher.id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch exams: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(exams))
}

/// Ranked results for one exam the caller owns: marks descending,
/// earlier grading first among ties, optionally scoped to one group.
pub async fn get_leaderboard(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse, AppError> {
    let exam = owned_exam(&pool, &claims, exam_id).await?;
    let limit = query.limit.unwrap_or(50).clamp(1, 100);

    let entries = sqlx::query_as::<_, LeaderboardEntry>(
        "SELECT r.student_id, s.first_name, s.last_name, u.login_code, s.academic_group_id,
                r.obtained_marks, r.total_marks, r.percentage, r.grade, r.is_passed, r.graded_at
         FROM exam_results r
         JOIN students s ON s.id = r.student_id
         JOIN users u ON u.id = s.user_id
         WHERE r.exam_id = ?
           AND (? IS NULL OR s.academic_group_id = ?)
         ORDER BY r.obtained_marks DESC, r.graded_at ASC
         LIMIT ?",
    )
    .bind(exam.id)
    .bind(query.academic_group_id)
    .bind(query.academic_group_id)
    .bind(limit)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch leaderboard: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(json!({
        "exam_id": exam.id,
        "exam_title": exam.title,
        "entries": entries
    })))
}

/// Aggregate statistics over one exam's graded results.
pub async fn get_statistics(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = owned_exam(&pool, &claims, exam_id).await?;

    let stats = sqlx::query_as::<_, ExamStatistics>(
        "SELECT COUNT(*) AS total_attempts,
                AVG(r.percentage) AS avg_percentage,
                MAX(r.obtained_marks) AS highest_marks,
                MIN(r.obtained_marks) AS lowest_marks,
                COALESCE(SUM(CASE WHEN r.is_passed THEN 1 ELSE 0 END), 0) AS passed_count
         FROM exam_results r
         WHERE r.exam_id = ?",
    )
    .bind(exam.id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(json!({
        "exam": { "id": exam.id, "title": exam.title, "total_marks": exam.total_marks },
        "statistics": stats
    })))
}

/// Lists the academic groups an exam can be scoped to.
pub async fn list_groups(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let groups = sqlx::query_as::<_, AcademicGroup>(
        "SELECT id, code, name, created_at FROM academic_groups ORDER BY code",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(groups))
}

/// Lists the subjects an exam can be filed under.
pub async fn list_subjects(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let subjects = sqlx::query_as::<_, Subject>(
        "SELECT id, code, name, created_at FROM subjects ORDER BY code",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(subjects))
}

/// Loads an exam and verifies the caller's teacher profile owns it.
async fn owned_exam(pool: &SqlitePool, claims: &Claims, exam_id: i64) -> Result<Exam, AppError> {
    let teacher: Teacher = super::require_teacher(pool, claims).await?;
    let exam = super::exam::exam_by_id(pool, exam_id).await?;
    if exam.teacher_id != teacher.id {
        return Err(AppError::Forbidden(
            "This exam belongs to another teacher".to_string(),
        ));
    }
    Ok(exam)
}

/// Mints a random join code not yet in use.
async fn unique_exam_code(pool: &SqlitePool) -> Result<String, AppError> {
    for _ in 0..5 {
        let code = generate_exam_code(&mut rand::thread_rng());
        if !exam_code_taken(pool, &code).await? {
            return Ok(code);
        }
    }
    Err(AppError::InternalServerError(
        "could not mint a unique exam code".to_string(),
    ))
}

async fn exam_code_taken(pool: &SqlitePool, code: &str) -> Result<bool, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM exams WHERE exam_code = ?")
        .bind(code)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

fn generate_exam_code(rng: &mut impl Rng) -> String {
    (0..EXAM_CODE_LEN)
        .map(|_| EXAM_CODE_CHARSET[rng.gen_range(0..EXAM_CODE_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn exam_codes_use_the_expected_charset() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let code = generate_exam_code(&mut rng);
            assert_eq!(code.len(), EXAM_CODE_LEN);
            assert!(code.bytes().all(|b| EXAM_CODE_CHARSET.contains(&b)));
        }
    }

    #[test]
    fn exam_codes_are_seed_deterministic() {
        let a = generate_exam_code(&mut StdRng::seed_from_u64(7));
        let b = generate_exam_code(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }
}
