// src/delivery.rs

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::question::{OptionView, Question, QuestionOption, QuestionView};

/// Builds the question set delivered to one student for one exam start.
///
/// The set is loaded in authored order and then shuffled by a seeded,
/// side-effect-free pass, so ordering is decided entirely by the seed
/// the caller draws. A fresh seed per call means re-entering an open
/// attempt may show a different order; answers are keyed by question
/// and option ids, so nothing depends on position.
///
/// An exam with no questions yields an empty list and the caller
/// decides how to react.
pub async fn questions_for_student(
    pool: &SqlitePool,
    exam_id: i64,
    randomize_questions: bool,
    randomize_options: bool,
    seed: u64,
) -> Result<Vec<QuestionView>, AppError> {
    let mut questions = load_question_set(pool, exam_id).await?;
    shuffle_question_set(&mut questions, randomize_questions, randomize_options, seed);
    Ok(questions)
}

/// Loads questions ordered by position and options ordered by letter.
/// Correctness flags stay behind; the view never carries them.
async fn load_question_set(
    pool: &SqlitePool,
    exam_id: i64,
) -> Result<Vec<QuestionView>, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, exam_id, question_text, question_image, marks, difficulty, order_position, created_at
         FROM questions
         WHERE exam_id = ?
         ORDER BY order_position, id",
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await?;

    let options = sqlx::query_as::<_, QuestionOption>(
        "SELECT o.id, o.question_id, o.option_letter, o.option_text, o.is_correct
         FROM options o
         JOIN questions q ON q.id = o.question_id
         WHERE q.exam_id = ?
         ORDER BY o.question_id, o.option_letter",
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await?;

    let mut options_by_question: HashMap<i64, Vec<OptionView>> = HashMap::new();
    for option in options {
        options_by_question
            .entry(option.question_id)
            .or_default()
            .push(OptionView {
                id: option.id,
                option_letter: option.option_letter,
                option_text: option.option_text,
            });
    }

    Ok(questions
        .into_iter()
        .map(|question| QuestionView {
            id: question.id,
            question_text: question.question_text,
            question_image: question.question_image,
            marks: question.marks,
            difficulty: question.difficulty,
            options: options_by_question.remove(&question.id).unwrap_or_default(),
        })
        .collect())
}

/// Shuffles question order and per-question option order in place.
/// Pure: the same seed and flags always produce the same arrangement.
pub fn shuffle_question_set(
    questions: &mut [QuestionView],
    randomize_questions: bool,
    randomize_options: bool,
    seed: u64,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    if randomize_questions {
        questions.shuffle(&mut rng);
    }
    if randomize_options {
        for question in questions.iter_mut() {
            question.options.shuffle(&mut rng);
        }
    }
}
