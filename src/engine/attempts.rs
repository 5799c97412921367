// src/engine/attempts.rs

use std::collections::HashMap;

use serde::Serialize;
use sqlx::PgPool;

use crate::{
    engine::{
        grading::{self, AnswerKey, GradedQuestion},
        progress,
    },
    error::AppError,
    models::{
        attempt::{QuizAttempt, SubmitAttemptRequest},
        quiz::{QuestionKind, QuestionOption, Quiz, QuizQuestion},
    },
};

/// Everything the caller needs to render the result screen.
#[derive(Debug, Serialize)]
pub struct AttemptOutcome {
    pub passed: bool,
    pub score: i32,
    pub passing_score: i32,
    pub correct_count: usize,
    pub total_questions: usize,
    pub time_spent: i32,
    pub results: Vec<GradedQuestion>,
}

/// Retention rule for the single stored attempt per (user, topic):
/// a failing record is always replaced, a passing record only by another pass.
fn should_replace(existing_passed: bool, new_passed: bool) -> bool {
    !existing_passed || new_passed
}

/// Grades a submission and records it, all inside one transaction.
///
/// Steps: load the topic's quiz and its answer keys, grade every question,
/// upsert the retained attempt under the keep-best rule, and on a passing
/// attempt recompute and persist the guide's application progress for the
/// owning certificate. Any error before commit rolls the whole transaction
/// back when it is dropped.
pub async fn record_attempt(
    pool: &PgPool,
    user_id: i64,
    req: &SubmitAttemptRequest,
) -> Result<AttemptOutcome, AppError> {
    let mut tx = pool.begin().await?;

    let quiz: Quiz = sqlx::query_as(
        "SELECT id, topic_id, passing_score, time_limit_minutes, created_at
         FROM quizzes WHERE topic_id = $1",
    )
    .bind(req.topic_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound(
        "Quiz not found for this topic".to_string(),
    ))?;

    let questions: Vec<QuizQuestion> = sqlx::query_as(
        "SELECT id, quiz_id, text, kind, position
         FROM quiz_questions WHERE quiz_id = $1
         ORDER BY position, id",
    )
    .bind(quiz.id)
    .fetch_all(&mut *tx)
    .await?;

    let option_rows: Vec<QuestionOption> = sqlx::query_as(
        "SELECT o.id, o.question_id, o.option_id, o.text, o.is_correct
         FROM question_options o
         JOIN quiz_questions q ON o.question_id = q.id
         WHERE q.quiz_id = $1
         ORDER BY o.question_id, o.option_id",
    )
    .bind(quiz.id)
    .fetch_all(&mut *tx)
    .await?;

    let mut options_by_question: HashMap<i64, Vec<QuestionOption>> = HashMap::new();
    for opt in option_rows {
        options_by_question.entry(opt.question_id).or_default().push(opt);
    }

    // Selected identifiers per question, with null/blank slots filtered out
    // before grading.
    let mut submitted: HashMap<i64, Vec<String>> = HashMap::new();
    for answer in &req.answers {
        let ids: Vec<String> = answer
            .answer
            .iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .collect();
        submitted.insert(answer.question_id, ids);
    }

    let mut results = Vec::with_capacity(questions.len());
    let mut correct_count = 0usize;

    for question in &questions {
        let kind: QuestionKind = question.kind.parse().map_err(|_| {
            AppError::InternalServerError(format!(
                "Unknown question kind '{}' on question {}",
                question.kind, question.id
            ))
        })?;

        let options = options_by_question.remove(&question.id).unwrap_or_default();

        let mut key = AnswerKey::default();
        for opt in &options {
            if opt.is_correct {
                key.ids.push(opt.option_id.clone());
                key.texts.push(opt.text.clone());
            }
        }

        let submitted_ids = submitted.get(&question.id).cloned().unwrap_or_default();
        let submitted_texts: Vec<String> = submitted_ids
            .iter()
            .filter_map(|id| {
                options
                    .iter()
                    .find(|opt| &opt.option_id == id)
                    .map(|opt| opt.text.clone())
            })
            .collect();

        let graded = grading::grade_question(question.id, kind, &key, &submitted_ids, &submitted_texts);
        if graded.is_correct {
            correct_count += 1;
        }
        results.push(graded);
    }

    let total_questions = questions.len();
    let score = grading::score_percent(correct_count, total_questions);
    let passed = score >= quiz.passing_score;

    let answers_json = serde_json::to_value(&req.answers)?;

    let existing: Option<QuizAttempt> = sqlx::query_as(
        "SELECT id, user_id, topic_id, score, passing_score, passed, time_spent, answers, attempt_time
         FROM quiz_attempts WHERE user_id = $1 AND topic_id = $2",
    )
    .bind(user_id)
    .bind(req.topic_id)
    .fetch_optional(&mut *tx)
    .await?;

    match existing {
        None => {
            sqlx::query(
                "INSERT INTO quiz_attempts
                 (user_id, topic_id, score, passing_score, passed, time_spent, answers)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(user_id)
            .bind(req.topic_id)
            .bind(score)
            .bind(quiz.passing_score)
            .bind(passed)
            .bind(req.time_spent)
            .bind(answers_json.clone())
            .execute(&mut *tx)
            .await?;
        }
        Some(previous) if should_replace(previous.passed, passed) => {
            sqlx::query(
                "UPDATE quiz_attempts
                 SET score = $1, passing_score = $2, passed = $3, time_spent = $4,
                     answers = $5, attempt_time = now()
                 WHERE user_id = $6 AND topic_id = $7",
            )
            .bind(score)
            .bind(quiz.passing_score)
            .bind(passed)
            .bind(req.time_spent)
            .bind(answers_json.clone())
            .bind(user_id)
            .bind(req.topic_id)
            .execute(&mut *tx)
            .await?;
        }
        // A retained pass is never erased by a failing retake.
        Some(_) => {}
    }

    if passed {
        let certificate_id: Option<i64> =
            sqlx::query_scalar("SELECT certificate_id FROM certificate_topics WHERE id = $1")
                .bind(req.topic_id)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some(certificate_id) = certificate_id {
            let pct = progress::compute_progress(&mut tx, user_id, certificate_id).await?;

            // A guide may study topics before applying; a missing application
            // row is not an error.
            sqlx::query(
                "UPDATE certificate_applications
                 SET progress_percent = $1
                 WHERE user_id = $2 AND certificate_id = $3",
            )
            .bind(pct)
            .bind(user_id)
            .bind(certificate_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    Ok(AttemptOutcome {
        passed,
        score,
        passing_score: quiz.passing_score,
        correct_count,
        total_questions,
        time_spent: req.time_spent,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_is_never_replaced_by_fail() {
        assert!(!should_replace(true, false));
    }

    #[test]
    fn fail_is_replaced_by_fail() {
        // Latest failing attempt always supersedes a prior fail.
        assert!(should_replace(false, false));
    }

    #[test]
    fn fail_is_replaced_by_pass() {
        assert!(should_replace(false, true));
    }

    #[test]
    fn pass_is_replaced_by_pass() {
        assert!(should_replace(true, true));
    }
}
