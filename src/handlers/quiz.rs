// src/handlers/quiz.rs

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use regex::Regex;
use sqlx::{PgPool, Postgres, Transaction};
use validator::Validate;

use crate::{
    error::AppError,
    models::quiz::{
        CreateQuizRequest, PublicOption, PublicQuestionView, PublicQuizView, QuestionInput,
        QuestionKind, QuestionOption, QuestionView, Quiz, QuizQuestion, QuizSettingsRequest,
        QuizView, ReplaceQuestionsRequest,
    },
};

/// Option identifiers are single display letters.
static OPTION_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]$").unwrap());

/// Structural checks the derive-based validator cannot express: identifier
/// format and uniqueness, and the correct-option cardinality per kind.
fn check_questions(questions: &[QuestionInput]) -> Result<(), AppError> {
    for (index, question) in questions.iter().enumerate() {
        if question.options.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Question {} has no options",
                index + 1
            )));
        }

        let mut seen = HashSet::new();
        for option in &question.options {
            if !OPTION_ID_RE.is_match(&option.option_id) {
                return Err(AppError::BadRequest(format!(
                    "Question {}: option identifier '{}' must be a single letter A-Z",
                    index + 1,
                    option.option_id
                )));
            }
            if !seen.insert(option.option_id.as_str()) {
                return Err(AppError::BadRequest(format!(
                    "Question {}: duplicate option identifier '{}'",
                    index + 1,
                    option.option_id
                )));
            }
        }

        let correct = question.options.iter().filter(|o| o.is_correct).count();
        match question.kind {
            QuestionKind::Single if correct != 1 => {
                return Err(AppError::BadRequest(format!(
                    "Question {}: single-choice questions need exactly one correct option",
                    index + 1
                )));
            }
            QuestionKind::Multiple if correct == 0 => {
                return Err(AppError::BadRequest(format!(
                    "Question {}: at least one option must be correct",
                    index + 1
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

async fn insert_question(
    tx: &mut Transaction<'_, Postgres>,
    quiz_id: i64,
    position: i32,
    question: &QuestionInput,
) -> Result<i64, AppError> {
    let question_id: i64 = sqlx::query_scalar(
        "INSERT INTO quiz_questions (quiz_id, text, kind, position)
         VALUES ($1, $2, $3, $4)
         RETURNING id",
    )
    .bind(quiz_id)
    .bind(&question.text)
    .bind(question.kind.as_str())
    .bind(position)
    .fetch_one(&mut **tx)
    .await?;

    for option in &question.options {
        sqlx::query(
            "INSERT INTO question_options (question_id, option_id, text, is_correct)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(question_id)
        .bind(&option.option_id)
        .bind(&option.text)
        .bind(option.is_correct)
        .execute(&mut **tx)
        .await?;
    }

    Ok(question_id)
}

async fn quiz_for_topic(pool: &PgPool, topic_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as(
        "SELECT id, topic_id, passing_score, time_limit_minutes, created_at
         FROM quizzes WHERE topic_id = $1",
    )
    .bind(topic_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound(
        "Quiz not found for this topic".to_string(),
    ))
}

async fn load_questions(
    pool: &PgPool,
    quiz_id: i64,
) -> Result<(Vec<QuizQuestion>, HashMap<i64, Vec<QuestionOption>>), AppError> {
    let questions: Vec<QuizQuestion> = sqlx::query_as(
        "SELECT id, quiz_id, text, kind, position
         FROM quiz_questions WHERE quiz_id = $1
         ORDER BY position, id",
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    let options: Vec<QuestionOption> = sqlx::query_as(
        "SELECT o.id, o.question_id, o.option_id, o.text, o.is_correct
         FROM question_options o
         JOIN quiz_questions q ON o.question_id = q.id
         WHERE q.quiz_id = $1
         ORDER BY o.question_id, o.option_id",
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    let mut by_question: HashMap<i64, Vec<QuestionOption>> = HashMap::new();
    for option in options {
        by_question.entry(option.question_id).or_default().push(option);
    }

    Ok((questions, by_question))
}

/// Quiz as presented to a guide about to take it: answer flags withheld.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Path(topic_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = quiz_for_topic(&pool, topic_id).await?;
    let (questions, mut by_question) = load_questions(&pool, quiz.id).await?;

    let questions = questions
        .into_iter()
        .map(|q| {
            let options = by_question
                .remove(&q.id)
                .unwrap_or_default()
                .into_iter()
                .map(|o| PublicOption {
                    option_id: o.option_id,
                    text: o.text,
                })
                .collect();
            PublicQuestionView {
                id: q.id,
                text: q.text,
                kind: q.kind,
                position: q.position,
                options,
            }
        })
        .collect();

    Ok(Json(PublicQuizView {
        id: quiz.id,
        topic_id: quiz.topic_id,
        passing_score: quiz.passing_score,
        time_limit_minutes: quiz.time_limit_minutes,
        questions,
    }))
}

/// Quiz with answer flags, for the question editor.
/// Admin only.
pub async fn get_quiz_full(
    State(pool): State<PgPool>,
    Path(topic_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = quiz_for_topic(&pool, topic_id).await?;
    let (questions, mut by_question) = load_questions(&pool, quiz.id).await?;

    let questions = questions
        .into_iter()
        .map(|q| QuestionView {
            id: q.id,
            text: q.text,
            kind: q.kind,
            position: q.position,
            options: by_question.remove(&q.id).unwrap_or_default(),
        })
        .collect();

    Ok(Json(QuizView {
        id: quiz.id,
        topic_id: quiz.topic_id,
        passing_score: quiz.passing_score,
        time_limit_minutes: quiz.time_limit_minutes,
        questions,
    }))
}

/// Creates the quiz for a topic together with its question set.
/// Admin only.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    Path(topic_id): Path<i64>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    check_questions(&payload.questions)?;

    let topic: Option<i64> = sqlx::query_scalar("SELECT id FROM certificate_topics WHERE id = $1")
        .bind(topic_id)
        .fetch_optional(&pool)
        .await?;

    if topic.is_none() {
        return Err(AppError::NotFound("Topic not found".to_string()));
    }

    let mut tx = pool.begin().await?;

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM quizzes WHERE topic_id = $1")
        .bind(topic_id)
        .fetch_optional(&mut *tx)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict(
            "Topic already has a quiz".to_string(),
        ));
    }

    let quiz_id: i64 = sqlx::query_scalar(
        "INSERT INTO quizzes (topic_id, passing_score, time_limit_minutes)
         VALUES ($1, $2, $3)
         RETURNING id",
    )
    .bind(topic_id)
    .bind(payload.passing_score)
    .bind(payload.time_limit_minutes)
    .fetch_one(&mut *tx)
    .await?;

    for (position, question) in payload.questions.iter().enumerate() {
        insert_question(&mut tx, quiz_id, position as i32, question).await?;
    }

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": quiz_id}))))
}

/// Replaces a quiz's entire question set in one transaction.
/// Admin only.
pub async fn replace_questions(
    State(pool): State<PgPool>,
    Path(topic_id): Path<i64>,
    Json(payload): Json<ReplaceQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    check_questions(&payload.questions)?;

    let quiz = quiz_for_topic(&pool, topic_id).await?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM quiz_questions WHERE quiz_id = $1")
        .bind(quiz.id)
        .execute(&mut *tx)
        .await?;

    for (position, question) in payload.questions.iter().enumerate() {
        insert_question(&mut tx, quiz.id, position as i32, question).await?;
    }

    tx.commit().await?;

    Ok(StatusCode::OK)
}

/// Patches the quiz's passing score and time limit.
/// Admin only.
pub async fn update_settings(
    State(pool): State<PgPool>,
    Path(topic_id): Path<i64>,
    Json(payload): Json<QuizSettingsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if payload.passing_score.is_none() && payload.time_limit_minutes.is_none() {
        return Ok(StatusCode::OK);
    }

    let result = sqlx::query(
        "UPDATE quizzes
         SET passing_score = COALESCE($1, passing_score),
             time_limit_minutes = COALESCE($2, time_limit_minutes)
         WHERE topic_id = $3",
    )
    .bind(payload.passing_score)
    .bind(payload.time_limit_minutes)
    .bind(topic_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "Quiz not found for this topic".to_string(),
        ));
    }

    Ok(StatusCode::OK)
}

/// Appends a question to the topic's quiz.
/// Admin only.
pub async fn add_question(
    State(pool): State<PgPool>,
    Path(topic_id): Path<i64>,
    Json(payload): Json<QuestionInput>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    check_questions(std::slice::from_ref(&payload))?;

    let quiz = quiz_for_topic(&pool, topic_id).await?;

    let mut tx = pool.begin().await?;

    let next_position: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM quiz_questions WHERE quiz_id = $1",
    )
    .bind(quiz.id)
    .fetch_one(&mut *tx)
    .await?;

    let question_id = insert_question(&mut tx, quiz.id, next_position, &payload).await?;

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": question_id})),
    ))
}

/// Rewrites one question (text, kind and options).
/// Admin only.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path((topic_id, question_id)): Path<(i64, i64)>,
    Json(payload): Json<QuestionInput>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    check_questions(std::slice::from_ref(&payload))?;

    let quiz = quiz_for_topic(&pool, topic_id).await?;

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE quiz_questions SET text = $1, kind = $2 WHERE id = $3 AND quiz_id = $4",
    )
    .bind(&payload.text)
    .bind(payload.kind.as_str())
    .bind(question_id)
    .bind(quiz.id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    sqlx::query("DELETE FROM question_options WHERE question_id = $1")
        .bind(question_id)
        .execute(&mut *tx)
        .await?;

    for option in &payload.options {
        sqlx::query(
            "INSERT INTO question_options (question_id, option_id, text, is_correct)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(question_id)
        .bind(&option.option_id)
        .bind(&option.text)
        .bind(option.is_correct)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(StatusCode::OK)
}

/// Deletes one question from the topic's quiz.
/// Admin only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path((topic_id, question_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = quiz_for_topic(&pool, topic_id).await?;

    let result = sqlx::query("DELETE FROM quiz_questions WHERE id = $1 AND quiz_id = $2")
        .bind(question_id)
        .bind(quiz.id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
