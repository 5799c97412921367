// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    engine::attempts,
    error::AppError,
    models::attempt::{QuizAttempt, SubmitAttemptRequest},
    utils::jwt::Claims,
};

/// Submits a quiz attempt for grading.
///
/// Grading, the keep-best upsert and the progress write-back all happen in
/// one transaction inside the engine; this handler only shapes the response.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user_id = claims.user_id()?;

    let outcome = attempts::record_attempt(&pool, user_id, &payload).await?;

    tracing::info!(
        user_id,
        topic_id = payload.topic_id,
        score = outcome.score,
        passed = outcome.passed,
        "quiz attempt recorded"
    );

    Ok(Json(serde_json::json!({
        "message": if outcome.passed { "Quiz passed successfully!" } else { "Quiz completed." },
        "results": outcome,
    })))
}

/// Returns the caller's retained attempt for a topic, if any.
pub async fn get_my_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(topic_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempt: QuizAttempt = sqlx::query_as(
        "SELECT id, user_id, topic_id, score, passing_score, passed, time_spent, answers, attempt_time
         FROM quiz_attempts
         WHERE user_id = $1 AND topic_id = $2",
    )
    .bind(user_id)
    .bind(topic_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound(
        "No attempt recorded for this topic".to_string(),
    ))?;

    Ok(Json(attempt))
}
