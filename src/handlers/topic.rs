// src/handlers/topic.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use url::Url;
use validator::Validate;

use crate::{
    error::AppError,
    models::topic::{CreateMaterialRequest, CreateTopicRequest, Material, Topic, TopicSummary},
    utils::html::clean_html,
};

/// Creates a topic under a certificate.
/// Admin only.
pub async fn create_topic(
    State(pool): State<PgPool>,
    Path(certificate_id): Path<i64>,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM certificates WHERE id = $1")
        .bind(certificate_id)
        .fetch_optional(&pool)
        .await?;

    if exists.is_none() {
        return Err(AppError::NotFound("Certificate not found".to_string()));
    }

    let description = clean_html(payload.description.as_deref().unwrap_or(""));

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO certificate_topics (certificate_id, title, description)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(certificate_id)
    .bind(&payload.title)
    .bind(&description)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create topic: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Lists a certificate's topics with derived material/question counts.
pub async fn list_topics(
    State(pool): State<PgPool>,
    Path(certificate_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let topics: Vec<TopicSummary> = sqlx::query_as(
        r#"
        SELECT
            t.id,
            t.certificate_id,
            t.title,
            t.description,
            (SELECT COUNT(*) FROM materials m WHERE m.topic_id = t.id) AS material_count,
            (SELECT COUNT(*)
               FROM quiz_questions q
               JOIN quizzes z ON q.quiz_id = z.id
              WHERE z.topic_id = t.id) AS question_count
        FROM certificate_topics t
        WHERE t.certificate_id = $1
        ORDER BY t.id
        "#,
    )
    .bind(certificate_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(topics))
}

/// Topic detail with its material metadata.
pub async fn get_topic(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let topic: Topic = sqlx::query_as(
        "SELECT id, certificate_id, title, description, created_at
         FROM certificate_topics WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Topic not found".to_string()))?;

    let materials: Vec<Material> = sqlx::query_as(
        "SELECT id, topic_id, name, kind, url, created_at
         FROM materials WHERE topic_id = $1
         ORDER BY id",
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(serde_json::json!({
        "topic": topic,
        "materials": materials,
    })))
}

/// Attaches material metadata to a topic. The binary itself lives in
/// external storage; only a validated link is kept here.
/// Admin only.
pub async fn add_material(
    State(pool): State<PgPool>,
    Path(topic_id): Path<i64>,
    Json(payload): Json<CreateMaterialRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    Url::parse(&payload.url)
        .map_err(|_| AppError::BadRequest("Material URL is not a valid URL".to_string()))?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM certificate_topics WHERE id = $1")
        .bind(topic_id)
        .fetch_optional(&pool)
        .await?;

    if exists.is_none() {
        return Err(AppError::NotFound("Topic not found".to_string()));
    }

    let kind = payload.kind.unwrap_or_else(|| "link".to_string());

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO materials (topic_id, name, kind, url)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(topic_id)
    .bind(&payload.name)
    .bind(&kind)
    .bind(&payload.url)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to add material: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Deletes material metadata by ID.
/// Admin only.
pub async fn delete_material(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM materials WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete material: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Material not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
