// src/handlers/certificate.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    engine::progress,
    error::AppError,
    models::certificate::{
        Certificate, CertificateProgressResponse, CreateCertificateRequest, TopicProgress,
        UpdateCertificateRequest,
    },
    utils::{html::clean_html, jwt::Claims},
};

const CERTIFICATE_STATUSES: [&str; 2] = ["Available", "Unavailable"];

fn check_status(status: &str) -> Result<(), AppError> {
    if CERTIFICATE_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Invalid certificate status '{}'",
            status
        )))
    }
}

/// Query parameters for listing certificates.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
    pub q: Option<String>,
}

/// Lists all certificates, optionally filtered by category and search keyword.
pub async fn list_certificates(
    State(pool): State<PgPool>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    // Prepare search pattern
    let search_pattern = params.q.map(|k| format!("%{}%", k));

    let certificates: Vec<Certificate> = sqlx::query_as(
        r#"
        SELECT id, name, category, description, requirements, status, created_by, created_at
        FROM certificates
        WHERE ($1::TEXT IS NULL OR category = $1)
          AND ($2::TEXT IS NULL OR name ILIKE $2)
        ORDER BY id
        "#,
    )
    .bind(params.category)
    .bind(search_pattern)
    .fetch_all(&pool)
    .await?;

    Ok(Json(certificates))
}

/// Lists certificates guides can currently apply for.
pub async fn available_certificates(
    State(pool): State<PgPool>,
) -> Result<impl IntoResponse, AppError> {
    let certificates: Vec<Certificate> = sqlx::query_as(
        r#"
        SELECT id, name, category, description, requirements, status, created_by, created_at
        FROM certificates
        WHERE status = 'Available'
        ORDER BY id
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(certificates))
}

/// Retrieves a single certificate by ID.
pub async fn get_certificate(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let certificate: Certificate = sqlx::query_as(
        r#"
        SELECT id, name, category, description, requirements, status, created_by, created_at
        FROM certificates
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Certificate not found".to_string()))?;

    Ok(Json(certificate))
}

/// Creates a new certificate.
/// Admin only.
pub async fn create_certificate(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCertificateRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let status = payload.status.unwrap_or_else(|| "Available".to_string());
    check_status(&status)?;

    let created_by = claims.user_id()?;
    let description = clean_html(payload.description.as_deref().unwrap_or(""));
    let requirements = clean_html(payload.requirements.as_deref().unwrap_or(""));

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO certificates (name, category, description, requirements, status, created_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.category)
    .bind(&description)
    .bind(&requirements)
    .bind(&status)
    .bind(created_by)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create certificate: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Updates a certificate by ID.
/// Admin only.
pub async fn update_certificate(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCertificateRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.name.is_none()
        && payload.category.is_none()
        && payload.description.is_none()
        && payload.requirements.is_none()
        && payload.status.is_none()
    {
        return Ok(StatusCode::OK);
    }

    if let Some(status) = &payload.status {
        check_status(status)?;
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE certificates SET ");
    let mut separated = builder.separated(", ");

    if let Some(name) = payload.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name);
    }

    if let Some(category) = payload.category {
        separated.push("category = ");
        separated.push_bind_unseparated(category);
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(clean_html(&description));
    }

    if let Some(requirements) = payload.requirements {
        separated.push("requirements = ");
        separated.push_bind_unseparated(clean_html(&requirements));
    }

    if let Some(status) = payload.status {
        separated.push("status = ");
        separated.push_bind_unseparated(status);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update certificate: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Certificate not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a certificate by ID. Topics, quizzes and applications under it
/// go with it (ON DELETE CASCADE).
/// Admin only.
pub async fn delete_certificate(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM certificates WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete certificate: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Certificate not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Query parameters for the progress view.
#[derive(Debug, Deserialize)]
pub struct ProgressParams {
    /// When present, the response includes this guide's per-topic pass
    /// flags, completion percentage and application status.
    pub user_id: Option<i64>,
}

/// Certificate detail with topic list and, when a user is given, that
/// guide's completion state.
pub async fn certificate_progress(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Query(params): Query<ProgressParams>,
) -> Result<impl IntoResponse, AppError> {
    let certificate: Certificate = sqlx::query_as(
        r#"
        SELECT id, name, category, description, requirements, status, created_by, created_at
        FROM certificates
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Certificate not found".to_string()))?;

    let topics: Vec<TopicProgress> = sqlx::query_as(
        r#"
        SELECT
            t.id,
            t.title,
            t.description,
            EXISTS (SELECT 1 FROM quizzes z WHERE z.topic_id = t.id) AS has_quiz,
            EXISTS (
                SELECT 1 FROM quiz_attempts qa
                WHERE qa.topic_id = t.id AND qa.user_id = $2 AND qa.passed
            ) AS completed
        FROM certificate_topics t
        WHERE t.certificate_id = $1
        ORDER BY t.id
        "#,
    )
    .bind(id)
    .bind(params.user_id.unwrap_or(0))
    .fetch_all(&pool)
    .await?;

    let total_topics = topics.len() as i64;
    let topics_completed = topics.iter().filter(|t| t.completed).count() as i64;

    let (progress, application_status) = match params.user_id {
        Some(user_id) => {
            let mut conn = pool.acquire().await?;
            let pct = progress::compute_progress(&mut conn, user_id, id).await?;

            let status: Option<String> = sqlx::query_scalar(
                "SELECT status FROM certificate_applications
                 WHERE user_id = $1 AND certificate_id = $2",
            )
            .bind(user_id)
            .bind(id)
            .fetch_optional(&pool)
            .await?;

            (pct, status)
        }
        None => (0, None),
    };

    Ok(Json(CertificateProgressResponse {
        certificate,
        topics,
        progress,
        application_status,
        topics_completed,
        total_topics,
    }))
}
