// src/handlers/application.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::PgPool;

use crate::{
    engine::lifecycle::{self, Actor, TransitionEvent},
    error::AppError,
    models::application::{
        Application, ApplicationStatus, ApplicationView, ApplyRequest, UpdateStatusRequest,
    },
    utils::jwt::Claims,
};

/// A guide applies for a certificate. At most one application per
/// (guide, certificate) pair; the initial status is always
/// 'Pending for Registration'.
pub async fn apply(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ApplyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let certificate_status: Option<String> =
        sqlx::query_scalar("SELECT status FROM certificates WHERE id = $1")
            .bind(payload.certificate_id)
            .fetch_optional(&pool)
            .await?;

    match certificate_status.as_deref() {
        None => return Err(AppError::NotFound("Certificate not found".to_string())),
        Some("Available") => {}
        Some(_) => {
            return Err(AppError::BadRequest(
                "Certificate is not open for applications".to_string(),
            ));
        }
    }

    let application: Application = sqlx::query_as(
        "INSERT INTO certificate_applications (user_id, certificate_id, status)
         VALUES ($1, $2, $3)
         RETURNING id, user_id, certificate_id, status, progress_percent, application_date,
                   approval_register_date, approval_certified_date, expiry_date",
    )
    .bind(user_id)
    .bind(payload.certificate_id)
    .bind(ApplicationStatus::PendingRegistration.as_str())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict("Application already exists for this certificate".to_string())
        } else {
            tracing::error!("Failed to create application: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((StatusCode::CREATED, Json(application)))
}

/// Query parameters for the caller's application list.
#[derive(Debug, Deserialize)]
pub struct MyApplicationsParams {
    /// Exact status filter; without it, all pending-type applications.
    pub status: Option<String>,
}

/// Lists the caller's applications. Defaults to the pending-type states a
/// guide is usually waiting on.
pub async fn my_applications(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<MyApplicationsParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    if let Some(status) = &params.status {
        status
            .parse::<ApplicationStatus>()
            .map_err(|_| AppError::BadRequest(format!("Invalid status value '{}'", status)))?;
    }

    let applications: Vec<ApplicationView> = sqlx::query_as(
        r#"
        SELECT
            a.id, a.user_id, u.username, a.certificate_id,
            c.name AS certificate_name, c.category,
            a.status, a.progress_percent, a.application_date,
            a.approval_register_date, a.approval_certified_date, a.expiry_date
        FROM certificate_applications a
        JOIN users u ON a.user_id = u.id
        JOIN certificates c ON a.certificate_id = c.id
        WHERE a.user_id = $1
          AND (
                ($2::TEXT IS NOT NULL AND a.status = $2)
             OR ($2::TEXT IS NULL AND a.status IN
                    ('Pending', 'Pending for Registration', 'Pending for Certified'))
          )
        ORDER BY a.application_date DESC
        "#,
    )
    .bind(user_id)
    .bind(params.status)
    .fetch_all(&pool)
    .await?;

    Ok(Json(applications))
}

/// Lists the caller's certified certificates, newest first.
pub async fn my_certified(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let applications: Vec<ApplicationView> = sqlx::query_as(
        r#"
        SELECT
            a.id, a.user_id, u.username, a.certificate_id,
            c.name AS certificate_name, c.category,
            a.status, a.progress_percent, a.application_date,
            a.approval_register_date, a.approval_certified_date, a.expiry_date
        FROM certificate_applications a
        JOIN users u ON a.user_id = u.id
        JOIN certificates c ON a.certificate_id = c.id
        WHERE a.user_id = $1 AND a.status = 'Certified'
        ORDER BY a.approval_certified_date DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(applications))
}

/// Query parameters for the admin listing.
#[derive(Debug, Deserialize)]
pub struct AdminListParams {
    /// 'pending', 'approved' or 'rejected'; anything else lists everything.
    pub category: Option<String>,
}

/// Lists all applications for review, bucketed by status category.
/// Admin only.
pub async fn admin_list(
    State(pool): State<PgPool>,
    Query(params): Query<AdminListParams>,
) -> Result<impl IntoResponse, AppError> {
    let category = params.category.as_deref().unwrap_or("all");

    let applications: Vec<ApplicationView> = sqlx::query_as(
        r#"
        SELECT
            a.id, a.user_id, u.username, a.certificate_id,
            c.name AS certificate_name, c.category,
            a.status, a.progress_percent, a.application_date,
            a.approval_register_date, a.approval_certified_date, a.expiry_date
        FROM certificate_applications a
        JOIN users u ON a.user_id = u.id
        JOIN certificates c ON a.certificate_id = c.id
        WHERE CASE $1
            WHEN 'pending' THEN a.status LIKE 'Pending%'
            WHEN 'approved' THEN a.status IN ('In Progress', 'Certified')
            WHEN 'rejected' THEN a.status = 'Rejected'
            ELSE TRUE
        END
        ORDER BY a.application_date DESC
        "#,
    )
    .bind(category)
    .fetch_all(&pool)
    .await?;

    Ok(Json(applications))
}

/// Admin drives an application to a new status. The requested target is
/// mapped onto a lifecycle transition; targets outside the table are
/// rejected rather than written through.
pub async fn update_status(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let target: ApplicationStatus = payload
        .status
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid status value '{}'", payload.status)))?;

    let event = match target {
        ApplicationStatus::InProgress => TransitionEvent::ApproveRegistration,
        ApplicationStatus::Certified => TransitionEvent::ApproveCertification,
        ApplicationStatus::Rejected => TransitionEvent::Reject,
        other => {
            return Err(AppError::Conflict(format!(
                "Status '{}' cannot be set directly",
                other
            )));
        }
    };

    let application = lifecycle::transition(&pool, id, event, Actor::Admin).await?;

    tracing::info!(
        application_id = application.id,
        status = %application.status,
        "application status updated"
    );

    Ok(Json(application))
}

/// DTO for the guide-side certification request.
#[derive(Debug, Deserialize)]
pub struct RequestCertifiedRequest {
    pub certificate_id: i64,
}

/// A guide with 100% progress asks to be certified. Moves the application
/// to 'Pending for Certified' for admin review; the progress guard lives in
/// the lifecycle engine.
pub async fn request_certified(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RequestCertifiedRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let application_id: i64 = sqlx::query_scalar(
        "SELECT id FROM certificate_applications
         WHERE user_id = $1 AND certificate_id = $2",
    )
    .bind(user_id)
    .bind(payload.certificate_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound(
        "No application found for this certificate".to_string(),
    ))?;

    let application = lifecycle::transition(
        &pool,
        application_id,
        TransitionEvent::RequestCertification,
        Actor::Guide,
    )
    .await?;

    Ok(Json(serde_json::json!({
        "message": "Certificate application submitted for review",
        "application": application,
    })))
}
