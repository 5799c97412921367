// src/engine/lifecycle.rs

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::application::{Application, ApplicationStatus},
};

/// Days a certification stays valid after approval.
const CERTIFICATION_VALIDITY_DAYS: i64 = 365;

/// The events that drive an application through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEvent {
    /// Administrator approves the registration; study may begin.
    ApproveRegistration,
    /// Guide asks to be certified; requires 100% topic progress.
    RequestCertification,
    /// Administrator grants the certification.
    ApproveCertification,
    /// Administrator rejects a pending application.
    Reject,
}

/// Who is driving the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Admin,
    Guide,
}

/// The validated outcome of a transition: the next status plus the date
/// fields to stamp. Unset dates keep their stored values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub next: ApplicationStatus,
    pub approval_register_date: Option<DateTime<Utc>>,
    pub approval_certified_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
}

impl TransitionPlan {
    fn to(next: ApplicationStatus) -> Self {
        Self {
            next,
            approval_register_date: None,
            approval_certified_date: None,
            expiry_date: None,
        }
    }
}

/// Validates one transition and plans its side effects. Pure: the caller
/// supplies the clock, the executor applies the plan.
///
/// Invalid transitions are rejected, never silently ignored: repeating an
/// approval on an already-Certified application is a `Conflict`, and a
/// certification request below full progress is a `BadRequest` that leaves
/// the state untouched.
pub fn plan_transition(
    current: ApplicationStatus,
    progress_percent: i32,
    event: TransitionEvent,
    actor: Actor,
    now: DateTime<Utc>,
) -> Result<TransitionPlan, AppError> {
    match event {
        TransitionEvent::ApproveRegistration => {
            require_admin(actor)?;
            match current {
                ApplicationStatus::Pending | ApplicationStatus::PendingRegistration => {
                    let mut plan = TransitionPlan::to(ApplicationStatus::InProgress);
                    plan.approval_register_date = Some(now);
                    Ok(plan)
                }
                _ => Err(invalid_transition(current, "In Progress")),
            }
        }
        TransitionEvent::RequestCertification => {
            if actor != Actor::Guide {
                return Err(AppError::Forbidden(
                    "Only the applicant can request certification".to_string(),
                ));
            }
            if current != ApplicationStatus::InProgress {
                return Err(invalid_transition(current, "Pending for Certified"));
            }
            if progress_percent < 100 {
                return Err(AppError::BadRequest(
                    "Cannot apply for certification until all topics are completed".to_string(),
                ));
            }
            Ok(TransitionPlan::to(ApplicationStatus::PendingCertified))
        }
        TransitionEvent::ApproveCertification => {
            require_admin(actor)?;
            match current {
                ApplicationStatus::InProgress | ApplicationStatus::PendingCertified => {
                    let mut plan = TransitionPlan::to(ApplicationStatus::Certified);
                    plan.approval_certified_date = Some(now);
                    plan.expiry_date = Some(now + Duration::days(CERTIFICATION_VALIDITY_DAYS));
                    Ok(plan)
                }
                _ => Err(invalid_transition(current, "Certified")),
            }
        }
        TransitionEvent::Reject => {
            require_admin(actor)?;
            if current.is_pending() {
                Ok(TransitionPlan::to(ApplicationStatus::Rejected))
            } else {
                Err(invalid_transition(current, "Rejected"))
            }
        }
    }
}

fn require_admin(actor: Actor) -> Result<(), AppError> {
    if actor != Actor::Admin {
        return Err(AppError::Forbidden(
            "Administrator action required".to_string(),
        ));
    }
    Ok(())
}

fn invalid_transition(current: ApplicationStatus, target: &str) -> AppError {
    AppError::Conflict(format!(
        "Cannot move application from '{}' to '{}'",
        current, target
    ))
}

/// Applies one lifecycle event to an application.
///
/// The row is read with `SELECT ... FOR UPDATE` and rewritten in the same
/// transaction, so two concurrent transition requests cannot both succeed
/// from the same stale state.
pub async fn transition(
    pool: &PgPool,
    application_id: i64,
    event: TransitionEvent,
    actor: Actor,
) -> Result<Application, AppError> {
    let mut tx = pool.begin().await?;

    let application: Application = sqlx::query_as(
        "SELECT id, user_id, certificate_id, status, progress_percent, application_date,
                approval_register_date, approval_certified_date, expiry_date
         FROM certificate_applications
         WHERE id = $1
         FOR UPDATE",
    )
    .bind(application_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Application not found".to_string()))?;

    let current: ApplicationStatus = application.status.parse().map_err(|_| {
        AppError::InternalServerError(format!(
            "Application {} has unknown status '{}'",
            application.id, application.status
        ))
    })?;

    let plan = plan_transition(current, application.progress_percent, event, actor, Utc::now())?;

    let updated: Application = sqlx::query_as(
        "UPDATE certificate_applications
         SET status = $1,
             approval_register_date = COALESCE($2, approval_register_date),
             approval_certified_date = COALESCE($3, approval_certified_date),
             expiry_date = COALESCE($4, expiry_date)
         WHERE id = $5
         RETURNING id, user_id, certificate_id, status, progress_percent, application_date,
                   approval_register_date, approval_certified_date, expiry_date",
    )
    .bind(plan.next.as_str())
    .bind(plan.approval_register_date)
    .bind(plan.approval_certified_date)
    .bind(plan.expiry_date)
    .bind(application_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn registration_approval_stamps_date() {
        let plan = plan_transition(
            ApplicationStatus::PendingRegistration,
            0,
            TransitionEvent::ApproveRegistration,
            Actor::Admin,
            at(),
        )
        .unwrap();
        assert_eq!(plan.next, ApplicationStatus::InProgress);
        assert_eq!(plan.approval_register_date, Some(at()));
        assert_eq!(plan.expiry_date, None);
    }

    #[test]
    fn legacy_pending_can_be_approved() {
        let plan = plan_transition(
            ApplicationStatus::Pending,
            0,
            TransitionEvent::ApproveRegistration,
            Actor::Admin,
            at(),
        )
        .unwrap();
        assert_eq!(plan.next, ApplicationStatus::InProgress);
    }

    #[test]
    fn certification_request_requires_full_progress() {
        let err = plan_transition(
            ApplicationStatus::InProgress,
            80,
            TransitionEvent::RequestCertification,
            Actor::Guide,
            at(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn certification_request_at_full_progress() {
        let plan = plan_transition(
            ApplicationStatus::InProgress,
            100,
            TransitionEvent::RequestCertification,
            Actor::Guide,
            at(),
        )
        .unwrap();
        assert_eq!(plan.next, ApplicationStatus::PendingCertified);
        assert_eq!(plan.approval_certified_date, None);
    }

    #[test]
    fn certification_approval_sets_one_year_expiry() {
        let plan = plan_transition(
            ApplicationStatus::PendingCertified,
            100,
            TransitionEvent::ApproveCertification,
            Actor::Admin,
            at(),
        )
        .unwrap();
        assert_eq!(plan.next, ApplicationStatus::Certified);
        assert_eq!(plan.approval_certified_date, Some(at()));
        assert_eq!(plan.expiry_date, Some(at() + Duration::days(365)));
    }

    #[test]
    fn certifying_an_already_certified_application_conflicts() {
        let err = plan_transition(
            ApplicationStatus::Certified,
            100,
            TransitionEvent::ApproveCertification,
            Actor::Admin,
            at(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn reject_only_from_pending_states() {
        for current in [
            ApplicationStatus::Pending,
            ApplicationStatus::PendingRegistration,
            ApplicationStatus::PendingCertified,
        ] {
            let plan =
                plan_transition(current, 0, TransitionEvent::Reject, Actor::Admin, at()).unwrap();
            assert_eq!(plan.next, ApplicationStatus::Rejected);
        }

        for current in [
            ApplicationStatus::InProgress,
            ApplicationStatus::Certified,
            ApplicationStatus::Rejected,
        ] {
            let err = plan_transition(current, 0, TransitionEvent::Reject, Actor::Admin, at())
                .unwrap_err();
            assert!(matches!(err, AppError::Conflict(_)));
        }
    }

    #[test]
    fn admin_events_refuse_guide_actor() {
        for event in [
            TransitionEvent::ApproveRegistration,
            TransitionEvent::ApproveCertification,
            TransitionEvent::Reject,
        ] {
            let err = plan_transition(
                ApplicationStatus::PendingRegistration,
                0,
                event,
                Actor::Guide,
                at(),
            )
            .unwrap_err();
            assert!(matches!(err, AppError::Forbidden(_)));
        }
    }

    #[test]
    fn certification_request_refuses_admin_actor() {
        let err = plan_transition(
            ApplicationStatus::InProgress,
            100,
            TransitionEvent::RequestCertification,
            Actor::Admin,
            at(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
