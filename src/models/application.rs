// src/models/application.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Closed set of application lifecycle states. Stored as the original
/// display strings in the 'status' TEXT column.
///
/// `Pending` is a legacy catch-all: accepted as a source state for
/// approval/rejection but never written by any flow here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Pending,
    PendingRegistration,
    InProgress,
    PendingCertified,
    Rejected,
    Certified,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "Pending",
            ApplicationStatus::PendingRegistration => "Pending for Registration",
            ApplicationStatus::InProgress => "In Progress",
            ApplicationStatus::PendingCertified => "Pending for Certified",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Certified => "Certified",
        }
    }

    /// True for the states an administrator may still reject.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Pending
                | ApplicationStatus::PendingRegistration
                | ApplicationStatus::PendingCertified
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ApplicationStatus::Pending),
            "Pending for Registration" => Ok(ApplicationStatus::PendingRegistration),
            "In Progress" => Ok(ApplicationStatus::InProgress),
            "Pending for Certified" => Ok(ApplicationStatus::PendingCertified),
            "Rejected" => Ok(ApplicationStatus::Rejected),
            "Certified" => Ok(ApplicationStatus::Certified),
            _ => Err(()),
        }
    }
}

/// Represents the 'certificate_applications' table: one application per
/// (user, certificate) pair, mutated only by the lifecycle engine.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub user_id: i64,
    pub certificate_id: i64,
    pub status: String,
    pub progress_percent: i32,
    pub application_date: Option<chrono::DateTime<chrono::Utc>>,
    pub approval_register_date: Option<chrono::DateTime<chrono::Utc>>,
    pub approval_certified_date: Option<chrono::DateTime<chrono::Utc>>,
    pub expiry_date: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for a guide applying for a certificate.
#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub certificate_id: i64,
}

/// Application joined with its certificate, for listing endpoints.
#[derive(Debug, Serialize, FromRow)]
pub struct ApplicationView {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub certificate_id: i64,
    pub certificate_name: String,
    pub category: String,
    pub status: String,
    pub progress_percent: i32,
    pub application_date: Option<chrono::DateTime<chrono::Utc>>,
    pub approval_register_date: Option<chrono::DateTime<chrono::Utc>>,
    pub approval_certified_date: Option<chrono::DateTime<chrono::Utc>>,
    pub expiry_date: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for the admin status update endpoint: the desired target status,
/// mapped onto a lifecycle transition by the handler.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_display_strings() {
        for status in [
            ApplicationStatus::Pending,
            ApplicationStatus::PendingRegistration,
            ApplicationStatus::InProgress,
            ApplicationStatus::PendingCertified,
            ApplicationStatus::Rejected,
            ApplicationStatus::Certified,
        ] {
            assert_eq!(status.as_str().parse::<ApplicationStatus>(), Ok(status));
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("Not Started".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn pending_states() {
        assert!(ApplicationStatus::Pending.is_pending());
        assert!(ApplicationStatus::PendingRegistration.is_pending());
        assert!(ApplicationStatus::PendingCertified.is_pending());
        assert!(!ApplicationStatus::InProgress.is_pending());
        assert!(!ApplicationStatus::Certified.is_pending());
        assert!(!ApplicationStatus::Rejected.is_pending());
    }
}
