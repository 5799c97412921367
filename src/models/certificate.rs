// src/models/certificate.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'certificates' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Certificate {
    pub id: i64,
    pub name: String,

    /// Free-form grouping, e.g. 'Wildlife', 'Botany', 'Safety'.
    pub category: String,

    pub description: String,

    /// Prerequisites shown to applicants, admin-supplied rich text.
    pub requirements: String,

    /// 'Available' or 'Unavailable'. Unavailable certificates are hidden
    /// from the application flow but keep their existing applications.
    pub status: String,

    /// Owning administrator. NULL when the account was removed.
    pub created_by: Option<i64>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a certificate.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCertificateRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 5000))]
    pub requirements: Option<String>,
    pub status: Option<String>,
}

/// DTO for updating a certificate. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateCertificateRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub status: Option<String>,
}

/// Per-topic slice of the progress view: whether the requesting guide
/// has a passing attempt for it.
#[derive(Debug, Serialize, FromRow)]
pub struct TopicProgress {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub has_quiz: bool,
    pub completed: bool,
}

/// Aggregated response for GET /api/certificates/{id}/progress.
#[derive(Debug, Serialize)]
pub struct CertificateProgressResponse {
    pub certificate: Certificate,
    pub topics: Vec<TopicProgress>,
    /// Completion percentage; 0 when no user context was supplied.
    pub progress: i32,
    /// Application status for the requesting guide, if an application exists.
    pub application_status: Option<String>,
    pub topics_completed: i64,
    pub total_topics: i64,
}
