// src/models/topic.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'certificate_topics' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub certificate_id: i64,
    pub title: String,
    pub description: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Topic list entry with derived counts.
/// Counts are computed per request, never stored.
#[derive(Debug, Serialize, FromRow)]
pub struct TopicSummary {
    pub id: i64,
    pub certificate_id: i64,
    pub title: String,
    pub description: String,
    pub material_count: i64,
    pub question_count: i64,
}

/// DTO for creating a topic under a certificate.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTopicRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

/// Represents the 'materials' table. Metadata only; the file itself lives
/// in external storage and is referenced by URL.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Material {
    pub id: i64,
    pub topic_id: i64,
    pub name: String,
    pub kind: String,
    pub url: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for attaching material metadata to a topic.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMaterialRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// e.g. 'pdf', 'video', 'link'.
    #[validate(length(min = 1, max = 50))]
    pub kind: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    pub url: String,
}
