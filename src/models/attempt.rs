// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'quiz_attempts' table: the single retained result for a
/// (user, topic) pair. The recorder decides whether a new attempt replaces
/// the stored one; a pass is never overwritten by a fail.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: i64,
    pub topic_id: i64,
    pub score: i32,
    /// Snapshot of the quiz's passing score at submission time.
    pub passing_score: i32,
    pub passed: bool,
    /// Seconds the guide spent on the quiz.
    pub time_spent: i32,
    /// Raw submitted payload, opaque to storage.
    pub answers: serde_json::Value,
    pub attempt_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// One submitted answer: the selected option identifiers for a question.
/// Entries may be null (unanswered slots in the client UI) and are filtered
/// out before grading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub answer: Vec<Option<String>>,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    pub topic_id: i64,
    pub answers: Vec<SubmittedAnswer>,
    /// Seconds spent, reported by the client.
    #[validate(range(min = 0))]
    pub time_spent: i32,
}
