// src/models/quiz.rs

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Closed set of question types. Stored as lowercase TEXT ('single',
/// 'multiple'); anything else in the column is data corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Single,
    Multiple,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Single => "single",
            QuestionKind::Multiple => "multiple",
        }
    }
}

impl FromStr for QuestionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(QuestionKind::Single),
            "multiple" => Ok(QuestionKind::Multiple),
            _ => Err(()),
        }
    }
}

/// Represents the 'quizzes' table. At most one quiz per topic.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub topic_id: i64,
    /// Minimum aggregate score (0-100) for a passing attempt.
    pub passing_score: i32,
    pub time_limit_minutes: i32,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'quiz_questions' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,
    pub quiz_id: i64,
    pub text: String,
    /// 'single' or 'multiple'; parsed into `QuestionKind` at the grading
    /// boundary.
    pub kind: String,
    pub position: i32,
}

/// Represents the 'question_options' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    /// Display letter ('A', 'B', ...), unique only within its question.
    pub option_id: String,
    pub text: String,
    pub is_correct: bool,
}

/// DTO for a single option when creating or replacing questions.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OptionInput {
    /// Must match `^[A-Z]$`; checked by the handler.
    pub option_id: String,
    #[validate(length(min = 1, max = 500))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for a question when creating or replacing questions.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionInput {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    pub kind: QuestionKind,
    #[validate(nested)]
    pub options: Vec<OptionInput>,
}

/// DTO for creating a quiz together with its question set.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(range(min = 0, max = 100))]
    pub passing_score: i32,
    #[validate(range(min = 1, max = 600))]
    pub time_limit_minutes: i32,
    #[validate(nested)]
    pub questions: Vec<QuestionInput>,
}

/// DTO for replacing a quiz's entire question set.
#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceQuestionsRequest {
    #[validate(nested)]
    pub questions: Vec<QuestionInput>,
}

/// DTO for patching quiz settings. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct QuizSettingsRequest {
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    #[validate(range(min = 1, max = 600))]
    pub time_limit_minutes: Option<i32>,
}

/// Option as shown to guides taking the quiz: the correctness flag is
/// withheld.
#[derive(Debug, Serialize)]
pub struct PublicOption {
    pub option_id: String,
    pub text: String,
}

/// Question with options, admin view (includes answer flags).
#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub id: i64,
    pub text: String,
    pub kind: String,
    pub position: i32,
    pub options: Vec<QuestionOption>,
}

/// Question with options, guide view.
#[derive(Debug, Serialize)]
pub struct PublicQuestionView {
    pub id: i64,
    pub text: String,
    pub kind: String,
    pub position: i32,
    pub options: Vec<PublicOption>,
}

/// Full quiz payload for administrators.
#[derive(Debug, Serialize)]
pub struct QuizView {
    pub id: i64,
    pub topic_id: i64,
    pub passing_score: i32,
    pub time_limit_minutes: i32,
    pub questions: Vec<QuestionView>,
}

/// Quiz payload for guides about to take it.
#[derive(Debug, Serialize)]
pub struct PublicQuizView {
    pub id: i64,
    pub topic_id: i64,
    pub passing_score: i32,
    pub time_limit_minutes: i32,
    pub questions: Vec<PublicQuestionView>,
}
