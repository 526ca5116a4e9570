// src/models/response.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::{Validate, ValidationError};

/// `selected_option` value for a question left unanswered (timed out).
pub const UNANSWERED: i32 = -1;

/// One recorded answer, aligned to question order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnswerRecord {
    pub question_index: u32,
    /// Option index in [0, 3], or -1 when unanswered.
    #[serde(default = "unanswered")]
    pub selected_option: i32,
    #[serde(default)]
    pub time_taken_seconds: u32,
}

fn unanswered() -> i32 {
    UNANSWERED
}

/// Represents the 'quiz_responses' table in the database.
/// Created once per (quiz, email), never updated or re-scored.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizResponse {
    pub id: i64,
    pub quiz_id: i64,
    pub user_name: String,
    pub user_email: String,
    pub answers: Json<Vec<AnswerRecord>>,
    pub score: i32,
    /// Quiz length at submission time.
    pub total_questions: i32,
    pub total_time_taken_seconds: i64,
    pub submitted_at: DateTime<Utc>,
}

/// Everything the ledger needs to append a response.
#[derive(Debug, Clone)]
pub struct NewResponse {
    pub quiz_id: i64,
    pub user_name: String,
    pub user_email: String,
    pub answers: Vec<AnswerRecord>,
    pub score: i32,
    pub total_questions: i32,
    pub total_time_taken_seconds: i64,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SubmitQuizRequest {
    #[validate(length(max = 1000), custom(function = validate_answers))]
    pub answers: Vec<AnswerRecord>,
}

fn validate_answers(answers: &[AnswerRecord]) -> Result<(), ValidationError> {
    for answer in answers {
        if !(UNANSWERED..=3).contains(&answer.selected_option) {
            return Err(ValidationError::new("selected_option_out_of_range"));
        }
    }
    Ok(())
}

/// The only success payload a taker ever sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
    pub success: bool,
    pub feedback_link: Option<String>,
}

/// Query string for the admin response listing.
#[derive(Debug, Default, Deserialize)]
pub struct ResponseListParams {
    pub quiz_id: Option<i64>,
}
