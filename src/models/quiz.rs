// src/models/quiz.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use url::Url;
use validator::{Validate, ValidationError};

pub const OPTIONS_PER_QUESTION: usize = 4;
pub const MIN_TIME_LIMIT_SECONDS: i32 = 5;
pub const MAX_TIME_LIMIT_SECONDS: i32 = 300;
pub const DEFAULT_TIME_LIMIT_SECONDS: i32 = 30;

/// One multiple-choice question, as stored.
/// Holds the answer key; never serialized to a non-admin caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,

    /// Exactly four options.
    pub options: Vec<String>,

    /// Index into `options`, always in [0, 3].
    pub correct_answer: i32,

    pub time_limit_seconds: i32,

    /// Reference into the blob store for an optional illustration.
    pub image_ref: Option<String>,
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,

    pub title: String,

    /// Ordered questions, stored as a JSON array.
    pub questions: Json<Vec<Question>>,

    /// Shown to the taker after a successful submission.
    pub feedback_link: Option<String>,

    /// When set, only registered attendees of this event may take the quiz.
    pub linked_event_id: Option<i64>,

    /// Unset bound means the window is open on that side.
    pub available_from: Option<DateTime<Utc>>,
    pub available_until: Option<DateTime<Utc>>,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

/// DTO for sending a question to takers (excludes the answer key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub text: String,
    pub options: Vec<String>,
    pub time_limit_seconds: i32,
    pub image_ref: Option<String>,
}

/// DTO for sending a quiz to takers.
/// Has no field that could carry `correct_answer` or admin statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuiz {
    pub id: i64,
    pub title: String,
    pub questions: Vec<PublicQuestion>,
    pub feedback_link: Option<String>,
    pub linked_event_id: Option<i64>,
    pub available_from: Option<DateTime<Utc>>,
    pub available_until: Option<DateTime<Utc>>,
}

impl From<&Quiz> for PublicQuiz {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title.clone(),
            questions: quiz
                .questions
                .iter()
                .map(|q| PublicQuestion {
                    text: q.text.clone(),
                    options: q.options.clone(),
                    time_limit_seconds: q.time_limit_seconds,
                    image_ref: q.image_ref.clone(),
                })
                .collect(),
            feedback_link: quiz.feedback_link.clone(),
            linked_event_id: quiz.linked_event_id,
            available_from: quiz.available_from,
            available_until: quiz.available_until,
        }
    }
}

/// Payload of `GET /api/quizzes/{id}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuizView {
    pub quiz: PublicQuiz,
    pub already_submitted: bool,
}

/// Admin listing row: the full quiz plus its response count.
#[derive(Debug, Serialize)]
pub struct AdminQuiz {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub response_count: i64,
}

/// Query string for quiz listings.
#[derive(Debug, Default, Deserialize)]
pub struct QuizListParams {
    pub event_id: Option<i64>,
}

/// Validated, normalised quiz content ready for persistence.
/// Produced only by `QuizPayload::into_draft`.
#[derive(Debug, Clone)]
pub struct QuizDraft {
    pub title: String,
    pub questions: Vec<Question>,
    pub feedback_link: Option<String>,
    pub linked_event_id: Option<i64>,
    pub available_from: Option<DateTime<Utc>>,
    pub available_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestionPayload {
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: i32,
    #[serde(default = "default_time_limit")]
    pub time_limit_seconds: i32,
    #[serde(default)]
    pub image_ref: Option<String>,
}

fn default_time_limit() -> i32 {
    DEFAULT_TIME_LIMIT_SECONDS
}

/// DTO for creating or fully replacing a quiz.
/// Create and update share this type so both run identical validation.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct QuizPayload {
    #[validate(length(min = 1, max = 200), custom(function = validate_not_blank))]
    pub title: String,
    #[validate(length(min = 1, max = 100), custom(function = validate_questions))]
    pub questions: Vec<QuestionPayload>,
    #[serde(default)]
    pub feedback_link: Option<String>,
    #[serde(default)]
    pub linked_event_id: Option<i64>,
    /// RFC 3339 timestamp; empty string means unset.
    #[serde(default)]
    pub available_from: Option<String>,
    #[serde(default)]
    pub available_until: Option<String>,
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn validate_questions(questions: &[QuestionPayload]) -> Result<(), ValidationError> {
    for q in questions {
        validate_question(q)?;
    }
    Ok(())
}

fn validate_question(q: &QuestionPayload) -> Result<(), ValidationError> {
    if q.text.trim().is_empty() || q.text.len() > 1000 {
        return Err(ValidationError::new("question_text_invalid"));
    }
    if q.options.len() != OPTIONS_PER_QUESTION {
        return Err(ValidationError::new("exactly_four_options_required"));
    }
    for opt in &q.options {
        if opt.trim().is_empty() {
            return Err(ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(ValidationError::new("option_too_long"));
        }
    }
    if !(0..OPTIONS_PER_QUESTION as i32).contains(&q.correct_answer) {
        return Err(ValidationError::new("correct_answer_out_of_range"));
    }
    if !(MIN_TIME_LIMIT_SECONDS..=MAX_TIME_LIMIT_SECONDS).contains(&q.time_limit_seconds) {
        return Err(ValidationError::new("time_limit_out_of_range"));
    }
    if q.image_ref.as_ref().is_some_and(|r| r.len() > 500) {
        return Err(ValidationError::new("image_ref_too_long"));
    }
    Ok(())
}

/// Parses an optional RFC 3339 timestamp. Empty or whitespace means unset.
fn parse_timestamp(field: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| format!("{}: malformed timestamp '{}' ({})", field, s, e)),
    }
}

impl QuizPayload {
    /// Validates every field and normalises the content.
    /// Any failure is reported as `InvalidInput` before storage is touched.
    pub fn into_draft(self) -> Result<QuizDraft, crate::error::AppError> {
        use crate::error::AppError;

        self.validate()?;

        let available_from = parse_timestamp("available_from", self.available_from.as_deref())
            .map_err(AppError::InvalidInput)?;
        let available_until = parse_timestamp("available_until", self.available_until.as_deref())
            .map_err(AppError::InvalidInput)?;

        if let (Some(from), Some(until)) = (available_from, available_until) {
            if until < from {
                return Err(AppError::InvalidInput(
                    "available_until must not be earlier than available_from".to_string(),
                ));
            }
        }

        let feedback_link = match self.feedback_link.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(link) => {
                if link.len() > 500 || Url::parse(link).is_err() {
                    return Err(AppError::InvalidInput(
                        "feedback_link must be a valid URL".to_string(),
                    ));
                }
                Some(link.to_string())
            }
        };

        let questions = self
            .questions
            .into_iter()
            .map(|q| Question {
                text: q.text.trim().to_string(),
                options: q.options.into_iter().map(|o| o.trim().to_string()).collect(),
                correct_answer: q.correct_answer,
                time_limit_seconds: q.time_limit_seconds,
                image_ref: q.image_ref.filter(|r| !r.trim().is_empty()),
            })
            .collect();

        Ok(QuizDraft {
            title: self.title.trim().to_string(),
            questions,
            feedback_link,
            linked_event_id: self.linked_event_id,
            available_from,
            available_until,
        })
    }
}

/// DTO for toggling the active flag.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleActiveRequest {
    pub is_active: bool,
}
