// src/store/mod.rs

//! Persistence collaborators consumed by the quiz core.
//!
//! `QuizStore` is the document-store seam: quizzes reachable by id, the
//! append-only response ledger, and the event registration lookup.
//! Uniqueness of `(quiz_id, user_email)` is the store's job, so
//! `insert_response` must be atomic with respect to that key.

pub mod memory;
pub mod postgres;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        quiz::{Quiz, QuizDraft},
        response::{NewResponse, QuizResponse},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type DynStore = Arc<dyn QuizStore>;

#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn create_quiz(&self, draft: QuizDraft) -> Result<Quiz, AppError>;

    /// Full replace of the quiz content. `None` when the id is unknown.
    async fn update_quiz(&self, id: i64, draft: QuizDraft) -> Result<Option<Quiz>, AppError>;

    async fn set_active(&self, id: i64, is_active: bool) -> Result<Option<Quiz>, AppError>;

    /// Deletes the quiz and every response recorded for it.
    /// Returns false when the id is unknown.
    async fn delete_quiz(&self, id: i64) -> Result<bool, AppError>;

    async fn get_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError>;

    /// Newest first. `active_only` hides switched-off quizzes.
    async fn list_quizzes(
        &self,
        event_id: Option<i64>,
        active_only: bool,
    ) -> Result<Vec<Quiz>, AppError>;

    async fn count_responses(&self, quiz_id: i64) -> Result<i64, AppError>;

    /// Response count per quiz id, in one pass. Quizzes without responses are absent.
    async fn response_counts(&self) -> Result<HashMap<i64, i64>, AppError>;

    async fn has_response(&self, quiz_id: i64, email: &str) -> Result<bool, AppError>;

    /// Appends a response. A second response for the same `(quiz_id, email)`
    /// fails with `AppError::AlreadySubmitted`, however close the race.
    async fn insert_response(&self, response: NewResponse) -> Result<QuizResponse, AppError>;

    /// Newest first, optionally restricted to one quiz.
    async fn list_responses(&self, quiz_id: Option<i64>) -> Result<Vec<QuizResponse>, AppError>;

    async fn delete_response(&self, id: i64) -> Result<bool, AppError>;

    /// Registration lookup keyed by lower-cased email.
    async fn is_registered(&self, event_id: i64, email: &str) -> Result<bool, AppError>;
}
