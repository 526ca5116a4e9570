// src/store/memory.rs

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;

use super::QuizStore;
use crate::{
    error::AppError,
    models::{
        quiz::{Quiz, QuizDraft},
        response::{NewResponse, QuizResponse},
    },
};

/// Process-local store. Every operation runs under one lock, so the
/// duplicate check and the insert in `insert_response` are a single step.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_quiz_id: i64,
    next_response_id: i64,
    quizzes: BTreeMap<i64, Quiz>,
    responses: BTreeMap<i64, QuizResponse>,
    /// Unique index over (quiz_id, user_email).
    submitted: HashSet<(i64, String)>,
    registrations: HashSet<(i64, String)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attendee to an event's registration list.
    pub fn register_attendee(&self, event_id: i64, email: &str) -> Result<(), AppError> {
        self.lock()?
            .registrations
            .insert((event_id, email.to_lowercase()));
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::StorageFailure("memory store lock poisoned".to_string()))
    }
}

fn apply_draft(quiz: &mut Quiz, draft: QuizDraft) {
    quiz.title = draft.title;
    quiz.questions = Json(draft.questions);
    quiz.feedback_link = draft.feedback_link;
    quiz.linked_event_id = draft.linked_event_id;
    quiz.available_from = draft.available_from;
    quiz.available_until = draft.available_until;
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn create_quiz(&self, draft: QuizDraft) -> Result<Quiz, AppError> {
        let mut inner = self.lock()?;
        inner.next_quiz_id += 1;
        let id = inner.next_quiz_id;

        let quiz = Quiz {
            id,
            title: draft.title,
            questions: Json(draft.questions),
            feedback_link: draft.feedback_link,
            linked_event_id: draft.linked_event_id,
            available_from: draft.available_from,
            available_until: draft.available_until,
            is_active: true,
            created_at: Utc::now(),
        };
        inner.quizzes.insert(id, quiz.clone());
        Ok(quiz)
    }

    async fn update_quiz(&self, id: i64, draft: QuizDraft) -> Result<Option<Quiz>, AppError> {
        let mut inner = self.lock()?;
        Ok(inner.quizzes.get_mut(&id).map(|quiz| {
            apply_draft(quiz, draft);
            quiz.clone()
        }))
    }

    async fn set_active(&self, id: i64, is_active: bool) -> Result<Option<Quiz>, AppError> {
        let mut inner = self.lock()?;
        Ok(inner.quizzes.get_mut(&id).map(|quiz| {
            quiz.is_active = is_active;
            quiz.clone()
        }))
    }

    async fn delete_quiz(&self, id: i64) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        if inner.quizzes.remove(&id).is_none() {
            return Ok(false);
        }
        inner.responses.retain(|_, r| r.quiz_id != id);
        inner.submitted.retain(|(quiz_id, _)| *quiz_id != id);
        Ok(true)
    }

    async fn get_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        Ok(self.lock()?.quizzes.get(&id).cloned())
    }

    async fn list_quizzes(
        &self,
        event_id: Option<i64>,
        active_only: bool,
    ) -> Result<Vec<Quiz>, AppError> {
        let inner = self.lock()?;
        let mut quizzes: Vec<Quiz> = inner
            .quizzes
            .values()
            .filter(|q| !active_only || q.is_active)
            .filter(|q| event_id.is_none() || q.linked_event_id == event_id)
            .cloned()
            .collect();
        quizzes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(quizzes)
    }

    async fn count_responses(&self, quiz_id: i64) -> Result<i64, AppError> {
        let inner = self.lock()?;
        Ok(inner.responses.values().filter(|r| r.quiz_id == quiz_id).count() as i64)
    }

    async fn response_counts(&self) -> Result<HashMap<i64, i64>, AppError> {
        let inner = self.lock()?;
        let mut counts = HashMap::new();
        for response in inner.responses.values() {
            *counts.entry(response.quiz_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn has_response(&self, quiz_id: i64, email: &str) -> Result<bool, AppError> {
        Ok(self
            .lock()?
            .submitted
            .contains(&(quiz_id, email.to_lowercase())))
    }

    async fn insert_response(&self, response: NewResponse) -> Result<QuizResponse, AppError> {
        let mut inner = self.lock()?;

        if !inner.quizzes.contains_key(&response.quiz_id) {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }

        let key = (response.quiz_id, response.user_email.to_lowercase());
        if !inner.submitted.insert(key) {
            return Err(AppError::AlreadySubmitted);
        }

        inner.next_response_id += 1;
        let record = QuizResponse {
            id: inner.next_response_id,
            quiz_id: response.quiz_id,
            user_name: response.user_name,
            user_email: response.user_email.to_lowercase(),
            answers: Json(response.answers),
            score: response.score,
            total_questions: response.total_questions,
            total_time_taken_seconds: response.total_time_taken_seconds,
            submitted_at: Utc::now(),
        };
        inner.responses.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_responses(&self, quiz_id: Option<i64>) -> Result<Vec<QuizResponse>, AppError> {
        let inner = self.lock()?;
        let mut responses: Vec<QuizResponse> = inner
            .responses
            .values()
            .filter(|r| quiz_id.is_none_or(|id| r.quiz_id == id))
            .cloned()
            .collect();
        responses.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then(b.id.cmp(&a.id)));
        Ok(responses)
    }

    async fn delete_response(&self, id: i64) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        match inner.responses.remove(&id) {
            Some(removed) => {
                inner.submitted.remove(&(removed.quiz_id, removed.user_email));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn is_registered(&self, event_id: i64, email: &str) -> Result<bool, AppError> {
        Ok(self
            .lock()?
            .registrations
            .contains(&(event_id, email.to_lowercase())))
    }
}
