// src/eligibility.rs

//! Decides whether a caller may view or submit a quiz.
//!
//! Viewing and submitting deliberately differ: anonymous callers may view
//! a quiz without a linked event, while submission always needs an identity.

use chrono::{DateTime, Utc};

use crate::{error::AppError, models::quiz::Quiz, store::QuizStore};

/// Resolved identity of an authenticated caller. `email` is lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub email: String,
    pub name: String,
    pub is_admin: bool,
}

/// Outcome of a successful view check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Access {
    /// Advisory only; the submit path enforces it for real.
    pub already_submitted: bool,
}

/// Checks the time window: open when `from <= now <= until`.
pub fn check_window(quiz: &Quiz, now: DateTime<Utc>) -> Result<(), AppError> {
    if let Some(available_from) = quiz.available_from {
        if now < available_from {
            return Err(AppError::NotStarted { available_from });
        }
    }
    if let Some(until) = quiz.available_until {
        if now > until {
            return Err(AppError::Ended);
        }
    }
    Ok(())
}

/// Checks the linked-event gate. Quizzes without an event are ungated.
pub async fn check_registration(
    store: &dyn QuizStore,
    quiz: &Quiz,
    caller: Option<&Caller>,
) -> Result<(), AppError> {
    let Some(event_id) = quiz.linked_event_id else {
        return Ok(());
    };

    let caller = caller.ok_or_else(|| {
        AppError::AuthRequired("Please sign in to access this quiz".to_string())
    })?;

    if !store.is_registered(event_id, &caller.email).await? {
        tracing::debug!("{} is not registered for event {}", caller.email, event_id);
        return Err(AppError::NotRegistered);
    }
    Ok(())
}

/// Gate for `GetQuiz`.
///
/// Administrators bypass the active flag, the window and the registration
/// gate. Everyone else is checked in that order.
pub async fn check_view(
    store: &dyn QuizStore,
    quiz: &Quiz,
    caller: Option<&Caller>,
    now: DateTime<Utc>,
) -> Result<Access, AppError> {
    let is_admin = caller.is_some_and(|c| c.is_admin);

    if !is_admin {
        if !quiz.is_active {
            return Err(AppError::Inactive);
        }
        check_window(quiz, now)?;
        check_registration(store, quiz, caller).await?;
    }

    let already_submitted = match caller {
        Some(c) => store.has_response(quiz.id, &c.email).await?,
        None => false,
    };

    Ok(Access { already_submitted })
}
