// src/submission.rs

use chrono::{DateTime, Utc};
use validator::Validate;

use crate::{
    eligibility::{Caller, check_registration, check_window},
    error::AppError,
    models::response::{NewResponse, SubmitAck, SubmitQuizRequest},
    scoring::grade,
    store::QuizStore,
};

/// Accepts one quiz attempt.
///
/// Checks run in a fixed order and stop at the first failure: identity,
/// answer shape, quiz existence, activation, window, registration, prior
/// submission. The pre-check for a prior submission only spares the
/// grading work; the store's unique insert is what enforces one response
/// per `(quiz, email)`.
pub async fn submit_answers(
    store: &dyn QuizStore,
    quiz_id: i64,
    caller: Option<&Caller>,
    request: SubmitQuizRequest,
    now: DateTime<Utc>,
) -> Result<SubmitAck, AppError> {
    let caller = caller.ok_or_else(|| {
        AppError::AuthRequired("Please sign in to submit this quiz".to_string())
    })?;

    request.validate()?;

    let quiz = store
        .get_quiz(quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    if !quiz.is_active {
        return Err(AppError::Inactive);
    }

    check_window(&quiz, now)?;
    check_registration(store, &quiz, Some(caller)).await?;

    if store.has_response(quiz.id, &caller.email).await? {
        tracing::info!("Duplicate submission for quiz {} by {}", quiz.id, caller.email);
        return Err(AppError::AlreadySubmitted);
    }

    let card = grade(&quiz.questions, &request.answers);

    let stored = store
        .insert_response(NewResponse {
            quiz_id: quiz.id,
            user_name: caller.name.clone(),
            user_email: caller.email.clone(),
            answers: request.answers,
            score: card.score,
            total_questions: card.total_questions,
            total_time_taken_seconds: card.total_time_taken_seconds,
        })
        .await
        .inspect_err(|e| {
            if matches!(e, AppError::AlreadySubmitted) {
                tracing::info!("Concurrent duplicate for quiz {} by {}", quiz.id, caller.email);
            }
        })?;

    tracing::info!("Response {} recorded for quiz {} by {}", stored.id, quiz.id, caller.email);

    Ok(SubmitAck {
        success: true,
        feedback_link: quiz.feedback_link,
    })
}
