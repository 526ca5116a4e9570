// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        quiz::{AdminQuiz, QuizListParams, QuizPayload, ToggleActiveRequest},
        response::ResponseListParams,
    },
    store::DynStore,
    utils::extract::{ValidJson, ValidPath},
};

/// Lists every quiz, answer keys included, with its response count.
/// Admin only.
pub async fn list_quizzes(
    State(store): State<DynStore>,
    Query(params): Query<QuizListParams>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = store.list_quizzes(params.event_id, false).await?;

    let counts = store.response_counts().await?;

    let rows: Vec<AdminQuiz> = quizzes
        .into_iter()
        .map(|quiz| AdminQuiz {
            response_count: counts.get(&quiz.id).copied().unwrap_or(0),
            quiz,
        })
        .collect();

    Ok(Json(rows))
}

/// Creates a new quiz.
/// Admin only.
pub async fn create_quiz(
    State(store): State<DynStore>,
    ValidJson(payload): ValidJson<QuizPayload>,
) -> Result<impl IntoResponse, AppError> {
    let draft = payload.into_draft()?;

    let quiz = store.create_quiz(draft).await?;
    tracing::info!("Quiz {} created with {} questions", quiz.id, quiz.questions.len());

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Replaces a quiz's content (questions included).
/// Admin only. Existing responses keep their own `total_questions` snapshot.
pub async fn update_quiz(
    State(store): State<DynStore>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(payload): ValidJson<QuizPayload>,
) -> Result<impl IntoResponse, AppError> {
    let draft = payload.into_draft()?;

    let quiz = store
        .update_quiz(id, draft)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    Ok(Json(quiz))
}

/// Switches a quiz on or off.
/// Admin only.
pub async fn toggle_active(
    State(store): State<DynStore>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(payload): ValidJson<ToggleActiveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = store
        .set_active(id, payload.is_active)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    tracing::info!("Quiz {} active = {}", id, quiz.is_active);

    Ok(Json(quiz))
}

/// Deletes a quiz and all of its responses.
/// Admin only.
pub async fn delete_quiz(
    State(store): State<DynStore>,
    ValidPath(id): ValidPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_quiz(id).await? {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    tracing::info!("Quiz {} deleted with its responses", id);

    Ok(StatusCode::NO_CONTENT)
}

/// Lists responses, newest first, optionally for one quiz.
/// Admin only.
pub async fn list_responses(
    State(store): State<DynStore>,
    Query(params): Query<ResponseListParams>,
) -> Result<impl IntoResponse, AppError> {
    let responses = store.list_responses(params.quiz_id).await?;

    Ok(Json(responses))
}

/// Deletes a single response by ID, allowing that user to retake the quiz.
/// Admin only.
pub async fn delete_response(
    State(store): State<DynStore>,
    ValidPath(id): ValidPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_response(id).await? {
        return Err(AppError::NotFound("Response not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
