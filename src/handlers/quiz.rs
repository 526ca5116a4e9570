// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    eligibility::{self, Caller},
    error::AppError,
    models::{
        quiz::{PublicQuiz, QuizListParams, QuizView},
        response::SubmitQuizRequest,
    },
    store::DynStore,
    submission::submit_answers,
    utils::{
        extract::{ValidJson, ValidPath},
        jwt::{Claims, MaybeClaims},
    },
};

/// Lists active quizzes for takers, newest first.
/// Answer keys are stripped by the `PublicQuiz` DTO.
pub async fn list_quizzes(
    State(store): State<DynStore>,
    Query(params): Query<QuizListParams>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = store.list_quizzes(params.event_id, true).await?;

    let public: Vec<PublicQuiz> = quizzes.iter().map(PublicQuiz::from).collect();

    Ok(Json(public))
}

/// Fetches one quiz for taking.
///
/// * Runs the eligibility gate (admins bypass it).
/// * Reports `already_submitted` without blocking, so the UI can say so.
/// * Never includes `correct_answer`, whoever is asking.
pub async fn get_quiz(
    State(store): State<DynStore>,
    Extension(MaybeClaims(claims)): Extension<MaybeClaims>,
    ValidPath(id): ValidPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = store
        .get_quiz(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

    let caller = claims.as_ref().map(Caller::from);
    let access = eligibility::check_view(&*store, &quiz, caller.as_ref(), Utc::now()).await?;

    Ok(Json(QuizView {
        quiz: PublicQuiz::from(&quiz),
        already_submitted: access.already_submitted,
    }))
}

/// Submits a taker's answers.
///
/// * Requires an identity (enforced by `auth_middleware`).
/// * Scores server-side and stores the response once.
/// * Returns only a success flag and the feedback link.
pub async fn submit_quiz(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(req): ValidJson<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller = Caller::from(&claims);

    let ack = submit_answers(&*store, id, Some(&caller), req, Utc::now()).await?;

    Ok(Json(ack))
}
