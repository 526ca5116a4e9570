// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, types::Json};

use super::QuizStore;
use crate::{
    error::AppError,
    models::{
        quiz::{Quiz, QuizDraft},
        response::{NewResponse, QuizResponse},
    },
};

const QUIZ_COLUMNS: &str = "id, title, questions, feedback_link, linked_event_id, \
     available_from, available_until, is_active, created_at";

const RESPONSE_COLUMNS: &str = "id, quiz_id, user_name, user_email, answers, score, \
     total_questions, total_time_taken_seconds, submitted_at";

/// Postgres-backed store. The `(quiz_id, user_email)` unique constraint
/// lives in the schema (see `migrations/`), not in this code.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QuizStore for PgStore {
    async fn create_quiz(&self, draft: QuizDraft) -> Result<Quiz, AppError> {
        let sql = format!(
            "INSERT INTO quizzes \
             (title, questions, feedback_link, linked_event_id, available_from, available_until) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {QUIZ_COLUMNS}"
        );

        sqlx::query_as::<_, Quiz>(&sql)
            .bind(draft.title)
            .bind(Json(draft.questions))
            .bind(draft.feedback_link)
            .bind(draft.linked_event_id)
            .bind(draft.available_from)
            .bind(draft.available_until)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create quiz: {:?}", e);
                AppError::from(e)
            })
    }

    async fn update_quiz(&self, id: i64, draft: QuizDraft) -> Result<Option<Quiz>, AppError> {
        let sql = format!(
            "UPDATE quizzes SET \
             title = $1, questions = $2, feedback_link = $3, linked_event_id = $4, \
             available_from = $5, available_until = $6, updated_at = NOW() \
             WHERE id = $7 \
             RETURNING {QUIZ_COLUMNS}"
        );

        sqlx::query_as::<_, Quiz>(&sql)
            .bind(draft.title)
            .bind(Json(draft.questions))
            .bind(draft.feedback_link)
            .bind(draft.linked_event_id)
            .bind(draft.available_from)
            .bind(draft.available_until)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update quiz {}: {:?}", id, e);
                AppError::from(e)
            })
    }

    async fn set_active(&self, id: i64, is_active: bool) -> Result<Option<Quiz>, AppError> {
        let sql = format!(
            "UPDATE quizzes SET is_active = $1, updated_at = NOW() WHERE id = $2 \
             RETURNING {QUIZ_COLUMNS}"
        );

        Ok(sqlx::query_as::<_, Quiz>(&sql)
            .bind(is_active)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_quiz(&self, id: i64) -> Result<bool, AppError> {
        // The FK cascades too; the explicit delete keeps the two steps in one transaction.
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM quiz_responses WHERE quiz_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete quiz {}: {:?}", id, e);
                AppError::from(e)
            })?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        let sql = format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1");

        Ok(sqlx::query_as::<_, Quiz>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_quizzes(
        &self,
        event_id: Option<i64>,
        active_only: bool,
    ) -> Result<Vec<Quiz>, AppError> {
        let sql = format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes \
             WHERE ($1::BIGINT IS NULL OR linked_event_id = $1) \
             AND (NOT $2 OR is_active) \
             ORDER BY created_at DESC, id DESC"
        );

        sqlx::query_as::<_, Quiz>(&sql)
            .bind(event_id)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list quizzes: {:?}", e);
                AppError::from(e)
            })
    }

    async fn count_responses(&self, quiz_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quiz_responses WHERE quiz_id = $1")
            .bind(quiz_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn response_counts(&self) -> Result<HashMap<i64, i64>, AppError> {
        let rows: Vec<(i64, i64)> =
            sqlx::query_as("SELECT quiz_id, COUNT(*) FROM quiz_responses GROUP BY quiz_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn has_response(&self, quiz_id: i64, email: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM quiz_responses WHERE quiz_id = $1 AND user_email = $2)",
        )
        .bind(quiz_id)
        .bind(email.to_lowercase())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_response(&self, response: NewResponse) -> Result<QuizResponse, AppError> {
        let sql = format!(
            "INSERT INTO quiz_responses \
             (quiz_id, user_name, user_email, answers, score, total_questions, total_time_taken_seconds) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {RESPONSE_COLUMNS}"
        );

        sqlx::query_as::<_, QuizResponse>(&sql)
            .bind(response.quiz_id)
            .bind(&response.user_name)
            .bind(response.user_email.to_lowercase())
            .bind(Json(&response.answers))
            .bind(response.score)
            .bind(response.total_questions)
            .bind(response.total_time_taken_seconds)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if let Some(db) = e.as_database_error() {
                    if db.is_unique_violation() {
                        return AppError::AlreadySubmitted;
                    }
                    if db.is_foreign_key_violation() {
                        return AppError::NotFound("Quiz not found".to_string());
                    }
                }
                tracing::error!("Failed to insert quiz response: {:?}", e);
                AppError::from(e)
            })
    }

    async fn list_responses(&self, quiz_id: Option<i64>) -> Result<Vec<QuizResponse>, AppError> {
        let sql = format!(
            "SELECT {RESPONSE_COLUMNS} FROM quiz_responses \
             WHERE ($1::BIGINT IS NULL OR quiz_id = $1) \
             ORDER BY submitted_at DESC, id DESC"
        );

        sqlx::query_as::<_, QuizResponse>(&sql)
            .bind(quiz_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list quiz responses: {:?}", e);
                AppError::from(e)
            })
    }

    async fn delete_response(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM quiz_responses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_registered(&self, event_id: i64, email: &str) -> Result<bool, AppError> {
        let registered: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM event_registrations WHERE event_id = $1 AND lower(email) = $2)",
        )
        .bind(event_id)
        .bind(email.to_lowercase())
        .fetch_one(&self.pool)
        .await?;
        Ok(registered)
    }
}
