//! Evaluation persistence.

use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{EvaluationRow, EvaluationStatus};
use crate::error::Result;

/// Scores and feedback produced by a completed evaluation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EvaluationResult {
    pub cv_match_rate: f64,
    pub cv_feedback: String,
    pub project_score: f64,
    pub project_feedback: String,
    pub overall_summary: String,
    pub cv_detailed_scores: Option<serde_json::Value>,
    pub project_detailed_scores: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct EvaluationRepository {
    pool: PgPool,
}

impl EvaluationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a queued evaluation for a pair of documents.
    pub async fn create(
        &self,
        job_title: &str,
        cv_document_id: Uuid,
        project_document_id: Uuid,
    ) -> Result<EvaluationRow> {
        let row = sqlx::query_as::<_, EvaluationRow>(
            r#"
            INSERT INTO evaluations (id, job_title, cv_document_id, project_document_id, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, job_title, cv_document_id, project_document_id, status,
                      cv_match_rate, cv_feedback, project_score, project_feedback,
                      overall_summary, cv_detailed_scores, project_detailed_scores,
                      error_message, retry_count, created_at, started_at, completed_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(job_title)
        .bind(cv_document_id)
        .bind(project_document_id)
        .bind(EvaluationStatus::Queued.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Get an evaluation by ID.
    pub async fn get(&self, id: Uuid) -> Result<Option<EvaluationRow>> {
        let row = sqlx::query_as::<_, EvaluationRow>(
            r#"
            SELECT id, job_title, cv_document_id, project_document_id, status,
                   cv_match_rate, cv_feedback, project_score, project_feedback,
                   overall_summary, cv_detailed_scores, project_detailed_scores,
                   error_message, retry_count, created_at, started_at, completed_at
            FROM evaluations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Move a queued evaluation to processing, stamping started_at.
    pub async fn mark_processing(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE evaluations
            SET status = $2, started_at = COALESCE(started_at, NOW())
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(EvaluationStatus::Processing.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store results and mark the evaluation completed.
    pub async fn save_results(&self, id: Uuid, result: &EvaluationResult) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE evaluations
            SET status = $2,
                cv_match_rate = $3,
                cv_feedback = $4,
                project_score = $5,
                project_feedback = $6,
                overall_summary = $7,
                cv_detailed_scores = $8,
                project_detailed_scores = $9,
                completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(EvaluationStatus::Completed.as_str())
        .bind(result.cv_match_rate)
        .bind(&result.cv_feedback)
        .bind(result.project_score)
        .bind(&result.project_feedback)
        .bind(&result.overall_summary)
        .bind(&result.cv_detailed_scores)
        .bind(&result.project_detailed_scores)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark the evaluation failed with an error message.
    pub async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE evaluations
            SET status = $2,
                error_message = $3,
                retry_count = retry_count + 1,
                completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(EvaluationStatus::Failed.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
