//! Database layer for Sift.
//!
//! Uses PostgreSQL for persistent storage with sqlx. Row types and status
//! enums live here; query logic is in the repositories module.

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::{Result, SiftError};

/// Database connection and migrations.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| SiftError::from(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Domain Enums
// ═══════════════════════════════════════════════════════════════════════════════

/// What an uploaded document is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Cv,
    ProjectReport,
    JobDescription,
    CaseStudyBrief,
    ScoringRubric,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cv => "cv",
            Self::ProjectReport => "project_report",
            Self::JobDescription => "job_description",
            Self::CaseStudyBrief => "case_study_brief",
            Self::ScoringRubric => "scoring_rubric",
        }
    }
}

/// Lifecycle state of an evaluation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl EvaluationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Row Types (for sqlx queries)
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentRow {
    pub id: Uuid,
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub document_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EvaluationRow {
    pub id: Uuid,
    pub job_title: String,
    pub cv_document_id: Uuid,
    pub project_document_id: Uuid,
    pub status: String,
    pub cv_match_rate: Option<f64>,
    pub cv_feedback: Option<String>,
    pub project_score: Option<f64>,
    pub project_feedback: Option<String>,
    pub overall_summary: Option<String>,
    pub cv_detailed_scores: Option<serde_json::Value>,
    pub project_detailed_scores: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl EvaluationRow {
    pub fn status(&self) -> Option<EvaluationStatus> {
        EvaluationStatus::parse(&self.status)
    }
}
