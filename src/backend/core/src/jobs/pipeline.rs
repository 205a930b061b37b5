//! Evaluation pipeline seam.
//!
//! The actual scoring (PDF parsing, retrieval, model calls) is deliberately
//! behind this trait: the API process never runs it, and worker deployments
//! plug in their own implementation.

use async_trait::async_trait;

use crate::error::Result;
use crate::repositories::EvaluationResult;

/// Input handed to a pipeline for one evaluation.
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    /// Role the candidate is evaluated against
    pub job_title: String,

    /// Path to the stored CV PDF
    pub cv_path: String,

    /// Path to the stored project report PDF
    pub project_path: String,
}

/// Produces scores and feedback for a candidate's documents.
#[async_trait]
pub trait EvaluationPipeline: Send + Sync {
    async fn evaluate(&self, input: EvaluationInput) -> Result<EvaluationResult>;
}
