//! API request handlers with proper error propagation.
//!
//! All handlers return `Result<impl IntoResponse, SiftError>` so that errors
//! are automatically converted to appropriate HTTP status codes via the
//! `IntoResponse` implementation on `SiftError`. The evaluation submission
//! handler additionally runs the per-route admission guard before doing any
//! work, so a denied caller gets the 429 without touching the database.

use axum::{
    extract::{ConnectInfo, Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::info;
use uuid::Uuid;

use super::AppState;
use crate::db::{DocumentRow, DocumentType, EvaluationRow, EvaluationStatus};
use crate::error::SiftError;
use crate::jobs::EvaluationJob;
use crate::repositories::NewDocument;

// ═══════════════════════════════════════════════════════════════════════════════
// Health Check
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "rate_limit": {
            "enabled": state.rate_limit.enabled,
            "requests_per_minute": state.rate_limit.requests_per_minute,
            "window_secs": state.rate_limit.window_secs,
        }
    }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Metrics
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.render()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Document Upload
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub filename: String,
    pub file_size: i64,
    pub document_type: String,
    pub uploaded_at: String,
}

impl From<DocumentRow> for DocumentResponse {
    fn from(row: DocumentRow) -> Self {
        Self {
            id: row.id,
            filename: row.original_filename,
            file_size: row.file_size,
            document_type: row.document_type,
            uploaded_at: row.uploaded_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub cv_document: DocumentResponse,
    pub project_document: DocumentResponse,
}

struct UploadPart {
    original_filename: String,
    content_type: String,
    data: axum::body::Bytes,
}

/// Accept a CV and a project report as multipart PDF uploads.
///
/// Both parts are required; each is validated, written to disk under a
/// generated name, and recorded in the documents table.
pub async fn upload_documents(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, SiftError> {
    let mut cv: Option<UploadPart> = None;
    let mut project: Option<UploadPart> = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let part = UploadPart {
            original_filename: field.file_name().unwrap_or_default().to_string(),
            content_type: field.content_type().unwrap_or_default().to_string(),
            data: field.bytes().await?,
        };

        match name.as_str() {
            "cv" => cv = Some(part),
            "project_report" => project = Some(part),
            _ => {}
        }
    }

    let cv = cv.ok_or_else(|| SiftError::validation("Missing multipart field: cv"))?;
    let project =
        project.ok_or_else(|| SiftError::validation("Missing multipart field: project_report"))?;

    let cv_row = store_upload(&state, DocumentType::Cv, cv).await?;
    let project_row = store_upload(&state, DocumentType::ProjectReport, project).await?;

    info!(
        cv_document_id = %cv_row.id,
        project_document_id = %project_row.id,
        "Documents uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            cv_document: cv_row.into(),
            project_document: project_row.into(),
        }),
    ))
}

async fn store_upload(
    state: &AppState,
    doc_type: DocumentType,
    part: UploadPart,
) -> Result<DocumentRow, SiftError> {
    let stored = state
        .upload_store
        .save(
            doc_type,
            &part.original_filename,
            &part.content_type,
            &part.data,
        )
        .await?;

    state
        .documents
        .create(NewDocument {
            filename: stored.filename,
            original_filename: part.original_filename,
            file_path: stored.file_path,
            file_size: stored.file_size as i64,
            mime_type: part.content_type,
            document_type: doc_type,
        })
        .await
}

// ═══════════════════════════════════════════════════════════════════════════════
// Evaluation Submission
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct EvaluationCreate {
    pub job_title: String,
    pub cv_document_id: Uuid,
    pub project_document_id: Uuid,
}

#[derive(Serialize)]
pub struct EvaluationQueuedResponse {
    pub id: Uuid,
    pub status: &'static str,
}

/// Queue an evaluation for a pair of uploaded documents.
///
/// Runs the stricter per-route budget first; a denied caller never reaches
/// the database. On admission the returned quota headers are stamped onto
/// the response.
pub async fn submit_evaluation(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<EvaluationCreate>,
) -> Result<Response, SiftError> {
    let remote_addr = connect_info.map(|ci| ci.0);
    let grant = match state.evaluate_guard.admit(&headers, remote_addr).await {
        Ok(grant) => grant,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let job_title = req.job_title.trim();
    if job_title.is_empty() {
        return Err(SiftError::validation("job_title cannot be empty"));
    }
    if job_title.len() > 255 {
        return Err(SiftError::validation(
            "job_title cannot exceed 255 characters",
        ));
    }

    state
        .documents
        .get(req.cv_document_id)
        .await?
        .ok_or_else(|| SiftError::not_found("document", req.cv_document_id.to_string()))?;
    state
        .documents
        .get(req.project_document_id)
        .await?
        .ok_or_else(|| SiftError::not_found("document", req.project_document_id.to_string()))?;

    let evaluation = state
        .evaluations
        .create(job_title, req.cv_document_id, req.project_document_id)
        .await?;

    state
        .queue
        .enqueue(EvaluationJob::new(evaluation.id))
        .await?;

    info!(evaluation_id = %evaluation.id, job_title = %job_title, "Evaluation queued");

    let mut response = Json(EvaluationQueuedResponse {
        id: evaluation.id,
        status: EvaluationStatus::Queued.as_str(),
    })
    .into_response();
    grant.apply(response.headers_mut());

    Ok(response)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Evaluation Result
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
pub struct ResultResponse {
    pub id: Uuid,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Serialize)]
pub struct ResultBody {
    pub cv_match_rate: Option<f64>,
    pub cv_feedback: Option<String>,
    pub project_score: Option<f64>,
    pub project_feedback: Option<String>,
    pub overall_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv_detailed_scores: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_detailed_scores: Option<serde_json::Value>,
}

impl From<EvaluationRow> for ResultResponse {
    fn from(row: EvaluationRow) -> Self {
        let status = row.status();
        let result = match status {
            Some(EvaluationStatus::Completed) => Some(ResultBody {
                cv_match_rate: row.cv_match_rate,
                cv_feedback: row.cv_feedback,
                project_score: row.project_score,
                project_feedback: row.project_feedback,
                overall_summary: row.overall_summary,
                cv_detailed_scores: row.cv_detailed_scores,
                project_detailed_scores: row.project_detailed_scores,
            }),
            _ => None,
        };
        let error_message = match status {
            Some(EvaluationStatus::Failed) => row.error_message,
            _ => None,
        };

        Self {
            id: row.id,
            status: row.status,
            result,
            error_message,
        }
    }
}

pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, SiftError> {
    let evaluation = state
        .evaluations
        .get(id)
        .await?
        .ok_or_else(|| SiftError::not_found("evaluation", id.to_string()))?;

    Ok(Json(ResultResponse::from(evaluation)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(status: &str) -> EvaluationRow {
        EvaluationRow {
            id: Uuid::now_v7(),
            job_title: "Backend Engineer".to_string(),
            cv_document_id: Uuid::now_v7(),
            project_document_id: Uuid::now_v7(),
            status: status.to_string(),
            cv_match_rate: Some(0.85),
            cv_feedback: Some("Good".to_string()),
            project_score: Some(4.0),
            project_feedback: Some("Solid".to_string()),
            overall_summary: Some("Fit".to_string()),
            cv_detailed_scores: None,
            project_detailed_scores: None,
            error_message: Some("boom".to_string()),
            retry_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_result_response_hides_partial_results_while_queued() {
        let response = ResultResponse::from(row("queued"));
        assert_eq!(response.status, "queued");
        assert!(response.result.is_none());
        assert!(response.error_message.is_none());
    }

    #[test]
    fn test_result_response_exposes_scores_when_completed() {
        let response = ResultResponse::from(row("completed"));
        let body = response.result.expect("completed result");
        assert_eq!(body.cv_match_rate, Some(0.85));
        assert_eq!(body.project_score, Some(4.0));
        assert!(response.error_message.is_none());
    }

    #[test]
    fn test_result_response_exposes_error_when_failed() {
        let response = ResultResponse::from(row("failed"));
        assert!(response.result.is_none());
        assert_eq!(response.error_message.as_deref(), Some("boom"));
    }
}
