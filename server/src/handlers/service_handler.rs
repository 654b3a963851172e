use axum::{extract::Path, http::StatusCode, response::IntoResponse, Extension, Json};
use bulletin_service_cli::summarize::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::bulletin_handlers::{api_error, ApiError};
use crate::state::{AppState, JobRecord, JobStatus};

#[derive(Deserialize)]
pub struct SummaryPayload {
    pub number: usize,
}

#[derive(Serialize)]
pub struct JobCreated {
    pub job_id: Uuid,
}

#[derive(Serialize)]
pub struct JobPollResponse {
    pub status: String,
    pub number: usize,
    pub summary: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// POST /api/summaries
pub async fn create_summary(
    Extension(state): Extension<AppState>,
    Json(payload): Json<SummaryPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let bulletin = state
        .catalog
        .get(payload.number)
        .map_err(|e| api_error(&e))?
        .clone();
    let Some(summarizer) = state.summarizer.clone() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "message": "GEMINI_API_KEY not configured" })),
        ));
    };

    // 1) New job, stored as pending
    let job_id = Uuid::new_v4();
    state.jobs.insert(job_id, JobRecord::pending(bulletin.number));
    info!(%job_id, number = bulletin.number, "summary job queued");

    // 2) Extract and summarize in the background
    let state_clone = state.clone();
    tokio::spawn(async move {
        let text = match state_clone
            .scraper
            .extract_gazette_text(&bulletin.url, bulletin.gazette)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(%job_id, error = %e, "text extraction failed");
                state_clone.set_status(job_id, JobStatus::Failed {
                    error: format!("Extraction error: {e}"),
                });
                return;
            }
        };

        let summary = summarizer
            .summarize_document(&Document::new(text, bulletin.url))
            .await;
        info!(%job_id, "summary job done");
        state_clone.set_status(job_id, JobStatus::Done { summary });
    });

    // 3) Answer 202 with the job id right away
    Ok((StatusCode::ACCEPTED, Json(json!(JobCreated { job_id }))))
}

/// GET /api/jobs/{id}
pub async fn poll_job(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    if let Some(job) = state.jobs.get(&id) {
        let (status, summary, error) = match &job.status {
            JobStatus::Pending => ("pending", None, None),
            JobStatus::Done { summary } => ("done", Some(summary.clone()), None),
            JobStatus::Failed { error } => ("failed", None, Some(error.clone())),
        };
        let resp = JobPollResponse {
            status: status.to_string(),
            number: job.number,
            summary,
            error,
            created_at: job.created_at,
            finished_at: job.finished_at,
        };
        (StatusCode::OK, Json(json!(resp)))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "error": "Job not found" })))
    }
}
