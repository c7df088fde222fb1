//! Asynchronous bulk job endpoints.
//!
//! - POST /bulk/job/start - create a job from `{"emails": [...]}`
//! - GET /bulk/job/status/{job_id} - job progress
//! - GET /bulk/job/results/{job_id} - aggregate results once finished

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::core::models::JobId;
use crate::server::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
struct StartJobRequest {
    emails: Vec<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct StartJobResponse {
    pub job_id: JobId,
}

/// Serializes `value` by hand so a marshal failure surfaces as a 500 with its text.
fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response, ApiError> {
    let body = serde_json::to_vec(value).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((status, [(header::CONTENT_TYPE, "application/json")], body).into_response())
}

async fn start_job(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("request body is empty".to_string()));
    }
    let request: StartJobRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("malformed request body: {}", e)))?;

    let job_id = state.dispatcher.submit(request.emails)?;
    json_response(StatusCode::CREATED, &StartJobResponse { job_id })
}

async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let job = state.dispatcher.status(&job_id)?;
    json_response(StatusCode::OK, &job)
}

async fn job_results(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let result = state.dispatcher.results(&job_id)?;
    json_response(StatusCode::OK, result.as_ref())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bulk/job/start", post(start_job))
        .route("/bulk/job/status/{job_id}", get(job_status))
        .route("/bulk/job/results/{job_id}", get(job_results))
}
