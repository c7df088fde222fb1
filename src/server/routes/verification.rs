//! Direct verification endpoints.
//!
//! - GET /v1/{email}/verification - verify one address
//! - GET /verify/bulk?emails=a,b,c - verify several addresses and wait for all of them

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::core::error::AppError;
use crate::core::models::BulkVerification;
use crate::server::error::ApiError;
use crate::server::AppState;

pub(crate) const INVALID_SYNTAX_BODY: &str = "email address syntax is invalid";

#[derive(Debug, Deserialize)]
struct BulkQuery {
    #[serde(default)]
    emails: String,
}

async fn verify_single(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Response, ApiError> {
    match state.dispatcher.source().verify(&email).await {
        Ok(result) => Ok(Json(result).into_response()),
        Err(AppError::InvalidSyntax(_)) => Ok(INVALID_SYNTAX_BODY.into_response()),
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}

async fn verify_bulk(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BulkQuery>,
) -> Json<BulkVerification> {
    let addresses: Vec<String> = query
        .emails
        .split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(String::from)
        .collect();

    tracing::debug!(target: "http", "Bulk verification of {} addresses", addresses.len());
    Json(state.dispatcher.source().verify_bulk(addresses).await)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/{email}/verification", get(verify_single))
        .route("/verify/bulk", get(verify_bulk))
}
