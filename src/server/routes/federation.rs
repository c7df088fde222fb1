use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::core::models::FederationCheck;
use crate::server::error::ApiError;
use crate::server::AppState;

/// GET /v1/{email}/federation - whether the address has a Microsoft 365 mailbox.
async fn check_federation(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<FederationCheck>, ApiError> {
    let federated = state.probe.probe(&email).await?;
    Ok(Json(FederationCheck { federated }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/v1/{email}/federation", get(check_federation))
}
