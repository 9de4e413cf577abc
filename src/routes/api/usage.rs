use axum::{Json, extract::State};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::{ErrorResponse, non_negative_int, optional_json_object};
use crate::AppState;
use crate::constants::RECENT_LOG_LIMIT;
use crate::error::GatewayError;
use crate::ledger::{LogEntry, UsageMetrics};

// --- Types ---

#[derive(Deserialize, Serialize, ToSchema)]
pub struct ResetRequest {
    /// Balance assigned to every known user (default 100)
    pub default_credits: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct ResetResponse {
    pub message: String,
    pub default_credits: i64,
    pub users: usize,
}

// --- Handlers ---

/// Aggregate request/error counters and loaded models
#[utoipa::path(
    get,
    path = "/api/metrics",
    tag = "usage",
    responses((status = 200, body = UsageMetrics))
)]
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<UsageMetrics> {
    Json(state.ledger.snapshot_metrics().await)
}

/// Most recent request log entries, oldest first
#[utoipa::path(
    get,
    path = "/api/logs",
    tag = "usage",
    params(("X-User" = String, Header, description = "Caller identity, charged one credit")),
    responses(
        (status = 200, body = Vec<LogEntry>),
        (status = 401, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
    )
)]
pub async fn get_logs(State(state): State<Arc<AppState>>) -> Json<Vec<LogEntry>> {
    Json(state.ledger.recent_logs(RECENT_LOG_LIMIT).await)
}

/// Set every known user's balance
#[utoipa::path(
    post,
    path = "/api/reset",
    tag = "usage",
    request_body(content = ResetRequest, description = "Optional; an empty body uses the default"),
    responses(
        (status = 200, body = ResetResponse),
        (status = 400, body = ErrorResponse),
    )
)]
pub async fn reset_credits(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ResetResponse>, GatewayError> {
    let object = optional_json_object(&body)?;
    let default_credits = match object.get("default_credits") {
        None | Some(serde_json::Value::Null) => state.default_credits,
        Some(value) => non_negative_int(value, "default_credits")?,
    };

    let users = state.ledger.reset_all(default_credits).await;
    tracing::info!(default_credits, users, "Credits reset");
    Ok(Json(ResetResponse {
        message: "Credits reset".into(),
        default_credits,
        users,
    }))
}
