use axum::{
    Json,
    extract::{Path, State},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{ErrorResponse, json_object, non_negative_int};
use crate::AppState;
use crate::error::GatewayError;

// --- Types ---

#[derive(Serialize, ToSchema)]
pub struct CreditsResponse {
    pub credits: i64,
}

#[derive(Serialize, ToSchema)]
pub struct CreditsUpdatedResponse {
    pub message: String,
    pub credits: i64,
}

#[derive(Deserialize, Serialize, ToSchema)]
pub struct AddCreditsRequest {
    pub credits: i64,
}

/// Identity to balance
#[derive(Serialize, ToSchema)]
pub struct UserBalances(pub BTreeMap<String, i64>);

// --- Handlers ---

/// Credit balance of one user
#[utoipa::path(
    get,
    path = "/api/users/{name}",
    tag = "users",
    params(("name" = String, Path, description = "User identity")),
    responses(
        (status = 200, body = CreditsResponse),
        (status = 404, body = ErrorResponse),
    )
)]
pub async fn get_user_credits(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<CreditsResponse>, GatewayError> {
    state
        .ledger
        .balance(&name)
        .await
        .map(|credits| Json(CreditsResponse { credits }))
        .ok_or_else(|| GatewayError::NotFound("User not found".into()))
}

/// Add credits, creating the user if needed
#[utoipa::path(
    post,
    path = "/api/users/{name}",
    tag = "users",
    params(("name" = String, Path, description = "User identity")),
    request_body = AddCreditsRequest,
    responses(
        (status = 200, body = CreditsUpdatedResponse),
        (status = 400, body = ErrorResponse),
    )
)]
pub async fn add_user_credits(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<CreditsUpdatedResponse>, GatewayError> {
    let object = json_object(&body)?;
    let delta = object
        .get("credits")
        .ok_or_else(|| GatewayError::InvalidInput("Invalid credits value".into()))
        .and_then(|v| non_negative_int(v, "credits"))?;

    let credits = state.ledger.add_credits(&name, delta).await;
    tracing::info!(user = %name, delta, credits, "Credits added");
    Ok(Json(CreditsUpdatedResponse {
        message: format!("Credits updated for {name}"),
        credits,
    }))
}

/// All users and their balances
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    params(("X-User" = String, Header, description = "Caller identity, charged one credit")),
    responses(
        (status = 200, body = UserBalances),
        (status = 401, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
    )
)]
pub async fn list_users(State(state): State<Arc<AppState>>) -> Json<UserBalances> {
    Json(UserBalances(state.ledger.balances().await))
}
