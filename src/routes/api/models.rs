use axum::{Json, extract::State};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::{ErrorResponse, MessageResponse, json_object};
use crate::AppState;
use crate::error::GatewayError;

const MAX_MODEL_NAME_LENGTH: usize = 256;

// --- Types ---

#[derive(Serialize, ToSchema)]
pub struct ListModelsResponse {
    pub models: Vec<String>,
}

#[derive(Deserialize, Serialize, ToSchema)]
pub struct ModelNameRequest {
    pub model_name: String,
}

fn model_name(body: &Bytes) -> Result<String, GatewayError> {
    let object = json_object(body)?;
    let name = match object.get("model_name") {
        Some(serde_json::Value::String(name)) if !name.trim().is_empty() => name,
        _ => return Err(GatewayError::InvalidInput("Model name is required".into())),
    };
    if name.len() > MAX_MODEL_NAME_LENGTH {
        return Err(GatewayError::InvalidInput(
            "Model name too long (max 256 characters)".into(),
        ));
    }
    Ok(name.clone())
}

// --- Handlers ---

/// List loaded models
#[utoipa::path(
    get,
    path = "/api/models",
    tag = "models",
    params(("X-User" = String, Header, description = "Caller identity, charged one credit")),
    responses(
        (status = 200, body = ListModelsResponse),
        (status = 401, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
    )
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ListModelsResponse> {
    Json(ListModelsResponse {
        models: state.ledger.list_models().await,
    })
}

/// Load a model
#[utoipa::path(
    post,
    path = "/api/models",
    tag = "models",
    params(("X-User" = String, Header, description = "Caller identity, charged one credit")),
    request_body = ModelNameRequest,
    responses(
        (status = 200, body = MessageResponse),
        (status = 400, body = ErrorResponse),
        (status = 401, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
    )
)]
pub async fn add_model(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<MessageResponse>, GatewayError> {
    let name = model_name(&body)?;
    state.ledger.add_model(&name).await;
    tracing::info!(model = %name, "Model loaded");
    Ok(Json(MessageResponse {
        message: format!("Model {name} loaded successfully"),
    }))
}

/// Unload a model (first matching entry)
#[utoipa::path(
    delete,
    path = "/api/models",
    tag = "models",
    params(("X-User" = String, Header, description = "Caller identity, charged one credit")),
    request_body = ModelNameRequest,
    responses(
        (status = 200, body = MessageResponse),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
    )
)]
pub async fn delete_model(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<MessageResponse>, GatewayError> {
    let name = model_name(&body)?;
    if !state.ledger.remove_model(&name).await {
        return Err(GatewayError::NotFound(format!("Model {name} not found")));
    }
    tracing::info!(model = %name, "Model removed");
    Ok(Json(MessageResponse {
        message: format!("Model {name} removed successfully"),
    }))
}
