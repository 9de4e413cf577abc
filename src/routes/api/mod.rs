mod models;
mod usage;
mod users;

// Glob re-exports so utoipa's `routes!()` macro can find the hidden `__path_*` structs
// alongside the handler functions at the `crate::routes::api::*` path.
pub use models::*;
pub use usage::*;
pub use users::*;

use axum::Router;
use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use utoipa::ToSchema;
use utoipa::openapi::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::AppState;
use crate::error::GatewayError;
use crate::middleware::{Metering, management_chain};

// --- Shared response types ---

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Management routes with their middleware chains, plus the OpenAPI document.
pub fn router(state: &Arc<AppState>) -> (Router<Arc<AppState>>, OpenApi) {
    let (public, mut openapi) = OpenApiRouter::<Arc<AppState>>::new()
        .routes(routes!(get_metrics))
        .routes(routes!(get_user_credits, add_user_credits))
        .routes(routes!(reset_credits))
        .split_for_parts();

    let (metered, metered_openapi) = OpenApiRouter::<Arc<AppState>>::new()
        .routes(routes!(get_logs))
        .routes(routes!(list_models, add_model, delete_model))
        .routes(routes!(list_users))
        .split_for_parts();
    openapi.merge(metered_openapi);

    let router = management_chain(public, state, Metering::Public).merge(management_chain(
        metered,
        state,
        Metering::Metered,
    ));
    (router, openapi)
}

// --- Body helpers ---

/// Parse a request body that must be a JSON object.
pub(super) fn json_object(body: &Bytes) -> Result<Map<String, Value>, GatewayError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(GatewayError::InvalidInput(
            "Request body must be a JSON object".into(),
        )),
        Err(e) => Err(GatewayError::InvalidInput(format!("Invalid JSON body: {e}"))),
    }
}

/// Like [`json_object`], but an empty body yields an empty object.
pub(super) fn optional_json_object(body: &Bytes) -> Result<Map<String, Value>, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    json_object(body)
}

/// A non-negative integer field. Floats, strings and booleans are rejected.
pub(super) fn non_negative_int(value: &Value, field: &str) -> Result<i64, GatewayError> {
    match value.as_i64() {
        Some(n) if n >= 0 => Ok(n),
        _ => Err(GatewayError::InvalidInput(format!(
            "Invalid {field} value: expected a non-negative integer"
        ))),
    }
}
