use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Proxy credential check failed. Deliberately carries no reason.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Unauthorized or user not found")]
    UnknownUser,

    #[error("Insufficient credits")]
    InsufficientCredits,

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Upstream unavailable: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized | GatewayError::UnknownUser => StatusCode::UNAUTHORIZED,
            GatewayError::InsufficientCredits => StatusCode::FORBIDDEN,
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            // Plain body, identical for every failed check
            GatewayError::Unauthorized => (status, "Unauthorized").into_response(),
            GatewayError::Upstream(e) => {
                tracing::error!(error = %e, "upstream request failed");
                (status, Json(json!({ "error": "Upstream service unavailable" }))).into_response()
            }
            GatewayError::Internal(detail) => {
                tracing::error!(%detail, "internal error");
                (status, Json(json!({ "error": "Internal server error" }))).into_response()
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}
