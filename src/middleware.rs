//! Middleware chain for the management endpoints.
//!
//! Every management request passes through the stages in a fixed order:
//!
//! 1. [`log_request`] records the request in the ledger, even if a later stage rejects it.
//! 2. [`rate_limit`] (metered routes only) charges one credit to the `X-User` identity.
//! 3. [`isolate_errors`] runs the handler and turns any fault into a generic 500.
//!
//! [`management_chain`] is the only place the order is assembled.

use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::AppState;
use crate::constants::{ANONYMOUS_USER, USER_HEADER};
use crate::error::GatewayError;
use crate::ledger::CreditCheck;

/// Whether a group of routes charges credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metering {
    Public,
    Metered,
}

/// Wrap every route in `router` with the management chain.
pub fn management_chain(
    router: Router<Arc<AppState>>,
    state: &Arc<AppState>,
    metering: Metering,
) -> Router<Arc<AppState>> {
    // route_layer wraps outside-in: the layer added last runs first.
    let router = router.route_layer(middleware::from_fn_with_state(
        state.clone(),
        isolate_errors,
    ));
    let router = match metering {
        Metering::Metered => {
            router.route_layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        }
        Metering::Public => router,
    };
    router.route_layer(middleware::from_fn_with_state(state.clone(), log_request))
}

fn user_header(request: &Request) -> Option<String> {
    request
        .headers()
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub async fn log_request(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let user = user_header(&request).unwrap_or_else(|| ANONYMOUS_USER.to_string());
    state
        .ledger
        .record_request(&user, request.uri().path(), request.method().as_str())
        .await;
    tracing::info!(
        %user,
        method = %request.method(),
        endpoint = %request.uri().path(),
        "API request"
    );
    next.run(request).await
}

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(user) = user_header(&request) else {
        tracing::warn!(endpoint = %request.uri().path(), "Metered request without user header");
        return GatewayError::UnknownUser.into_response();
    };

    match state.ledger.try_consume_credit(&user).await {
        CreditCheck::Consumed { remaining } => {
            tracing::debug!(%user, remaining, "Credit consumed");
            next.run(request).await
        }
        CreditCheck::UnknownUser => {
            tracing::warn!(%user, "Metered request from unknown user");
            GatewayError::UnknownUser.into_response()
        }
        CreditCheck::Exhausted => {
            tracing::warn!(%user, "Credits exhausted");
            GatewayError::InsufficientCredits.into_response()
        }
    }
}

pub async fn isolate_errors(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let endpoint = request.uri().path().to_string();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => {
            if response.status().is_server_error() {
                state.ledger.record_error().await;
            }
            response
        }
        Err(panic) => {
            state.ledger.record_error().await;
            GatewayError::Internal(format!(
                "handler for {method} {endpoint} panicked: {}",
                panic_message(&*panic)
            ))
            .into_response()
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
