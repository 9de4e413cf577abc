pub mod api;
pub mod health;
pub mod proxy;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, Method, Uri, header},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::normalize_path::NormalizePath;
use utoipa_swagger_ui::SwaggerUi;

use crate::AppState;
use crate::config::CorsMode;
use crate::constants::USER_HEADER;

/// Request URI exactly as received, before trailing-slash normalization.
#[derive(Debug, Clone)]
pub struct InboundUri(pub Uri);

async fn capture_inbound_uri(mut request: Request, next: Next) -> Response {
    let uri = request.uri().clone();
    request.extensions_mut().insert(InboundUri(uri));
    next.run(request).await
}

/// The service `main` serves: routing plus CORS and path normalization.
///
/// Local routes match with or without a trailing slash; the proxy still
/// forwards the original path via [`InboundUri`].
pub fn app(state: Arc<AppState>, cors_mode: &CorsMode) -> Router {
    Router::new()
        .fallback_service(NormalizePath::trim_trailing_slash(router(state)))
        .layer(cors_layer(cors_mode))
        .layer(middleware::from_fn(capture_inbound_uri))
}

/// Routing without the outer layers.
///
/// Management endpoints, health and docs are matched first; anything else
/// falls through to the authenticated forwarding proxy.
pub fn router(state: Arc<AppState>) -> Router {
    let (api_routes, openapi) = api::router(&state);

    // Swagger UI + OpenAPI document (no credentials required)
    let swagger_routes = Router::new()
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", openapi));

    let proxy_routes = Router::new()
        .fallback(proxy::forward)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            proxy::require_credentials,
        ))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health::health))
        .route("/version", get(health::version))
        .merge(api_routes)
        .with_state(state)
        .merge(swagger_routes)
        .fallback_service(proxy_routes)
}

fn cors_layer(mode: &CorsMode) -> CorsLayer {
    let mode = mode.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            let Ok(origin_str) = origin.to_str() else {
                return false;
            };

            match &mode {
                CorsMode::AllowAll => true,
                CorsMode::LocalhostOnly => {
                    let Ok(url) = url::Url::parse(origin_str) else {
                        return false;
                    };
                    matches!(
                        url.host_str(),
                        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
                    )
                }
                CorsMode::AllowList(allowed) => allowed.iter().any(|a| a == origin_str),
            }
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static(USER_HEADER),
        ])
}
