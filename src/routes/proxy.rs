use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::BytesMut;
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::AppState;
use crate::auth::{authorization_header, caller_ip};
use crate::constants::HEADERS_TO_STRIP;
use crate::error::GatewayError;
use crate::routes::InboundUri;
use crate::streaming::relay_chunks;

/// Where and how proxied traffic is sent
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// Base URL without trailing slash; the inbound path and query are appended
    pub base_url: String,
    pub chunk_size: usize,
    pub max_body_bytes: usize,
}

/// Credential gate in front of the proxy fallback. Every attempt is audited.
pub async fn require_credentials(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let ip = caller_ip(request.headers(), remote);
    tracing::info!(%ip, "New request received");

    match state
        .credentials
        .validate(&ip, authorization_header(request.headers()))
    {
        Ok(()) => next.run(request).await,
        Err(reason) => {
            tracing::warn!(%ip, reason = reason.as_str(), "Rejected proxy request");
            GatewayError::Unauthorized.into_response()
        }
    }
}

/// Forward any authenticated request to the upstream and stream the answer back.
pub async fn forward(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let span = tracing::info_span!(
        "proxy",
        request_id = %Uuid::new_v4(),
        method = %request.method(),
        path = %request.uri().path(),
    );

    match forward_inner(&state, request).instrument(span).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn forward_inner(state: &AppState, request: Request) -> Result<Response, GatewayError> {
    let upstream = &state.upstream;
    let (parts, body) = request.into_parts();

    if !matches!(
        parts.method,
        Method::GET | Method::POST | Method::PUT | Method::DELETE
    ) {
        return Err(GatewayError::MethodNotAllowed);
    }

    // Fast path: declared length already over the cap
    if let Some(declared) = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        && declared > upstream.max_body_bytes as u64
    {
        tracing::warn!(declared, "Request body over limit");
        return Err(GatewayError::PayloadTooLarge);
    }

    let body = read_limited(body, upstream.max_body_bytes).await?;

    // Trailing-slash normalization only applies to local routes; upstream gets the path as sent
    let inbound_uri = parts
        .extensions
        .get::<InboundUri>()
        .map(|inbound| &inbound.0)
        .unwrap_or(&parts.uri);
    let path_and_query = inbound_uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", upstream.base_url, path_and_query);

    let mut headers = parts.headers;
    for name in HEADERS_TO_STRIP {
        headers.remove(*name);
    }

    tracing::info!(%url, "Forwarding request");

    let response = state
        .http_client
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await?;

    let status = response.status();
    tracing::info!(status = status.as_u16(), "Upstream response");

    let mut builder = Response::builder().status(status);
    if let Some(content_type) = response.headers().get(header::CONTENT_TYPE) {
        builder = builder.header(header::CONTENT_TYPE, content_type.clone());
    }

    // Dropping this body (caller disconnect) drops the upstream connection with it
    let stream = relay_chunks(response.bytes_stream(), upstream.chunk_size);
    builder
        .body(Body::from_stream(stream))
        .map_err(|e| GatewayError::Internal(format!("failed to build proxy response: {e}")))
}

/// Read the inbound body, aborting as soon as it exceeds `limit`.
async fn read_limited(body: Body, limit: usize) -> Result<bytes::Bytes, GatewayError> {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| GatewayError::InvalidInput(format!("Failed to read request body: {e}")))?;
        if buf.len() + chunk.len() > limit {
            tracing::warn!(limit, "Request body over limit");
            return Err(GatewayError::PayloadTooLarge);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
