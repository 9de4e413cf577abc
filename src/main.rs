mod auth;
mod config;
mod constants;
mod error;
mod ledger;
mod middleware;
mod routes;
mod streaming;

use auth::CredentialValidator;
use clap::Parser;
use config::{Config, CorsMode};
use ledger::Ledger;
use reqwest::Client;
use routes::proxy::UpstreamSettings;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");
pub const BUILD_TIME: &str = env!("BUILD_TIME");

pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub credentials: CredentialValidator,
    pub http_client: Client,
    pub upstream: UpstreamSettings,
    /// Balance applied by `POST /api/reset` when the body names none
    pub default_credits: i64,
}

impl AppState {
    pub fn new(config: &Config, http_client: Client) -> Self {
        Self {
            ledger: Arc::new(Ledger::new(
                config.seed_credits.clone(),
                config.log_retention,
            )),
            credentials: CredentialValidator::new(config.allowed_ips.clone(), &config.api_key),
            http_client,
            upstream: UpstreamSettings {
                base_url: config.upstream_url.clone(),
                chunk_size: config.chunk_size,
                max_body_bytes: config.max_body_bytes,
            },
            default_credits: config.default_credits,
        }
    }
}

#[derive(Parser)]
#[command(name = "inference-gateway")]
#[command(about = "Authenticating, credit-metering gateway for a local inference backend")]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, env = "GATEWAY_HOST")]
    host: Option<String>,

    /// Port to bind to
    #[arg(short, long, env = "GATEWAY_PORT")]
    port: Option<u16>,

    /// Upstream base URL to forward to
    #[arg(short, long, env = "GATEWAY_UPSTREAM_URL")]
    upstream: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Refusing to start: {e}");
            std::process::exit(1);
        }
    };

    if let Some(upstream) = args.upstream {
        match config::validate_upstream_url(&upstream) {
            Ok(url) => config.upstream_url = url,
            Err(reason) => {
                tracing::error!("Refusing to start: invalid upstream URL: {reason}");
                std::process::exit(1);
            }
        }
    }
    let host = args.host.unwrap_or_else(|| config.host.clone());
    let port = args.port.unwrap_or(config.port);

    // Shared HTTP client with connection pooling. No total timeout: streamed
    // generations may run for minutes.
    let http_client = match Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to create HTTP client: {e}");
            std::process::exit(1);
        }
    };

    if config.allowed_ips.is_empty() {
        tracing::warn!("IP allow-list is empty: all addresses may use the proxy");
    } else {
        info!("IP allow-list: {:?}", config.allowed_ips);
    }
    match &config.cors_mode {
        CorsMode::AllowAll => info!("CORS: Allowing all origins"),
        CorsMode::LocalhostOnly => info!("CORS: Localhost only"),
        CorsMode::AllowList(list) => info!("CORS: Allowing origins: {:?}", list),
    }

    let state = Arc::new(AppState::new(&config, http_client));

    let app = routes::app(state, &config.cors_mode);

    let addr: SocketAddr = match format!("{}:{}", host, port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Invalid listen address {host}:{port}: {e}");
            std::process::exit(1);
        }
    };
    info!(
        "Starting inference-gateway v{}-{} (built {})",
        VERSION, GIT_HASH, BUILD_TIME
    );
    info!("Listening on http://{}", addr);
    info!("Forwarding to {}", config.upstream_url);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    // ConnectInfo supplies the peer address when X-Forwarded-For is absent
    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
pub(crate) fn test_app_state(upstream_url: &str, allowed_ips: Vec<String>) -> AppState {
    let config = Config::from_lookup(|name| match name {
        "GATEWAY_API_KEY" => Some("test-secret".to_string()),
        "GATEWAY_UPSTREAM_URL" => Some(upstream_url.to_string()),
        _ => None,
    })
    .expect("test config");
    let mut state = AppState::new(&config, Client::new());
    state.credentials = CredentialValidator::new(allowed_ips, &config.api_key);
    state
}

#[cfg(test)]
pub(crate) fn test_state(upstream_url: &str, allowed_ips: Vec<String>) -> Arc<AppState> {
    Arc::new(test_app_state(upstream_url, allowed_ips))
}
