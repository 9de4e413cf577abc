/// Upstream inference backend used when none is configured (local Ollama)
pub const DEFAULT_UPSTREAM_URL: &str = "http://localhost:11434";

/// Default cap on inbound proxy request bodies (10 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Default upper bound for a single relayed response frame
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Credits assigned by `POST /api/reset` when the body names none
pub const DEFAULT_RESET_CREDITS: i64 = 100;

/// Accounts present at startup when `GATEWAY_SEED_CREDITS` is unset
pub const DEFAULT_SEED_CREDITS: &str = "user1=100,user2=200";

/// Number of log entries returned by `GET /api/logs`
pub const RECENT_LOG_LIMIT: usize = 100;

/// Header carrying the caller identity for metered endpoints
pub const USER_HEADER: &str = "x-user";

/// Identity recorded for requests without a user header
pub const ANONYMOUS_USER: &str = "anonymous";

/// Inbound headers never copied to the upstream request.
/// The body is re-framed by the client, so framing headers go too.
pub const HEADERS_TO_STRIP: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "transfer-encoding",
    "content-length",
];
