use axum::http::{HeaderMap, header};
use subtle::ConstantTimeEq;

/// Why a credential check failed. Only ever logged, never sent to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    IpNotAllowed,
    MissingAuthorization,
    InvalidApiKey,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::IpNotAllowed => "ip not allowed",
            Rejection::MissingAuthorization => "missing authorization header",
            Rejection::InvalidApiKey => "invalid api key",
        }
    }
}

/// Stateless gate for the proxy route: IP allow-list plus shared bearer secret.
#[derive(Debug, Clone)]
pub struct CredentialValidator {
    allowed_ips: Vec<String>,
    expected_authorization: String,
}

impl CredentialValidator {
    pub fn new(allowed_ips: Vec<String>, api_key: &str) -> Self {
        Self {
            allowed_ips,
            expected_authorization: format!("Bearer {api_key}"),
        }
    }

    /// An empty allow-list admits every address.
    pub fn ip_allowed(&self, ip: &str) -> bool {
        self.allowed_ips.is_empty() || self.allowed_ips.iter().any(|allowed| allowed == ip)
    }

    /// Both checks always run; the first failure is reported.
    pub fn validate(&self, caller_ip: &str, authorization: Option<&str>) -> Result<(), Rejection> {
        let ip_ok = self.ip_allowed(caller_ip);
        let key_check = match authorization {
            None => Err(Rejection::MissingAuthorization),
            Some(value) => {
                // Constant-time comparison to prevent timing attacks
                if value
                    .as_bytes()
                    .ct_eq(self.expected_authorization.as_bytes())
                    .into()
                {
                    Ok(())
                } else {
                    Err(Rejection::InvalidApiKey)
                }
            }
        };

        if !ip_ok {
            return Err(Rejection::IpNotAllowed);
        }
        key_check
    }
}

/// Caller address: first `X-Forwarded-For` hop if present, else the socket peer.
pub fn caller_ip(headers: &HeaderMap, remote_addr: Option<std::net::SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| remote_addr.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}
