use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::RwLock;
use utoipa::ToSchema;

/// One observed management request
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LogEntry {
    /// Seconds since the Unix epoch, fractional
    pub timestamp: f64,
    pub endpoint: String,
    pub user: String,
    pub method: String,
}

#[derive(Default)]
struct UsageState {
    entries: VecDeque<LogEntry>,
    requests: u64,
    errors: u64,
}

/// Request log plus the request/error counters.
///
/// The request counter is bumped under the same guard that appends the entry,
/// so the two never disagree.
pub struct UsageStore {
    state: RwLock<UsageState>,
    retention: Option<usize>,
}

pub fn timestamp_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

impl UsageStore {
    /// `retention` caps how many entries are kept; `None` keeps all of them.
    pub fn new(retention: Option<usize>) -> Self {
        Self {
            state: RwLock::new(UsageState::default()),
            retention,
        }
    }

    pub async fn record_request(&self, user: &str, endpoint: &str, method: &str) {
        let entry = LogEntry {
            timestamp: timestamp_secs(),
            endpoint: endpoint.to_string(),
            user: user.to_string(),
            method: method.to_string(),
        };

        let mut guard = self.state.write().await;
        guard.entries.push_back(entry);
        guard.requests += 1;
        if let Some(max) = self.retention {
            while guard.entries.len() > max {
                guard.entries.pop_front();
            }
        }
    }

    pub async fn record_error(&self) {
        self.state.write().await.errors += 1;
    }

    /// The newest `limit` entries, oldest first.
    pub async fn recent(&self, limit: usize) -> Vec<LogEntry> {
        let guard = self.state.read().await;
        let skip = guard.entries.len().saturating_sub(limit);
        guard.entries.iter().skip(skip).cloned().collect()
    }

    pub async fn counters(&self) -> (u64, u64) {
        let guard = self.state.read().await;
        (guard.requests, guard.errors)
    }
}
