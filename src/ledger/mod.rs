//! In-memory usage ledger: credits, request log, counters and the model registry.
//!
//! State lives for the process lifetime only. Handlers reach it through
//! `AppState`, never through globals.

pub mod credits;
pub mod models;
pub mod usage;

use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use credits::CreditsStore;
use models::ModelRegistry;
use usage::UsageStore;

pub use credits::CreditCheck;
pub use usage::LogEntry;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UsageMetrics {
    pub requests: u64,
    pub errors: u64,
    pub models_loaded: Vec<String>,
}

pub struct Ledger {
    credits: CreditsStore,
    models: ModelRegistry,
    usage: UsageStore,
}

impl Ledger {
    pub fn new<I>(seed_credits: I, log_retention: Option<usize>) -> Self
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        Self {
            credits: CreditsStore::new(seed_credits),
            models: ModelRegistry::new(),
            usage: UsageStore::new(log_retention),
        }
    }

    pub async fn record_request(&self, user: &str, endpoint: &str, method: &str) {
        self.usage.record_request(user, endpoint, method).await;
    }

    pub async fn record_error(&self) {
        self.usage.record_error().await;
    }

    pub async fn try_consume_credit(&self, user: &str) -> CreditCheck {
        self.credits.try_consume(user).await
    }

    pub async fn balance(&self, user: &str) -> Option<i64> {
        self.credits.balance(user).await
    }

    pub async fn add_credits(&self, user: &str, delta: i64) -> i64 {
        self.credits.add(user, delta).await
    }

    pub async fn reset_all(&self, value: i64) -> usize {
        self.credits.reset_all(value).await
    }

    pub async fn balances(&self) -> BTreeMap<String, i64> {
        self.credits.snapshot().await
    }

    pub async fn list_models(&self) -> Vec<String> {
        self.models.list().await
    }

    pub async fn add_model(&self, name: &str) {
        self.models.add(name).await;
    }

    pub async fn remove_model(&self, name: &str) -> bool {
        self.models.remove(name).await
    }

    pub async fn recent_logs(&self, limit: usize) -> Vec<LogEntry> {
        self.usage.recent(limit).await
    }

    pub async fn snapshot_metrics(&self) -> UsageMetrics {
        let (requests, errors) = self.usage.counters().await;
        UsageMetrics {
            requests,
            errors,
            models_loaded: self.models.list().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn seeded() -> Ledger {
        Ledger::new(
            [("user1".to_string(), 100), ("user2".to_string(), 200)],
            None,
        )
    }

    #[tokio::test]
    async fn test_consume_decrements_until_exhausted() {
        let ledger = Ledger::new([("solo".to_string(), 2)], None);
        assert_eq!(
            ledger.try_consume_credit("solo").await,
            CreditCheck::Consumed { remaining: 1 }
        );
        assert_eq!(
            ledger.try_consume_credit("solo").await,
            CreditCheck::Consumed { remaining: 0 }
        );
        assert_eq!(ledger.try_consume_credit("solo").await, CreditCheck::Exhausted);
        assert_eq!(ledger.balance("solo").await, Some(0));
        assert_eq!(
            ledger.try_consume_credit("ghost").await,
            CreditCheck::UnknownUser
        );
        assert_eq!(ledger.balance("ghost").await, None);
    }

    #[tokio::test]
    async fn test_negative_balance_is_not_consumable() {
        let ledger = Ledger::new([("debtor".to_string(), 1)], None);
        ledger.add_credits("debtor", -3).await;
        assert_eq!(ledger.try_consume_credit("debtor").await, CreditCheck::Exhausted);
        assert_eq!(ledger.balance("debtor").await, Some(-2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consumers_single_credit() {
        let ledger = Arc::new(Ledger::new([("last".to_string(), 1)], None));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.try_consume_credit("last").await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), CreditCheck::Consumed { .. }) {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(ledger.balance("last").await, Some(0));
    }

    #[tokio::test]
    async fn test_add_credits_round_trip() {
        let ledger = seeded();
        for delta in [5, 0, -7, 42] {
            let before = ledger.balance("user1").await.unwrap();
            let after = ledger.add_credits("user1", delta).await;
            assert_eq!(after, before + delta);
            assert_eq!(ledger.balance("user1").await, Some(before + delta));
        }

        assert_eq!(ledger.add_credits("newcomer", 10).await, 10);
        assert_eq!(ledger.balance("newcomer").await, Some(10));
    }

    #[tokio::test]
    async fn test_reset_all_touches_only_known_users() {
        let ledger = seeded();
        ledger.add_credits("user3", 1).await;
        ledger.try_consume_credit("user1").await;

        assert_eq!(ledger.reset_all(50).await, 3);
        let balances = ledger.balances().await;
        assert_eq!(balances.len(), 3);
        assert!(balances.values().all(|&b| b == 50));
        assert_eq!(ledger.balance("user4").await, None);
    }

    #[tokio::test]
    async fn test_recent_logs_bounded_and_ordered() {
        let ledger = seeded();
        for i in 0..150 {
            ledger
                .record_request("user1", &format!("/api/call/{i}"), "GET")
                .await;
        }

        let logs = ledger.recent_logs(100).await;
        assert_eq!(logs.len(), 100);
        assert_eq!(logs[0].endpoint, "/api/call/50");
        assert_eq!(logs[99].endpoint, "/api/call/149");
        assert!(logs.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        let metrics = ledger.snapshot_metrics().await;
        assert_eq!(metrics.requests, 150);
        assert_eq!(metrics.errors, 0);
    }

    #[tokio::test]
    async fn test_log_retention_cap() {
        let ledger = Ledger::new(Vec::<(String, i64)>::new(), Some(10));
        for i in 0..25 {
            ledger.record_request("anonymous", &format!("/{i}"), "GET").await;
        }
        let logs = ledger.recent_logs(100).await;
        assert_eq!(logs.len(), 10);
        assert_eq!(logs[0].endpoint, "/15");
        // Counter still reflects every request
        assert_eq!(ledger.snapshot_metrics().await.requests, 25);
    }

    #[tokio::test]
    async fn test_model_registry_duplicates_and_removal() {
        let ledger = seeded();
        ledger.add_model("llama").await;
        ledger.add_model("mistral").await;
        ledger.add_model("llama").await;
        assert_eq!(ledger.list_models().await, vec!["llama", "mistral", "llama"]);

        assert!(ledger.remove_model("llama").await);
        assert_eq!(ledger.list_models().await, vec!["mistral", "llama"]);
        assert!(!ledger.remove_model("phi").await);

        ledger.record_error().await;
        let metrics = ledger.snapshot_metrics().await;
        assert_eq!(metrics.errors, 1);
        assert_eq!(metrics.models_loaded, vec!["mistral", "llama"]);
    }
}
