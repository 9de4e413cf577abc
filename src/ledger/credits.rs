use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Outcome of a metered call's credit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditCheck {
    Consumed { remaining: i64 },
    UnknownUser,
    Exhausted,
}

/// Per-identity credit balances guarded by one lock.
pub struct CreditsStore {
    balances: RwLock<HashMap<String, i64>>,
}

impl CreditsStore {
    pub fn new<I>(seed: I) -> Self
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        Self {
            balances: RwLock::new(seed.into_iter().collect()),
        }
    }

    /// Check and decrement under a single write guard, so two callers racing
    /// for the last credit cannot both win.
    pub async fn try_consume(&self, user: &str) -> CreditCheck {
        let mut guard = self.balances.write().await;
        match guard.get_mut(user) {
            None => CreditCheck::UnknownUser,
            Some(balance) if *balance <= 0 => CreditCheck::Exhausted,
            Some(balance) => {
                *balance -= 1;
                CreditCheck::Consumed {
                    remaining: *balance,
                }
            }
        }
    }

    pub async fn balance(&self, user: &str) -> Option<i64> {
        self.balances.read().await.get(user).copied()
    }

    /// Creates the account at zero if needed. Returns the new balance.
    pub async fn add(&self, user: &str, delta: i64) -> i64 {
        let mut guard = self.balances.write().await;
        let balance = guard.entry(user.to_string()).or_insert(0);
        *balance = balance.saturating_add(delta);
        *balance
    }

    /// Overwrite every known balance. Returns how many accounts were touched.
    pub async fn reset_all(&self, value: i64) -> usize {
        let mut guard = self.balances.write().await;
        for balance in guard.values_mut() {
            *balance = value;
        }
        guard.len()
    }

    pub async fn snapshot(&self) -> BTreeMap<String, i64> {
        self.balances
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}
