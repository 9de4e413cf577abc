use tokio::sync::RwLock;

/// Loaded model names in insertion order. Duplicates are allowed.
pub struct ModelRegistry {
    names: RwLock<Vec<String>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            names: RwLock::new(Vec::new()),
        }
    }

    pub async fn list(&self) -> Vec<String> {
        self.names.read().await.clone()
    }

    pub async fn add(&self, name: &str) {
        self.names.write().await.push(name.to_string());
    }

    /// Removes the first matching entry; false if the name is not present.
    pub async fn remove(&self, name: &str) -> bool {
        let mut guard = self.names.write().await;
        match guard.iter().position(|n| n == name) {
            Some(index) => {
                guard.remove(index);
                true
            }
            None => false,
        }
    }
}
