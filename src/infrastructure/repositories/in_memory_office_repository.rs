use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::domain::repositories::OfficeRepository;

/// In-memory OfficeRepository, used without a database and in tests
#[derive(Default)]
pub struct InMemoryOfficeRepository {
    blob: RwLock<Option<Value>>,
    saves: RwLock<usize>,
}

impl InMemoryOfficeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with a previously saved blob
    pub fn with_blob(blob: Value) -> Self {
        Self {
            blob: RwLock::new(Some(blob)),
            saves: RwLock::new(0),
        }
    }

    /// Number of saves since creation
    pub async fn save_count(&self) -> usize {
        *self.saves.read().await
    }
}

#[async_trait]
impl OfficeRepository for InMemoryOfficeRepository {
    async fn load(&self) -> Result<Option<Value>, String> {
        Ok(self.blob.read().await.clone())
    }

    async fn save(&self, blob: &Value) -> Result<(), String> {
        *self.blob.write().await = Some(blob.clone());
        *self.saves.write().await += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn save_then_load() {
        let repo = InMemoryOfficeRepository::new();
        assert_eq!(repo.load().await.unwrap(), None);

        repo.save(&json!({ "version": "1.0.0" })).await.unwrap();

        assert_eq!(repo.load().await.unwrap(), Some(json!({ "version": "1.0.0" })));
        assert_eq!(repo.save_count().await, 1);
    }
}
