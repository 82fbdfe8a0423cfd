use async_trait::async_trait;
use serde_json::Value;

/// Repository trait for the persisted office blob
///
/// The blob is opaque to storage: it is saved and loaded as a JSON document
/// and interpreted by [`crate::domain::office::OfficeSnapshot`].
#[async_trait]
pub trait OfficeRepository: Send + Sync {
    /// Load the last saved blob, if one exists
    async fn load(&self) -> Result<Option<Value>, String>;

    /// Save the blob, replacing any previous one
    async fn save(&self, blob: &Value) -> Result<(), String>;
}
