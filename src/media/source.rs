use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Human-readable name of the source, used in logs
    fn name(&self) -> &str;

    /// Fetch the raw metadata document of a post
    async fn fetch_status(&self, post_id: &str) -> Result<Value>;
}
