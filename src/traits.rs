use crate::error::Result;

/// Retrieves remote resources for the pipeline
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url` and return the body as text
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// GET `url` and return the raw body
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}
