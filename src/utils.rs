use crate::config::HttpConfig;
use crate::error::{MangaBindError, Result};
use crate::traits::Fetcher;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

const DEFAULT_USER_AGENT: &str = "MangaBind/1.0";

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(extra) = &config.headers {
            for (key, value) in extra {
                let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                    MangaBindError::config(format!("header '{}': {}", key, e))
                })?;
                let value = HeaderValue::from_str(value).map_err(|e| {
                    MangaBindError::config(format!("header '{}': {}", key, e))
                })?;
                headers.insert(name, value);
            }
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    pub async fn get_raw(&self, url: &str) -> Result<Response> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response)
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpClient {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let text = self.get_raw(url).await?.text().await?;
        Ok(text)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self.get_raw(url).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
