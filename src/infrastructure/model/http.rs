//! Remote model source over HTTP

use async_trait::async_trait;
use tracing::debug;

use crate::application::ports::{ModelSource, ModelSourceError};

/// Loads weights from a base URL, used as the fallback source.
pub struct HttpModelSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpModelSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ModelSource for HttpModelSource {
    fn location(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>, ModelSourceError> {
        let url = self.url_for(path);
        debug!(url = %url, "Fetching model file");

        let fetch_failed = |message: String| ModelSourceError::Fetch {
            path: url.clone(),
            message,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failed(format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;
        Ok(body.to_vec())
    }
}
