//! HTTP(S) transport

use super::Content;
use crate::error::ProviderError;
use crate::provider::ProviderResult;
use crate::resource::{unsupported, Resource, ResourceProvider};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Fetches `http:` and `https:` URLs as a single file
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a custom user agent and request timeout
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        Self {
            client: build_client(user_agent, timeout),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

pub(crate) fn build_client(user_agent: &str, timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// GET `url`, mapping 404 to [`ProviderError::NotFound`] and requiring a body
pub(crate) async fn fetch(client: &reqwest::Client, url: &Url) -> ProviderResult<Vec<u8>> {
    debug!(url = %url, "fetching");
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| ProviderError::failed_with(format!("Failed to fetch {}", url), e))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound(format!("Resource not found: {}", url)));
    }
    if !status.is_success() {
        return Err(ProviderError::failed(format!(
            "Failed to fetch {}: HTTP {}",
            url, status
        )));
    }
    if status == StatusCode::NO_CONTENT {
        return Err(ProviderError::failed(format!(
            "Failed to fetch {}: the response has no content",
            url
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ProviderError::failed_with(format!("Failed to read response from {}", url), e))?;
    Ok(bytes.to_vec())
}

#[async_trait]
impl ResourceProvider<Content> for HttpTransport {
    fn supports(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
    }

    async fn get(&self, url: &Url) -> ProviderResult<Resource<Content>> {
        if !self.supports(url) {
            return Err(unsupported(url));
        }
        let bytes = fetch(&self.client, url).await?;
        Ok(Resource::new(url.clone(), Content::File(bytes)))
    }
}
