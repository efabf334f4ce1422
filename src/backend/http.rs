//! reqwest-backed JSON transport

use crate::backend::JsonTransport;
use crate::utils::config::NetworkConfig;
use crate::utils::error::{Result, VistreamError};
use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use std::time::Duration;

/// Shared HTTP client used by every backend adapter and the segment service
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport from network settings
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .gzip(true)
            .build()
            .map_err(|e| VistreamError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl JsonTransport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(VistreamError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(VistreamError::Http(format!("{} returned {}", url, status)));
        }

        Ok(response.json::<serde_json::Value>().await?)
    }
}
