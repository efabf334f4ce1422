//! Backend instance providers for vistream
//!
//! Two video-index APIs are supported: an Invidious-style API and a
//! Piped-style API. Each configured instance becomes one [`VideoBackend`]
//! that normalizes its provider's JSON into the common [`Stream`] and
//! [`Video`] shapes. Raw HTTP goes through a [`JsonTransport`] so adapters
//! can be exercised without a network.

mod http;
mod invidious;
mod piped;

pub use http::HttpTransport;
pub use invidious::InvidiousBackend;
pub use piped::PipedBackend;

use crate::media::Video;
use crate::stream::Stream;
use crate::utils::config::InstanceConfig;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;

/// Supported backend APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Invidious,
    Piped,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Invidious => f.write_str("Invidious"),
            BackendKind::Piped => f.write_str("Piped"),
        }
    }
}

/// Reference to a configured instance, carried by the streams it produced
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceRef {
    /// Stable identifier from the configuration
    pub id: String,

    /// Display name
    pub name: String,

    /// API flavour
    pub backend: BackendKind,

    /// Base URL of the API
    pub url: String,
}

impl From<&InstanceConfig> for InstanceRef {
    fn from(config: &InstanceConfig) -> Self {
        Self {
            id: config.id.clone(),
            name: config.display_name().to_string(),
            backend: config.backend,
            url: config.url.trim_end_matches('/').to_string(),
        }
    }
}

/// A backend instance able to resolve videos
///
/// Implementations must tolerate concurrent calls for different videos.
#[async_trait]
pub trait VideoBackend: Send + Sync {
    /// Instance this backend talks to
    fn instance(&self) -> &InstanceRef;

    /// Fetch playable candidates for a video
    ///
    /// # Arguments
    ///
    /// * `video_id` - Backend video identifier
    ///
    /// # Returns
    ///
    /// Zero or more normalized streams, or an error for this instance only
    async fn fetch_candidate_streams(&self, video_id: &str) -> Result<Vec<Stream>>;

    /// Fetch full metadata for a video, streams included
    async fn fetch_video(&self, video_id: &str) -> Result<Video>;
}

/// Minimal JSON-over-HTTP transport
#[async_trait]
pub trait JsonTransport: Send + Sync {
    /// GET a URL and decode the body as JSON
    ///
    /// A 404 must surface as `VistreamError::NotFound`.
    async fn get_json(&self, url: &str) -> Result<serde_json::Value>;
}

/// Build the backend for a configured instance
pub fn from_config(config: &InstanceConfig, transport: Arc<dyn JsonTransport>) -> Arc<dyn VideoBackend> {
    let instance = InstanceRef::from(config);
    match config.backend {
        BackendKind::Invidious => Arc::new(InvidiousBackend::new(instance, transport)),
        BackendKind::Piped => Arc::new(PipedBackend::new(instance, transport)),
    }
}

/// Build backends for every enabled instance, in configuration order
pub fn from_instances(instances: &[InstanceConfig], transport: Arc<dyn JsonTransport>) -> Vec<Arc<dyn VideoBackend>> {
    instances
        .iter()
        .filter(|instance| instance.enabled)
        .map(|instance| from_config(instance, Arc::clone(&transport)))
        .collect()
}

/// Resolve a possibly relative URL (`/path`, `//host/path`) against an instance
pub(crate) fn absolute_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else if url.starts_with('/') {
        format!("{}{}", base.trim_end_matches('/'), url)
    } else {
        format!("{}/{}", base.trim_end_matches('/'), url)
    }
}

/// Accept numbers encoded either as JSON numbers or strings ("128000")
pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(NumberOrString::Number(n)) if n.is_finite() && n >= 0.0 => Some(n as u64),
        Some(NumberOrString::Text(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
