//! Error types for vistream
//!
//! This module defines the error type used throughout the library.
//! We use thiserror for convenient error type definitions and anyhow for
//! application-level error handling in the binary.

use thiserror::Error;

/// Main error type for vistream
#[derive(Error, Debug)]
pub enum VistreamError {
    /// A backend instance failed to answer or answered with garbage
    #[error("Backend error ({instance}): {message}")]
    Backend {
        /// Instance identifier
        instance: String,
        /// What went wrong
        message: String,
    },

    /// Transport level errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response parsing errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Asset/track loading errors
    #[error("Asset error: {0}")]
    Asset(String),

    /// Renderer errors
    #[error("Renderer error: {0}")]
    Renderer(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistent cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// File I/O errors
    #[error("File error: {0}")]
    FileIO(#[from] std::io::Error),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Generic error for unexpected situations
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for VistreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            VistreamError::Parse(format!("Response body: {}", err))
        } else {
            VistreamError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for VistreamError {
    fn from(err: serde_json::Error) -> Self {
        VistreamError::Parse(format!("JSON: {}", err))
    }
}

impl VistreamError {
    /// Create a backend error for the given instance
    pub fn backend<I: Into<String>, S: Into<String>>(instance: I, msg: S) -> Self {
        VistreamError::Backend {
            instance: instance.into(),
            message: msg.into(),
        }
    }
}

/// Convenience type alias for Results in vistream
pub type Result<T> = std::result::Result<T, VistreamError>;

/// Extension trait for converting other errors to VistreamError
pub trait IntoVistreamError<T> {
    /// Attribute this error to a backend instance
    fn backend_err(self, instance: &str) -> Result<T>;

    /// Convert this error into a VistreamError with the given context
    fn parse_err(self, context: &str) -> Result<T>;
    fn asset_err(self, context: &str) -> Result<T>;
    fn renderer_err(self, context: &str) -> Result<T>;
    fn config_err(self, context: &str) -> Result<T>;
    fn cache_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoVistreamError<T> for std::result::Result<T, E> {
    fn backend_err(self, instance: &str) -> Result<T> {
        self.map_err(|e| VistreamError::backend(instance, e.to_string()))
    }

    fn parse_err(self, context: &str) -> Result<T> {
        self.map_err(|e| VistreamError::Parse(format!("{}: {}", context, e)))
    }

    fn asset_err(self, context: &str) -> Result<T> {
        self.map_err(|e| VistreamError::Asset(format!("{}: {}", context, e)))
    }

    fn renderer_err(self, context: &str) -> Result<T> {
        self.map_err(|e| VistreamError::Renderer(format!("{}: {}", context, e)))
    }

    fn config_err(self, context: &str) -> Result<T> {
        self.map_err(|e| VistreamError::Config(format!("{}: {}", context, e)))
    }

    fn cache_err(self, context: &str) -> Result<T> {
        self.map_err(|e| VistreamError::Cache(format!("{}: {}", context, e)))
    }
}
