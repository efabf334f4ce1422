//! Utility module for vistream
//!
//! This module provides common utilities used throughout the library:
//! - Error handling with custom error types
//! - Configuration management
//! - The tri-state `LoadState` used to report asynchronous results
//! - Common helper functions

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::{CacheConfig, Config, GeneralConfig, InstanceConfig, NetworkConfig, SegmentsConfig};
pub use error::{Result, VistreamError};

/// Initialize the application configuration
///
/// Loads configuration from:
/// 1. Default values
/// 2. System configuration file
/// 3. User configuration file
/// 4. Environment variables
///
/// # Returns
///
/// Returns the loaded configuration or an error if loading fails
pub fn load_config() -> Result<Config> {
    Config::load()
}

/// Outcome of an asynchronous operation as seen by callers.
///
/// `Pending` is distinct from `Loaded` with an empty payload, so callers can
/// tell "still loading" apart from "finished with nothing".
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T> {
    /// Not finished yet
    Pending,

    /// Finished successfully
    Loaded(T),

    /// Finished with a failure message
    Failed(String),
}

impl<T> Default for LoadState<T> {
    fn default() -> Self {
        LoadState::Pending
    }
}

impl<T> LoadState<T> {
    /// Whether the operation has finished, successfully or not
    pub fn is_finished(&self) -> bool {
        !matches!(self, LoadState::Pending)
    }

    /// Borrow the loaded value, if any
    pub fn loaded(&self) -> Option<&T> {
        match self {
            LoadState::Loaded(value) => Some(value),
            _ => None,
        }
    }

    /// Map the loaded value
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> LoadState<U> {
        match self {
            LoadState::Pending => LoadState::Pending,
            LoadState::Loaded(value) => LoadState::Loaded(f(value)),
            LoadState::Failed(msg) => LoadState::Failed(msg),
        }
    }
}

impl<T> From<Result<T>> for LoadState<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => LoadState::Loaded(value),
            Err(e) => LoadState::Failed(e.to_string()),
        }
    }
}

/// Format a duration for display
///
/// # Arguments
///
/// * `duration` - Duration to format
///
/// # Returns
///
/// Formatted string in the format "HH:MM:SS" or "MM:SS" for durations under an hour
pub fn format_duration(duration: std::time::Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Convert seconds coming from a JSON API into a `Duration`.
///
/// Negative and non-finite values collapse to zero.
pub fn duration_from_secs(secs: f64) -> std::time::Duration {
    if secs.is_finite() && secs > 0.0 {
        std::time::Duration::from_secs_f64(secs)
    } else {
        std::time::Duration::ZERO
    }
}
