//! Error types for the auto-update system.

use thiserror::Error;

/// Errors that can occur while checking for or downloading updates.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UpdateError {
    /// No feed URL has been configured. Checking cannot start.
    #[error("no update feed configured")]
    NotConfigured,

    /// Failed to parse a version string.
    #[error("invalid version format: {0}")]
    InvalidVersion(String),

    /// Network request failed.
    #[error("network error: {0}")]
    Network(String),

    /// The update feed returned an unusable response.
    #[error("feed error: {0}")]
    Feed(String),

    /// No suitable release asset found for the current platform.
    #[error("no release asset found for target: {0}")]
    NoAssetFound(String),

    /// SHA256 checksum verification failed.
    #[error("checksum verification failed: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Expected SHA256 hash from the feed.
        expected: String,
        /// Actual SHA256 hash of downloaded data.
        actual: String,
    },

    /// The update server rate limited us.
    #[error("rate limited by update server, retry after {retry_after} seconds")]
    RateLimited {
        /// Seconds until the limit resets.
        retry_after: u64,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(String),

    /// Failed to parse a JSON response.
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// Updater setup could not complete.
    #[error("setup error: {0}")]
    Setup(String),
}

impl UpdateError {
    /// Returns a user-friendly message suitable for display in the host UI.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::NotConfigured => "Automatic updates are not configured.",
            Self::Network(_) => {
                "Could not reach the update server. Please check your internet connection."
            }
            Self::Feed(_) => "The update server returned an unexpected response.",
            Self::ChecksumMismatch { .. } => {
                "Security verification failed. The download may have been tampered with."
            }
            Self::NoAssetFound(_) => "No update available for your platform.",
            Self::RateLimited { .. } => "The update server is busy. Please try again later.",
            Self::InvalidVersion(_) | Self::Io(_) | Self::JsonParse(_) | Self::Setup(_) => {
                "An unexpected error occurred while checking for updates."
            }
        }
    }

    /// Returns whether this error is potentially recoverable with a retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Io(_)
        )
    }
}

impl From<reqwest::Error> for UpdateError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<std::io::Error> for UpdateError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for UpdateError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonParse(err.to_string())
    }
}

/// Result type alias for update operations.
pub type Result<T> = std::result::Result<T, UpdateError>;
