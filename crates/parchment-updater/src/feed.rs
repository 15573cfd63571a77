//! Data produced by the update feed.
//!
//! These records are owned by the update server; this crate only reads
//! them to decide whether an update exists and to report progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::version::Version;

/// The JSON document a generic feed URL serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedManifest {
    /// Version of the published build (e.g. "1.4.0" or "v1.4.0-beta.1").
    pub version: String,

    /// When the build was published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<DateTime<Utc>>,

    /// Absolute download URL of the update package.
    pub url: String,

    /// Package size in bytes, if the server knows it.
    #[serde(default)]
    pub size: u64,

    /// Hex-encoded SHA256 digest of the package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    /// Release notes.
    #[serde(default)]
    pub notes: String,
}

/// Information about an available update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateInfo {
    /// The new version.
    pub version: Version,

    /// Download URL of the update package.
    pub download_url: String,

    /// Package size in bytes (0 when unknown).
    pub size: u64,

    /// Hex-encoded SHA256 digest, when the feed provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    /// Publication date, when the feed provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<DateTime<Utc>>,

    /// Release notes / changelog.
    #[serde(default)]
    pub notes: String,
}

impl UpdateInfo {
    /// Build update info from a generic feed manifest and its parsed version.
    #[must_use]
    pub(crate) fn from_manifest(manifest: &FeedManifest, version: Version) -> Self {
        Self {
            version,
            download_url: manifest.url.clone(),
            size: manifest.size,
            sha256: manifest.sha256.clone(),
            release_date: manifest.pub_date,
            notes: manifest.notes.clone(),
        }
    }
}

/// Download progress, read here only for logging and event handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Bytes downloaded so far.
    pub transferred: u64,
    /// Total bytes to download (0 when unknown).
    pub total: u64,
    /// Current download speed in bytes per second.
    pub bytes_per_second: u64,
}

impl DownloadProgress {
    /// Progress as a fraction between 0.0 and 1.0.
    #[must_use]
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        (self.transferred as f64 / self.total as f64) as f32
    }

    /// Progress as a percentage between 0 and 100.
    #[must_use]
    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).min(100.0) as u8
    }
}

/// Format a byte count as a human-readable string.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Format a transfer speed as a human-readable string.
#[must_use]
pub fn format_speed(bytes_per_sec: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}
