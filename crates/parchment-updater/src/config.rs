//! Configuration types for the auto-updater.
//!
//! Everything here is serde-friendly so the host application can load it
//! from its settings file and hand it to [`crate::updater::setup`] at
//! startup. The feed URL is the one value with no usable default: it is
//! expected to be substituted at build or deploy time.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UpdateError};
use crate::logging::LogConfig;
use crate::version::Version;

/// Which kind of endpoint the feed URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedProvider {
    /// A plain HTTP(S) endpoint serving a JSON [`crate::feed::FeedManifest`].
    #[default]
    Generic,
    /// A GitHub repository; releases are read through the GitHub REST API.
    GitHub,
}

impl fmt::Display for FeedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic => write!(f, "generic"),
            Self::GitHub => write!(f, "github"),
        }
    }
}

/// Where the updater looks for new builds: a provider tag plus a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Provider backing the feed.
    #[serde(default)]
    pub provider: FeedProvider,
    /// Feed endpoint. For [`FeedProvider::Generic`] this is the manifest
    /// URL itself; for [`FeedProvider::GitHub`] it is the repository URL
    /// (`https://github.com/<owner>/<repo>`).
    pub url: String,
}

impl FeedConfig {
    /// A generic feed pointing at a JSON manifest URL.
    pub fn generic(url: impl Into<String>) -> Self {
        Self {
            provider: FeedProvider::Generic,
            url: url.into(),
        }
    }

    /// A GitHub releases feed for `owner/repo`.
    pub fn github(owner: &str, repo: &str) -> Self {
        Self {
            provider: FeedProvider::GitHub,
            url: format!("https://github.com/{owner}/{repo}"),
        }
    }

    /// Extract `(owner, repo)` from a GitHub repository URL.
    pub(crate) fn repo_slug(&self) -> Result<(String, String)> {
        let path = self
            .url
            .split_once("://")
            .map_or(self.url.as_str(), |(_, rest)| rest);

        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let _host = segments.next();
        match (segments.next(), segments.next()) {
            (Some(owner), Some(repo)) => Ok((owner.to_string(), repo.to_string())),
            _ => Err(UpdateError::Feed(format!(
                "GitHub feed URL must look like https://github.com/<owner>/<repo>, got {}",
                self.url
            ))),
        }
    }
}

/// Certificate-validation override for the update feed.
///
/// Certificate errors are accepted only for URLs starting with the single
/// configured prefix; every other URL keeps full validation. This replaces
/// a process-global "reject unauthorized" switch with a value that is
/// handed explicitly to the HTTP client built for the feed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TlsPolicy {
    /// URL prefix for which certificate validation failures are tolerated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_prefix: Option<String>,
}

impl TlsPolicy {
    /// Policy that tolerates certificate errors for URLs under `prefix`.
    pub fn trust_prefix(prefix: impl Into<String>) -> Self {
        Self {
            trusted_prefix: Some(prefix.into()),
        }
    }

    /// Whether a client talking to `url` may skip certificate validation.
    #[must_use]
    pub fn allows_invalid_certs(&self, url: &str) -> bool {
        self.trusted_prefix
            .as_deref()
            .is_some_and(|prefix| !prefix.is_empty() && url.starts_with(prefix))
    }
}

/// Which releases the user wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateChannel {
    /// Only stable releases.
    #[default]
    Stable,
    /// Pre-releases as well as stable releases.
    Beta,
}

impl UpdateChannel {
    /// Check if a version should be offered on this channel.
    #[must_use]
    pub fn includes(&self, version: &Version) -> bool {
        match self {
            Self::Stable => version.is_stable(),
            Self::Beta => true,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Stable => "Stable",
            Self::Beta => "Beta",
        }
    }
}

/// Top-level updater configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Update feed. Checking cannot start without one.
    pub feed: Option<FeedConfig>,

    /// Version of the running application. Hosts versioned independently
    /// of this crate must set it; when unset, this crate's own version is
    /// used as the baseline.
    pub current_version: Option<Version>,

    /// Seconds to wait after startup before the first check, so the check
    /// does not compete with application startup.
    pub startup_delay_secs: u64,

    /// Whether an available update is downloaded as part of
    /// check-and-notify.
    pub auto_download: bool,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,

    /// Release channel to follow.
    pub channel: UpdateChannel,

    /// Certificate-validation override for the feed URL.
    pub tls: TlsPolicy,

    /// Where downloaded update packages are stored. Defaults to the
    /// platform-local data directory.
    pub download_dir: Option<PathBuf>,

    /// Logging configuration applied during setup.
    pub logging: LogConfig,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            feed: None,
            current_version: None,
            startup_delay_secs: 5,
            auto_download: true,
            timeout_secs: 30,
            channel: UpdateChannel::default(),
            tls: TlsPolicy::default(),
            download_dir: None,
            logging: LogConfig::default(),
        }
    }
}

impl UpdaterConfig {
    /// Configuration with the given feed and defaults for everything else.
    #[must_use]
    pub fn with_feed(feed: FeedConfig) -> Self {
        Self {
            feed: Some(feed),
            ..Self::default()
        }
    }

    /// The version updates are compared against.
    #[must_use]
    pub fn current_version(&self) -> Version {
        self.current_version.clone().unwrap_or_else(Version::current)
    }

    /// Delay before the scheduled startup check.
    #[must_use]
    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    /// HTTP request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Directory for downloaded update packages.
    #[must_use]
    pub fn download_dir(&self) -> PathBuf {
        if let Some(dir) = &self.download_dir {
            return dir.clone();
        }
        directories::BaseDirs::new()
            .map(|dirs| dirs.data_local_dir().join("Parchment").join("updates"))
            .unwrap_or_else(|| std::env::temp_dir().join("parchment-updates"))
    }
}
