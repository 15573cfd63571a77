//! HTTP delivery of update checks and downloads.
//!
//! [`UpdateDelivery`] is the seam between the orchestration in
//! [`crate::updater`] and the network. [`HttpDelivery`] is the production
//! implementation; tests substitute their own.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::config::{FeedConfig, FeedProvider, TlsPolicy, UpdateChannel};
use crate::error::{Result, UpdateError};
use crate::feed::{DownloadProgress, FeedManifest, UpdateInfo, format_bytes};
use crate::github;
use crate::version::Version;

/// User agent string for feed and download requests.
const USER_AGENT_VALUE: &str = concat!("parchment/", env!("CARGO_PKG_VERSION"));

/// Minimum interval between progress callbacks.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on the buffer pre-allocated from the server-reported
/// package size. The buffer still grows past this as bytes arrive.
const PREALLOC_LIMIT: usize = 64 * 1024 * 1024;

/// Progress callback handed to [`UpdateDelivery::download`].
pub type ProgressFn<'a> = &'a (dyn Fn(DownloadProgress) + Send + Sync);

/// Checks a feed for updates and downloads update packages.
#[async_trait]
pub trait UpdateDelivery: Send + Sync {
    /// Query the feed. Returns `Some` when a version newer than `current`
    /// is published on `channel`.
    async fn check(&self, current: &Version, channel: UpdateChannel) -> Result<Option<UpdateInfo>>;

    /// Download the update package, reporting progress as bytes arrive.
    /// The returned data is verified against the feed digest when one
    /// is available.
    async fn download(&self, info: &UpdateInfo, on_progress: ProgressFn<'_>) -> Result<Vec<u8>>;
}

/// Production [`UpdateDelivery`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpDelivery {
    client: reqwest::Client,
    feed: FeedConfig,
}

impl HttpDelivery {
    /// Build a client for the given feed.
    ///
    /// Certificate validation is relaxed only when the feed URL matches
    /// the TLS policy's trusted prefix; the exemption never leaks to any
    /// other client in the process.
    pub fn new(feed: FeedConfig, tls: &TlsPolicy, timeout: Duration) -> Result<Self> {
        let accept_invalid = tls.allows_invalid_certs(&feed.url);
        if accept_invalid {
            tracing::warn!(url = %feed.url, "certificate validation disabled for update feed");
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT_VALUE)
            .danger_accept_invalid_certs(accept_invalid)
            .build()
            .map_err(|e| UpdateError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, feed })
    }

    async fn check_generic(
        &self,
        current: &Version,
        channel: UpdateChannel,
    ) -> Result<Option<UpdateInfo>> {
        tracing::debug!(url = %self.feed.url, "fetching feed manifest");

        let response = self.client.get(&self.feed.url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(UpdateError::RateLimited {
                retry_after: retry_after_header(response.headers()),
            });
        }

        if !status.is_success() {
            return Err(UpdateError::Feed(format!(
                "feed request failed with status {status}"
            )));
        }

        let manifest: FeedManifest = response.json().await?;
        let version = Version::from_tag(&manifest.version)
            .map_err(|_| UpdateError::InvalidVersion(manifest.version.clone()))?;

        if !channel.includes(&version) {
            tracing::debug!(%version, channel = channel.label(), "feed version not in channel");
            return Ok(None);
        }

        if version <= *current {
            tracing::info!(current = %current, latest = %version, "no update available");
            return Ok(None);
        }

        Ok(Some(UpdateInfo::from_manifest(&manifest, version)))
    }
}

#[async_trait]
impl UpdateDelivery for HttpDelivery {
    async fn check(&self, current: &Version, channel: UpdateChannel) -> Result<Option<UpdateInfo>> {
        match self.feed.provider {
            FeedProvider::Generic => self.check_generic(current, channel).await,
            FeedProvider::GitHub => {
                let (owner, repo) = self.feed.repo_slug()?;
                github::latest_update(&self.client, &owner, &repo, current, channel).await
            }
        }
    }

    async fn download(&self, info: &UpdateInfo, on_progress: ProgressFn<'_>) -> Result<Vec<u8>> {
        tracing::info!(url = %info.download_url, "downloading update package");

        let mut response = self.client.get(&info.download_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Network(format!(
                "download failed with status {status}"
            )));
        }

        let total = response.content_length().unwrap_or(info.size);
        let mut data = Vec::with_capacity(prealloc_capacity(total));
        let mut tracker = ProgressTracker::new(total);

        while let Some(chunk) = response.chunk().await? {
            data.extend_from_slice(&chunk);
            tracker.update(data.len() as u64);
            if tracker.should_emit() {
                on_progress(tracker.snapshot());
            }
        }

        // Final report so handlers always see 100%.
        on_progress(tracker.snapshot());

        if let Some(ref digest) = info.sha256 {
            verify_sha256(&data, digest)?;
        } else {
            tracing::warn!("feed provided no digest, skipping verification");
        }

        tracing::info!("download complete: {}", format_bytes(data.len() as u64));
        Ok(data)
    }
}

/// Capacity to pre-allocate for a download of `total` advertised bytes.
/// The advertised size is not trusted beyond [`PREALLOC_LIMIT`].
fn prealloc_capacity(total: u64) -> usize {
    usize::try_from(total).unwrap_or(usize::MAX).min(PREALLOC_LIMIT)
}

/// Seconds to wait per the `Retry-After` header, defaulting to 60 when
/// the header is missing or unreadable.
fn retry_after_header(headers: &reqwest::header::HeaderMap) -> u64 {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(60)
}

/// Verify data against a hex-encoded SHA256 digest.
pub fn verify_sha256(data: &[u8], expected: &str) -> Result<()> {
    let expected = expected
        .trim()
        .strip_prefix("sha256:")
        .unwrap_or(expected.trim())
        .to_lowercase();
    let actual = hex::encode(Sha256::digest(data));

    if actual == expected {
        Ok(())
    } else {
        Err(UpdateError::ChecksumMismatch { expected, actual })
    }
}

/// Tracks download progress and throttles how often it is reported.
struct ProgressTracker {
    transferred: u64,
    total: u64,
    started: Instant,
    last_emit: Option<Instant>,
}

impl ProgressTracker {
    fn new(total: u64) -> Self {
        Self {
            transferred: 0,
            total,
            started: Instant::now(),
            last_emit: None,
        }
    }

    fn update(&mut self, transferred: u64) {
        self.transferred = transferred;
    }

    fn should_emit(&mut self) -> bool {
        let due = self
            .last_emit
            .is_none_or(|last| last.elapsed() >= PROGRESS_INTERVAL);
        if due {
            self.last_emit = Some(Instant::now());
        }
        due
    }

    fn snapshot(&self) -> DownloadProgress {
        let elapsed = self.started.elapsed().as_secs_f64();
        let bytes_per_second = if elapsed > 0.0 {
            (self.transferred as f64 / elapsed) as u64
        } else {
            0
        };

        DownloadProgress {
            transferred: self.transferred,
            total: self.total,
            bytes_per_second,
        }
    }
}
