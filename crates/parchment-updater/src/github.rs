//! GitHub Releases as an update feed.
//!
//! Used when the feed is configured with [`crate::config::FeedProvider::GitHub`].
//! Only the latest-release endpoint is consumed; the release payload is
//! mapped into the same [`UpdateInfo`] the generic provider produces.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::UpdateChannel;
use crate::error::{Result, UpdateError};
use crate::feed::UpdateInfo;
use crate::version::Version;

/// GitHub API base URL.
const GITHUB_API_URL: &str = "https://api.github.com";

/// A GitHub release, reduced to the fields the updater reads.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

/// A downloadable asset attached to a release.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GitHubAsset {
    pub name: String,
    pub size: u64,
    pub browser_download_url: String,
    /// Digest populated by GitHub, in the form `sha256:<hex>`.
    #[serde(default)]
    pub digest: Option<String>,
}

impl GitHubAsset {
    fn sha256(&self) -> Option<String> {
        self.digest
            .as_deref()
            .map(|d| d.strip_prefix("sha256:").unwrap_or(d).to_string())
    }
}

/// Fetch the latest release and decide whether it is an update.
pub(crate) async fn latest_update(
    client: &reqwest::Client,
    owner: &str,
    repo: &str,
    current: &Version,
    channel: UpdateChannel,
) -> Result<Option<UpdateInfo>> {
    let url = format!("{GITHUB_API_URL}/repos/{owner}/{repo}/releases/latest");
    tracing::debug!(%url, "fetching latest release");

    let response = client
        .get(&url)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .header("X-GitHub-Api-Version", "2022-11-28")
        .send()
        .await?;

    let release = parse_response(response).await?;
    select_update(&release, current, channel, &target_triple())
}

/// Handle the HTTP response, mapping rate limits and API errors.
async fn parse_response(response: reqwest::Response) -> Result<GitHubRelease> {
    let status = response.status();

    if is_rate_limited(status, response.headers()) {
        return Err(UpdateError::RateLimited {
            retry_after: retry_after_from_reset(response.headers(), unix_now()),
        });
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(UpdateError::Feed(
            "no releases found for this repository".to_string(),
        ));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UpdateError::Network(format!(
            "GitHub API error ({status}): {body}"
        )));
    }

    let release: GitHubRelease = response.json().await?;
    Ok(release)
}

/// A 403 with an exhausted quota is GitHub's rate-limit signal.
fn is_rate_limited(status: reqwest::StatusCode, headers: &reqwest::header::HeaderMap) -> bool {
    status == reqwest::StatusCode::FORBIDDEN
        && headers
            .get("x-ratelimit-remaining")
            .is_some_and(|remaining| remaining.to_str().unwrap_or("1") == "0")
}

/// Seconds until the quota resets, from the `x-ratelimit-reset` epoch
/// header. Falls back to 60 when the header is missing or unreadable.
fn retry_after_from_reset(headers: &reqwest::header::HeaderMap, now: u64) -> u64 {
    headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(60, |reset| reset.saturating_sub(now))
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Decide whether a release is a usable update for this platform.
///
/// Pure so it can be tested without the network.
pub(crate) fn select_update(
    release: &GitHubRelease,
    current: &Version,
    channel: UpdateChannel,
    target: &str,
) -> Result<Option<UpdateInfo>> {
    if release.draft {
        tracing::debug!("skipping draft release");
        return Ok(None);
    }

    let version = Version::from_tag(&release.tag_name)
        .map_err(|_| UpdateError::InvalidVersion(release.tag_name.clone()))?;

    if !channel.includes(&version) {
        tracing::debug!(%version, channel = channel.label(), "release not in channel");
        return Ok(None);
    }

    if version <= *current {
        tracing::info!(current = %current, latest = %version, "no update available");
        return Ok(None);
    }

    let asset = release
        .assets
        .iter()
        .find(|a| a.name.contains(target))
        .ok_or_else(|| UpdateError::NoAssetFound(target.to_string()))?;

    Ok(Some(UpdateInfo {
        version,
        download_url: asset.browser_download_url.clone(),
        size: asset.size,
        sha256: asset.sha256(),
        release_date: release.published_at,
        notes: release.body.clone().unwrap_or_default(),
    }))
}

/// Target triple used to pick the release asset for this platform.
pub(crate) fn target_triple() -> String {
    let arch = std::env::consts::ARCH;
    let os = std::env::consts::OS;

    match (os, arch) {
        ("macos", "x86_64") => "x86_64-apple-darwin".to_string(),
        ("macos", "aarch64") => "aarch64-apple-darwin".to_string(),
        ("windows", "x86_64") => "x86_64-pc-windows-msvc".to_string(),
        ("windows", "aarch64") => "aarch64-pc-windows-msvc".to_string(),
        ("linux", "x86_64") => "x86_64-unknown-linux-gnu".to_string(),
        ("linux", "aarch64") => "aarch64-unknown-linux-gnu".to_string(),
        _ => format!("{arch}-{os}"),
    }
}
