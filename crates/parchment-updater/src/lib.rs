//! Auto-update system for the Parchment desktop editor.
//!
//! This crate checks an update feed for new builds, downloads them with
//! progress reporting, verifies them with SHA256, and notifies the host
//! application through lifecycle events.
//!
//! # Overview
//!
//! The update source is configurable: a generic HTTPS endpoint serving a
//! JSON manifest, or a GitHub repository read through the Releases API.
//! The crate supports:
//!
//! - Semantic versioning with pre-release tags
//! - Configurable update channels (stable, beta)
//! - Lifecycle events mirroring the usual desktop-updater flow:
//!   `checking-for-update`, `update-available`, `update-not-available`,
//!   `error`, `download-progress`, `update-downloaded`
//! - A delayed one-shot update check at application startup
//! - A per-feed certificate-validation override, scoped to a single URL
//!   prefix instead of a process-global switch
//!
//! # Architecture
//!
//! [`setup`] is the one-call entry point for hosts: it initializes
//! logging, wires log-only handlers for every lifecycle event, and
//! schedules the startup check. Nothing it does can crash the host; on
//! failure it logs and returns `None`.
//!
//! Hosts that want their own event handling build an [`AutoUpdater`]
//! directly, register handlers, and drive
//! [`AutoUpdater::check_for_updates_and_notify`] themselves. The network
//! side sits behind the [`UpdateDelivery`] trait so it can be substituted
//! in tests.
//!
//! # Example
//!
//! ```no_run
//! use parchment_updater::{AutoUpdater, FeedConfig, UpdaterConfig, Version};
//!
//! async fn check_updates() -> parchment_updater::Result<()> {
//!     let config = UpdaterConfig::with_feed(FeedConfig::generic(
//!         "https://updates.example.com/stable/latest.json",
//!     ));
//!
//!     let mut updater = AutoUpdater::new(Version::current(), config)?;
//!     updater.on_update_downloaded(|info| {
//!         println!("update {} downloaded, restart to install", info.version);
//!     });
//!
//!     if let Some(info) = updater.check_for_updates_and_notify().await? {
//!         println!("update available: {}", info.version);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod error;
pub mod feed;
pub mod version;

// Networking
pub mod client;
pub mod github;

// Orchestration and observability
pub mod events;
pub mod logging;
pub mod updater;

// Re-export main types for convenience
pub use client::{HttpDelivery, ProgressFn, UpdateDelivery, verify_sha256};
pub use config::{FeedConfig, FeedProvider, TlsPolicy, UpdateChannel, UpdaterConfig};
pub use error::{Result, UpdateError};
pub use events::{EventKind, UpdateEvent};
pub use feed::{DownloadProgress, FeedManifest, UpdateInfo, format_bytes, format_speed};
pub use logging::{LogConfig, LogFormat};
pub use updater::{AutoUpdater, setup};
pub use version::Version;

/// Current version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
