//! Update orchestration: event wiring, the combined check-and-notify
//! operation, and the delayed startup check.
//!
//! Nothing in this module is allowed to take the host process down. Setup
//! failures are logged and swallowed by [`setup`]; a failing scheduled
//! check is logged and dropped without retry.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::client::{HttpDelivery, UpdateDelivery};
use crate::config::UpdaterConfig;
use crate::error::{Result, UpdateError};
use crate::events::{EventKind, Handlers, UpdateEvent};
use crate::feed::{DownloadProgress, UpdateInfo, format_speed};
use crate::logging;
use crate::version::Version;

/// Orchestrates update checks over an [`UpdateDelivery`] backend.
///
/// Handlers are registered before the updater is shared; once wrapped in
/// an [`Arc`] the updater is immutable and can be checked from any task.
pub struct AutoUpdater<D> {
    current_version: Version,
    config: UpdaterConfig,
    delivery: D,
    handlers: Handlers,
}

impl AutoUpdater<HttpDelivery> {
    /// Build an updater talking to the configured feed.
    ///
    /// Fails with [`UpdateError::NotConfigured`] when no feed is set; a
    /// check cannot start without one.
    pub fn new(current_version: Version, config: UpdaterConfig) -> Result<Self> {
        let feed = config.feed.clone().ok_or(UpdateError::NotConfigured)?;
        tracing::info!(provider = %feed.provider, url = %feed.url, "update feed configured");

        let delivery = HttpDelivery::new(feed, &config.tls, config.timeout())?;
        Ok(Self::with_delivery(current_version, config, delivery))
    }
}

impl<D: UpdateDelivery + 'static> AutoUpdater<D> {
    /// Build an updater over a custom delivery backend.
    pub fn with_delivery(current_version: Version, config: UpdaterConfig, delivery: D) -> Self {
        Self {
            current_version,
            config,
            delivery,
            handlers: Handlers::default(),
        }
    }

    /// The version this updater considers currently running.
    #[must_use]
    pub fn current_version(&self) -> &Version {
        &self.current_version
    }

    /// Register a handler for the start of a check.
    pub fn on_checking_for_update(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.handlers
            .subscribe(EventKind::CheckingForUpdate, Box::new(move |_| f()));
    }

    /// Register a handler for a newly published version.
    pub fn on_update_available(&mut self, f: impl Fn(&UpdateInfo) + Send + Sync + 'static) {
        self.handlers
            .subscribe(EventKind::UpdateAvailable, Box::new(move |event| {
                if let UpdateEvent::UpdateAvailable(info) = event {
                    f(info);
                }
            }));
    }

    /// Register a handler for the no-update outcome.
    pub fn on_update_not_available(&mut self, f: impl Fn(&Version) + Send + Sync + 'static) {
        self.handlers
            .subscribe(EventKind::UpdateNotAvailable, Box::new(move |event| {
                if let UpdateEvent::UpdateNotAvailable { current } = event {
                    f(current);
                }
            }));
    }

    /// Register a handler for check or download failures.
    pub fn on_error(&mut self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.handlers.subscribe(EventKind::Error, Box::new(move |event| {
            if let UpdateEvent::Error(message) = event {
                f(message);
            }
        }));
    }

    /// Register a handler for download progress.
    pub fn on_download_progress(
        &mut self,
        f: impl Fn(&DownloadProgress) + Send + Sync + 'static,
    ) {
        self.handlers
            .subscribe(EventKind::DownloadProgress, Box::new(move |event| {
                if let UpdateEvent::DownloadProgress(progress) = event {
                    f(progress);
                }
            }));
    }

    /// Register a handler for a completed download.
    pub fn on_update_downloaded(&mut self, f: impl Fn(&UpdateInfo) + Send + Sync + 'static) {
        self.handlers
            .subscribe(EventKind::UpdateDownloaded, Box::new(move |event| {
                if let UpdateEvent::UpdateDownloaded(info) = event {
                    f(info);
                }
            }));
    }

    /// Register log-only handlers for every lifecycle notification.
    ///
    /// These are the default subscribers installed by [`setup`]; hosts
    /// that wire their own handlers can skip this.
    pub fn log_lifecycle_events(&mut self) {
        self.on_checking_for_update(|| tracing::info!("checking for updates..."));
        self.on_update_available(|info| {
            tracing::info!(version = %info.version, "update available");
        });
        self.on_update_not_available(|current| {
            tracing::info!(version = %current, "update not available, current version is latest");
        });
        self.on_error(|message| tracing::error!("auto updater error: {message}"));
        self.on_download_progress(|progress| {
            tracing::info!(
                "download speed: {} - downloaded {}% ({}/{})",
                format_speed(progress.bytes_per_second),
                progress.percent(),
                progress.transferred,
                progress.total
            );
        });
        self.on_update_downloaded(|info| {
            tracing::info!(version = %info.version, "update downloaded, ready to install");
        });
    }

    /// Check the feed and notify subscribers of the outcome.
    ///
    /// Emits `checking-for-update`, then either `update-not-available` or
    /// `update-available`. When auto-download is enabled an available
    /// update is downloaded with `download-progress` events, stored in
    /// the download directory, and finished with `update-downloaded`.
    /// Every failure is logged, emitted as an `error` event, and returned.
    pub async fn check_for_updates_and_notify(&self) -> Result<Option<UpdateInfo>> {
        self.handlers.emit(&UpdateEvent::CheckingForUpdate);

        let checked = self
            .delivery
            .check(&self.current_version, self.config.channel)
            .await;
        let info = match checked {
            Ok(info) => info,
            Err(err) => return Err(self.report(err, "update check failed")),
        };

        let Some(info) = info else {
            self.handlers.emit(&UpdateEvent::UpdateNotAvailable {
                current: self.current_version.clone(),
            });
            return Ok(None);
        };

        self.handlers.emit(&UpdateEvent::UpdateAvailable(info.clone()));

        if !self.config.auto_download {
            return Ok(Some(info));
        }

        let handlers = &self.handlers;
        let downloaded = self
            .delivery
            .download(&info, &|progress| {
                handlers.emit(&UpdateEvent::DownloadProgress(progress));
            })
            .await;
        let data = match downloaded {
            Ok(data) => data,
            Err(err) => return Err(self.report(err, "update download failed")),
        };

        match self.persist_download(&info, &data).await {
            Ok(path) => {
                tracing::info!(version = %info.version, path = %path.display(), "stored update package");
            }
            Err(err) => return Err(self.report(err, "failed to store update package")),
        }

        self.handlers.emit(&UpdateEvent::UpdateDownloaded(info.clone()));
        Ok(Some(info))
    }

    /// Run the check once after the configured startup delay.
    ///
    /// One-shot: no retry and no re-arm. The check's error is caught and
    /// logged here so it can never tear down the host. Must be called
    /// from within a tokio runtime.
    pub fn schedule_startup_check(self: &Arc<Self>) -> JoinHandle<()> {
        let updater = Arc::clone(self);
        let delay = updater.config.startup_delay();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::info!("starting scheduled update check");
            if let Err(err) = updater.check_for_updates_and_notify().await {
                tracing::error!(error = %err, "scheduled update check failed");
            }
        })
    }

    /// Log a failure and notify error subscribers.
    fn report(&self, err: UpdateError, context: &str) -> UpdateError {
        tracing::error!(error = %err, "{context}");
        self.handlers
            .emit(&UpdateEvent::Error(err.user_message().to_string()));
        err
    }

    /// Write the downloaded package into the download directory.
    async fn persist_download(&self, info: &UpdateInfo, data: &[u8]) -> Result<PathBuf> {
        let dir = self.config.download_dir();
        tokio::fs::create_dir_all(&dir).await?;

        let name = info
            .download_url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("parchment-{}.update", info.version));

        let path = dir.join(name);
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }
}

/// Wire up the auto-updater for the host application.
///
/// Initializes logging, builds the updater with log-only handlers for all
/// lifecycle notifications, and schedules the delayed startup check. Any
/// failure during setup is logged and swallowed: the host keeps running
/// without update checks and this returns `None`.
pub fn setup(config: UpdaterConfig) -> Option<Arc<AutoUpdater<HttpDelivery>>> {
    logging::init(&config.logging);

    match try_setup(config) {
        Ok(updater) => Some(updater),
        Err(err) => {
            tracing::error!(
                error = %err,
                "auto-updater setup failed, continuing without update checks"
            );
            None
        }
    }
}

fn try_setup(config: UpdaterConfig) -> Result<Arc<AutoUpdater<HttpDelivery>>> {
    // Scheduling needs a runtime; surface its absence as a setup error
    // instead of panicking inside spawn.
    tokio::runtime::Handle::try_current().map_err(|err| UpdateError::Setup(err.to_string()))?;

    let current_version = config.current_version();
    let mut updater = AutoUpdater::new(current_version, config)?;
    updater.log_lifecycle_events();

    let updater = Arc::new(updater);
    updater.schedule_startup_check();
    Ok(updater)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::client::ProgressFn;
    use crate::config::{FeedConfig, UpdateChannel};

    /// Delivery backend returning scripted check results.
    #[derive(Default)]
    struct ScriptedDelivery {
        checks: AtomicUsize,
        results: Mutex<VecDeque<Result<Option<UpdateInfo>>>>,
    }

    impl ScriptedDelivery {
        fn returning(result: Result<Option<UpdateInfo>>) -> Self {
            let delivery = Self::default();
            delivery.results.lock().unwrap().push_back(result);
            delivery
        }

        fn checks(&self) -> usize {
            self.checks.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UpdateDelivery for ScriptedDelivery {
        async fn check(
            &self,
            _current: &Version,
            _channel: UpdateChannel,
        ) -> Result<Option<UpdateInfo>> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(None))
        }

        async fn download(
            &self,
            _info: &UpdateInfo,
            on_progress: ProgressFn<'_>,
        ) -> Result<Vec<u8>> {
            on_progress(DownloadProgress {
                transferred: 512,
                total: 1024,
                bytes_per_second: 256,
            });
            on_progress(DownloadProgress {
                transferred: 1024,
                total: 1024,
                bytes_per_second: 256,
            });
            Ok(b"update package".to_vec())
        }
    }

    fn sample_info() -> UpdateInfo {
        UpdateInfo {
            version: Version::new(1, 3, 0),
            download_url: "https://updates.parchment.dev/parchment-1.3.0.tar.gz".to_string(),
            size: 1024,
            sha256: None,
            release_date: None,
            notes: String::new(),
        }
    }

    fn test_config(download_dir: &std::path::Path) -> UpdaterConfig {
        UpdaterConfig {
            download_dir: Some(download_dir.to_path_buf()),
            ..UpdaterConfig::default()
        }
    }

    /// Record the kind of every emitted event.
    fn record_events(
        updater: &mut AutoUpdater<ScriptedDelivery>,
    ) -> Arc<Mutex<Vec<EventKind>>> {
        let log = Arc::new(Mutex::new(Vec::new()));

        let events = Arc::clone(&log);
        updater.on_checking_for_update(move || {
            events.lock().unwrap().push(EventKind::CheckingForUpdate);
        });
        let events = Arc::clone(&log);
        updater.on_update_available(move |_| {
            events.lock().unwrap().push(EventKind::UpdateAvailable);
        });
        let events = Arc::clone(&log);
        updater.on_update_not_available(move |_| {
            events.lock().unwrap().push(EventKind::UpdateNotAvailable);
        });
        let events = Arc::clone(&log);
        updater.on_error(move |_| {
            events.lock().unwrap().push(EventKind::Error);
        });
        let events = Arc::clone(&log);
        updater.on_download_progress(move |_| {
            events.lock().unwrap().push(EventKind::DownloadProgress);
        });
        let events = Arc::clone(&log);
        updater.on_update_downloaded(move |_| {
            events.lock().unwrap().push(EventKind::UpdateDownloaded);
        });

        log
    }

    #[tokio::test]
    async fn test_available_update_is_downloaded_and_notified() {
        let dir = tempfile::tempdir().unwrap();
        let delivery = ScriptedDelivery::returning(Ok(Some(sample_info())));
        let mut updater =
            AutoUpdater::with_delivery(Version::new(1, 2, 0), test_config(dir.path()), delivery);
        let events = record_events(&mut updater);

        let result = updater.check_for_updates_and_notify().await.unwrap();
        assert_eq!(result.unwrap().version, Version::new(1, 3, 0));

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                EventKind::CheckingForUpdate,
                EventKind::UpdateAvailable,
                EventKind::DownloadProgress,
                EventKind::DownloadProgress,
                EventKind::UpdateDownloaded,
            ]
        );

        // The package landed in the download directory under its feed name.
        let path = dir.path().join("parchment-1.3.0.tar.gz");
        assert_eq!(std::fs::read(path).unwrap(), b"update package");
    }

    #[tokio::test]
    async fn test_no_update_emits_not_available() {
        let dir = tempfile::tempdir().unwrap();
        let delivery = ScriptedDelivery::returning(Ok(None));
        let mut updater =
            AutoUpdater::with_delivery(Version::new(1, 2, 0), test_config(dir.path()), delivery);
        let events = record_events(&mut updater);

        let result = updater.check_for_updates_and_notify().await.unwrap();
        assert!(result.is_none());

        assert_eq!(
            *events.lock().unwrap(),
            vec![EventKind::CheckingForUpdate, EventKind::UpdateNotAvailable]
        );
    }

    #[tokio::test]
    async fn test_check_failure_emits_error_event() {
        let dir = tempfile::tempdir().unwrap();
        let delivery =
            ScriptedDelivery::returning(Err(UpdateError::Network("unreachable".to_string())));
        let mut updater =
            AutoUpdater::with_delivery(Version::new(1, 2, 0), test_config(dir.path()), delivery);
        let events = record_events(&mut updater);

        let err = updater.check_for_updates_and_notify().await.unwrap_err();
        assert!(matches!(err, UpdateError::Network(_)));

        assert_eq!(
            *events.lock().unwrap(),
            vec![EventKind::CheckingForUpdate, EventKind::Error]
        );
    }

    #[tokio::test]
    async fn test_auto_download_disabled_stops_after_available() {
        let dir = tempfile::tempdir().unwrap();
        let delivery = ScriptedDelivery::returning(Ok(Some(sample_info())));
        let config = UpdaterConfig {
            auto_download: false,
            ..test_config(dir.path())
        };
        let mut updater = AutoUpdater::with_delivery(Version::new(1, 2, 0), config, delivery);
        let events = record_events(&mut updater);

        let result = updater.check_for_updates_and_notify().await.unwrap();
        assert!(result.is_some());

        assert_eq!(
            *events.lock().unwrap(),
            vec![EventKind::CheckingForUpdate, EventKind::UpdateAvailable]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_check_waits_for_delay_and_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = UpdaterConfig {
            startup_delay_secs: 5,
            auto_download: false,
            ..test_config(dir.path())
        };
        let updater = Arc::new(AutoUpdater::with_delivery(
            Version::new(1, 2, 0),
            config,
            ScriptedDelivery::default(),
        ));

        let handle = updater.schedule_startup_check();

        // Just before the delay elapses: no check yet.
        tokio::time::advance(Duration::from_millis(4_900)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(updater.delivery.checks(), 0);

        // Past the delay: exactly one check, and the task finishes.
        tokio::time::advance(Duration::from_millis(200)).await;
        handle.await.unwrap();
        assert_eq!(updater.delivery.checks(), 1);

        // No re-arm: nothing further happens however long we wait.
        tokio::time::advance(Duration::from_secs(3600)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(updater.delivery.checks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_check_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let config = UpdaterConfig {
            startup_delay_secs: 1,
            ..test_config(dir.path())
        };
        let mut updater = AutoUpdater::with_delivery(
            Version::new(1, 2, 0),
            config,
            ScriptedDelivery::returning(Err(UpdateError::Feed("bad manifest".to_string()))),
        );
        let events = record_events(&mut updater);
        let updater = Arc::new(updater);

        let handle = updater.schedule_startup_check();
        tokio::time::advance(Duration::from_secs(2)).await;

        // The task completes normally despite the failed check.
        handle.await.unwrap();
        assert!(events.lock().unwrap().contains(&EventKind::Error));
    }

    #[tokio::test]
    async fn test_setup_without_feed_returns_none() {
        assert!(setup(UpdaterConfig::default()).is_none());
    }

    #[test]
    fn test_setup_outside_runtime_returns_none() {
        let config = UpdaterConfig::with_feed(FeedConfig::generic(
            "https://updates.parchment.dev/stable/latest.json",
        ));
        assert!(setup(config).is_none());
    }

    #[tokio::test]
    async fn test_setup_with_feed_returns_updater() {
        let config = UpdaterConfig::with_feed(FeedConfig::generic(
            "https://updates.parchment.dev/stable/latest.json",
        ));
        let updater = setup(config).expect("setup should succeed");
        assert_eq!(updater.current_version(), &Version::current());
    }

    #[tokio::test]
    async fn test_setup_uses_host_supplied_version() {
        let config = UpdaterConfig {
            current_version: Some(Version::new(9, 9, 9)),
            ..UpdaterConfig::with_feed(FeedConfig::generic(
                "https://updates.parchment.dev/stable/latest.json",
            ))
        };
        let updater = setup(config).expect("setup should succeed");
        assert_eq!(updater.current_version(), &Version::new(9, 9, 9));
    }
}
