//! Lifecycle notifications emitted while checking for updates.

use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::feed::{DownloadProgress, UpdateInfo};
use crate::version::Version;

/// An event marking progress through the check/download flow.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    /// A check against the feed has started.
    CheckingForUpdate,
    /// The feed published a newer version.
    UpdateAvailable(UpdateInfo),
    /// The running version is current.
    UpdateNotAvailable {
        /// The version currently running.
        current: Version,
    },
    /// A check or download failed. Carries a user-facing message.
    Error(String),
    /// Bytes arrived while downloading an update package.
    DownloadProgress(DownloadProgress),
    /// The update package is downloaded and verified.
    UpdateDownloaded(UpdateInfo),
}

impl UpdateEvent {
    /// The kind of this event, used for handler dispatch.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::CheckingForUpdate => EventKind::CheckingForUpdate,
            Self::UpdateAvailable(_) => EventKind::UpdateAvailable,
            Self::UpdateNotAvailable { .. } => EventKind::UpdateNotAvailable,
            Self::Error(_) => EventKind::Error,
            Self::DownloadProgress(_) => EventKind::DownloadProgress,
            Self::UpdateDownloaded(_) => EventKind::UpdateDownloaded,
        }
    }
}

/// Discriminant for [`UpdateEvent`], without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`UpdateEvent::CheckingForUpdate`].
    CheckingForUpdate,
    /// See [`UpdateEvent::UpdateAvailable`].
    UpdateAvailable,
    /// See [`UpdateEvent::UpdateNotAvailable`].
    UpdateNotAvailable,
    /// See [`UpdateEvent::Error`].
    Error,
    /// See [`UpdateEvent::DownloadProgress`].
    DownloadProgress,
    /// See [`UpdateEvent::UpdateDownloaded`].
    UpdateDownloaded,
}

impl EventKind {
    /// Stable kebab-case name, used in log output.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CheckingForUpdate => "checking-for-update",
            Self::UpdateAvailable => "update-available",
            Self::UpdateNotAvailable => "update-not-available",
            Self::Error => "error",
            Self::DownloadProgress => "download-progress",
            Self::UpdateDownloaded => "update-downloaded",
        }
    }
}

pub(crate) type Callback = Box<dyn Fn(&UpdateEvent) + Send + Sync>;

/// Registry of per-event callbacks.
///
/// Handlers are independent: they share no mutable state, and a panic in
/// one handler is caught and logged so it cannot take down the dispatch
/// loop or skip the remaining subscribers.
#[derive(Default)]
pub(crate) struct Handlers {
    subscribers: Vec<(EventKind, Callback)>,
}

impl Handlers {
    pub(crate) fn subscribe(&mut self, kind: EventKind, callback: Callback) {
        self.subscribers.push((kind, callback));
    }

    pub(crate) fn emit(&self, event: &UpdateEvent) {
        let kind = event.kind();
        for (subscribed, callback) in &self.subscribers {
            if *subscribed != kind {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                tracing::error!(event = kind.name(), "update event handler panicked");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }
}
