//! Modification watch on the daemon's internal sync log.
//!
//! A poll watcher checks the log at the configured granularity (~700 ms) and
//! forwards modification events into a channel the instance loop selects on.
//! Arming can fail (the log may not exist yet); the monitor then degrades to
//! timer-only operation. Disarming drops the watcher and drains stale events
//! so a re-armed watch starts clean.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use notify::{Config as NotifyConfig, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use tracing::debug;

use crate::core::errors::{Result, SyncwatchError};

/// Poll-based watch over one daemon's sync log file.
pub struct LogWatcher {
    poll_interval: Duration,
    tx: Sender<()>,
    rx: Receiver<()>,
    watcher: Option<PollWatcher>,
    watched: Option<PathBuf>,
}

impl LogWatcher {
    /// A disarmed watcher checking at `poll_interval` once armed.
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        let (tx, rx) = unbounded();
        Self {
            poll_interval,
            tx,
            rx,
            watcher: None,
            watched: None,
        }
    }

    /// The channel modification signals arrive on. Valid for the lifetime of
    /// the watcher, armed or not (a disarmed watcher simply stays silent).
    #[must_use]
    pub const fn events(&self) -> &Receiver<()> {
        &self.rx
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.watcher.is_some()
    }

    /// Currently watched path, if armed.
    #[must_use]
    pub fn watched(&self) -> Option<&Path> {
        self.watched.as_deref()
    }

    /// Arm the watch on `path`.
    ///
    /// Any previous watch is dropped first. Fails with
    /// [`SyncwatchError::WatchSetup`] when the path cannot be watched (most
    /// commonly: the daemon has not created its log yet).
    pub fn arm(&mut self, path: &Path) -> Result<()> {
        self.disarm();

        let tx = self.tx.clone();
        let handler = move |result: notify::Result<Event>| {
            if let Ok(event) = result {
                // Content modification only; attribute churn is noise here.
                if matches!(event.kind, EventKind::Modify(_)) {
                    let _ = tx.send(());
                }
            }
        };
        let config = NotifyConfig::default().with_poll_interval(self.poll_interval);
        let mut watcher = PollWatcher::new(handler, config)
            .map_err(|err| watch_error(path, &err))?;
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|err| watch_error(path, &err))?;

        debug!(path = %path.display(), "sync log watch armed");
        self.watcher = Some(watcher);
        self.watched = Some(path.to_path_buf());
        Ok(())
    }

    /// Drop the watch (idempotent) and discard queued events.
    pub fn disarm(&mut self) {
        if self.watcher.take().is_some() {
            debug!(path = ?self.watched, "sync log watch disarmed");
        }
        self.watched = None;
        while self.rx.try_recv().is_ok() {}
    }
}

fn watch_error(path: &Path, err: &notify::Error) -> SyncwatchError {
    SyncwatchError::WatchSetup {
        path: path.to_path_buf(),
        details: err.to_string(),
    }
}

// ──────────────────── tests ────────────────────
