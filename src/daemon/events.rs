//! Structured events emitted to the presentation layer, plus the append-only
//! JSONL journal.
//!
//! The monitor never renders anything itself: front-ends subscribe to a
//! channel of [`MonitorEvent`]s and decide what to do with them. `summary()`
//! provides a ready-made human line for front-ends that just want text.
//! Journal failures are logged and then silenced — monitoring must never
//! stall on logging.

#![allow(missing_docs)]

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::errors::{Result, StartFailureKind, SyncwatchError};
use crate::monitor::event::ChangeEvent;
use crate::monitor::status::SyncStatus;
use crate::monitor::tracker::StatusRecord;

// ──────────────────── event level ────────────────────

/// Severity of a monitor event, for front-end filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// ──────────────────── monitor events ────────────────────

/// One structured event from a daemon instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// The status record changed (or this is the initial snapshot).
    Changed {
        instance: String,
        record: StatusRecord,
        change: ChangeEvent,
    },
    /// A start attempt failed, classified for interactive resolution.
    StartFailed {
        instance: String,
        kind: StartFailureKind,
        details: String,
    },
    /// A stop attempt was not acknowledged by the daemon.
    StopFailed { instance: String },
    /// The sync-log watch could not be armed; polling continues timer-only.
    WatchDegraded { instance: String, details: String },
}

impl MonitorEvent {
    /// The originating instance id (empty in single-daemon setups).
    #[must_use]
    pub fn instance(&self) -> &str {
        match self {
            Self::Changed { instance, .. }
            | Self::StartFailed { instance, .. }
            | Self::StopFailed { instance }
            | Self::WatchDegraded { instance, .. } => instance,
        }
    }

    /// Severity for min-level filtering.
    #[must_use]
    pub fn level(&self) -> EventLevel {
        match self {
            Self::Changed { record, .. } => match record.status {
                SyncStatus::Error | SyncStatus::NoNet => EventLevel::Warning,
                _ => EventLevel::Info,
            },
            Self::StartFailed { .. } => EventLevel::Error,
            Self::StopFailed { .. } | Self::WatchDegraded { .. } => EventLevel::Warning,
        }
    }

    /// Short human-readable summary line.
    #[must_use]
    pub fn summary(&self) -> String {
        let text = match self {
            Self::Changed { record, change, .. } => change_summary(record, change),
            Self::StartFailed { kind, .. } => format!("daemon start failed: {kind}"),
            Self::StopFailed { .. } => "daemon stop was not acknowledged".to_string(),
            Self::WatchDegraded { details, .. } => {
                format!("sync log watch unavailable ({details}), polling only")
            }
        };
        let instance = self.instance();
        if instance.is_empty() {
            text
        } else {
            format!("{instance}{text}")
        }
    }
}

fn change_summary(record: &StatusRecord, change: &ChangeEvent) -> String {
    if change.status {
        return match record.status {
            SyncStatus::None => "daemon has been stopped".to_string(),
            _ if record.last_status == SyncStatus::None => "daemon has been started".to_string(),
            SyncStatus::Busy => "synchronization started".to_string(),
            SyncStatus::Idle if record.last_status == SyncStatus::Busy => {
                "synchronization completed".to_string()
            }
            SyncStatus::Paused => "synchronization paused".to_string(),
            SyncStatus::Error | SyncStatus::NoNet => "synchronization error".to_string(),
            status => format!("status changed to {status}"),
        };
    }
    if change.progress {
        return format!("sync progress {}", record.progress);
    }
    if change.size {
        return format!("cloud usage {} of {}", record.used, record.total);
    }
    if change.list {
        return "recently synchronized items updated".to_string();
    }
    format!("monitoring started, status {}", record.status)
}

// ──────────────────── JSONL journal ────────────────────

#[derive(Serialize)]
struct JournalLine<'a> {
    ts: String,
    level: EventLevel,
    summary: String,
    #[serde(flatten)]
    event: &'a MonitorEvent,
}

/// Append-only JSONL event journal, shared by all instance threads.
///
/// Each line is one self-contained JSON object, assembled in memory and
/// written with a single `write_all` so tailing readers never see a torn
/// line.
pub struct EventJournal {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl EventJournal {
    /// Open (create) the journal at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncwatchError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SyncwatchError::io(&path, e))?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    /// Journal file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event. Failures disable the journal after a warning.
    pub fn append(&self, event: &MonitorEvent) {
        let line = JournalLine {
            ts: chrono::Utc::now().to_rfc3339(),
            level: event.level(),
            summary: event.summary(),
            event,
        };
        let Ok(mut encoded) = serde_json::to_string(&line) else {
            return;
        };
        encoded.push('\n');

        let mut guard = self.file.lock();
        let disable = match guard.as_mut() {
            Some(file) => file.write_all(encoded.as_bytes()).is_err(),
            None => false,
        };
        if disable {
            warn!(path = %self.path.display(), "journal write failed, disabling journal");
            *guard = None;
        }
    }
}

// ──────────────────── tests ────────────────────
