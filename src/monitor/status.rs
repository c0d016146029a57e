//! Canonical daemon status and the raw-text normalization rules.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The six-way canonical status derived from raw daemon text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Fully synchronized, nothing to do.
    Idle,
    /// Synchronization in progress.
    Busy,
    /// Synchronization paused.
    Paused,
    /// Daemon not running.
    #[default]
    None,
    /// Daemon up but offline.
    NoNet,
    /// Any other daemon-reported condition.
    Error,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Paused => "paused",
            Self::None => "none",
            Self::NoNet => "no_net",
            Self::Error => "error",
        };
        write!(f, "{label}")
    }
}

impl SyncStatus {
    /// Normalize raw daemon status text given the previous canonical status.
    ///
    /// Rules:
    /// - empty text (daemon not running) -> `None`
    /// - `index` is transient -> previous status retained
    /// - `no internet access` -> `NoNet`
    /// - `busy` / `idle` / `paused` pass through
    /// - everything else (including `error` and `failed to connect to daemon
    ///   process`) -> `Error`
    #[must_use]
    pub fn normalize(raw: &str, previous: Self) -> Self {
        match raw.trim() {
            "" => Self::None,
            "index" => previous,
            "no internet access" => Self::NoNet,
            "busy" => Self::Busy,
            "idle" => Self::Idle,
            "paused" => Self::Paused,
            _ => Self::Error,
        }
    }
}
