//! SYW-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SyncwatchError>;

/// Classified reason a daemon start attempt failed.
///
/// Derived from the start subcommand's exit status and captured output. The
/// presentation layer is expected to surface these for interactive resolution
/// (reconfigure, retry, or abandon the instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartFailureKind {
    /// The daemon binary is missing from the system.
    NotInstalled,
    /// Network/proxy trouble reported by the daemon.
    NoNet,
    /// The daemon process itself failed to launch.
    BadDaemon,
    /// Sync directory or auth token not configured.
    NoConfig,
    /// Anything the classifier could not recognize.
    Unknown,
}

impl fmt::Display for StartFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInstalled => write!(f, "not installed"),
            Self::NoNet => write!(f, "no network"),
            Self::BadDaemon => write!(f, "daemon launch failure"),
            Self::NoConfig => write!(f, "not configured"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Top-level error type for syncwatch.
#[derive(Debug, Error)]
pub enum SyncwatchError {
    #[error("[SYW-1001] config file read failure for {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SYW-1002] config parse failure in line '{line}': {reason}")]
    ConfigParse { line: String, reason: String },

    #[error("[SYW-1003] config file write failure for {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SYW-1101] value not present: {details}")]
    ValueNotFound { details: String },

    #[error("[SYW-1102] index {index} out of bounds for value of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("[SYW-2001] daemon query failure: {details}")]
    DaemonQuery { details: String },

    #[error("[SYW-2002] daemon start failure ({kind}): {output}")]
    DaemonStart {
        kind: StartFailureKind,
        output: String,
    },

    #[error("[SYW-2101] watch setup failure for {path}: {details}")]
    WatchSetup { path: PathBuf, details: String },

    #[error("[SYW-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SYW-3003] another instance holds the lock file {path}")]
    LockHeld { path: PathBuf },

    #[error("[SYW-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl SyncwatchError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ConfigRead { .. } => "SYW-1001",
            Self::ConfigParse { .. } => "SYW-1002",
            Self::ConfigWrite { .. } => "SYW-1003",
            Self::ValueNotFound { .. } => "SYW-1101",
            Self::IndexOutOfBounds { .. } => "SYW-1102",
            Self::DaemonQuery { .. } => "SYW-2001",
            Self::DaemonStart { .. } => "SYW-2002",
            Self::WatchSetup { .. } => "SYW-2101",
            Self::Io { .. } => "SYW-3002",
            Self::LockHeld { .. } => "SYW-3003",
            Self::Runtime { .. } => "SYW-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ConfigRead { .. }
            | Self::ConfigWrite { .. }
            | Self::DaemonQuery { .. }
            | Self::WatchSetup { .. }
            | Self::Io { .. }
            | Self::Runtime { .. } => true,
            Self::DaemonStart { kind, .. } => matches!(
                kind,
                StartFailureKind::NoNet | StartFailureKind::BadDaemon | StartFailureKind::Unknown
            ),
            Self::ConfigParse { .. }
            | Self::ValueNotFound { .. }
            | Self::IndexOutOfBounds { .. }
            | Self::LockHeld { .. } => false,
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for SyncwatchError {
    fn from(value: serde_json::Error) -> Self {
        Self::Runtime {
            details: format!("serde_json: {value}"),
        }
    }
}
