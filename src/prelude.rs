//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use syncwatch::prelude::*;
//! ```

// Core
pub use crate::core::errors::{Result, StartFailureKind, SyncwatchError};

// Config
pub use crate::config::app::AppSettings;
pub use crate::config::daemon::DaemonConfig;
pub use crate::config::store::{BoolAliases, ConfigStore, StoreOptions};
pub use crate::config::value::{MultiValue, Scalar, Value};

// Monitor
pub use crate::monitor::event::ChangeEvent;
pub use crate::monitor::status::SyncStatus;
pub use crate::monitor::tracker::{StatusMonitor, StatusRecord};

// Daemon
pub use crate::daemon::control::DaemonControl;
pub use crate::daemon::events::{EventJournal, EventLevel, MonitorEvent};
pub use crate::daemon::instance::{DaemonInstance, InstanceCommand, InstanceHandle, InstanceOptions};
pub use crate::daemon::scheduler::{PollScheduler, SchedulerConfig, Trigger};
pub use crate::daemon::watcher::LogWatcher;
