#![forbid(unsafe_code)]

//! syncwatch — monitoring and configuration core for cloud-sync daemons.
//!
//! Sits between a `yandex-disk`-style synchronization daemon and a user-facing
//! indicator: polls the daemon's status command, normalizes its text output,
//! diffs it against the previous state, and pushes structured change events to
//! whatever front-end subscribes. Polling pace is decided by a dual-trigger
//! scheduler — a backoff timer plus a modification watch on the daemon's own
//! sync log.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use syncwatch::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use syncwatch::config::store::ConfigStore;
//! use syncwatch::monitor::tracker::StatusMonitor;
//! ```

pub mod prelude;

pub mod config;
pub mod core;
pub mod daemon;
pub mod monitor;
