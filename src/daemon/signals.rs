//! Signal handling: SIGTERM/SIGINT graceful shutdown, SIGHUP config reload.
//!
//! Uses the `signal-hook` crate for safe signal registration. The run loop
//! polls `SignalHandler` flags between event batches rather than blocking on
//! signals.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::warn;

/// Thread-safe signal state shared between the signal handler and the run
/// loop.
///
/// All flags use `Ordering::Relaxed` because the loop polls them every
/// iteration and exact ordering with other atomics is not required.
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
    reload_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Create a new handler and register OS signal hooks.
    ///
    /// SIGTERM/SIGINT -> shutdown, SIGHUP -> reload (Unix). Registration is
    /// best-effort; failures are logged but not fatal.
    pub fn new() -> Self {
        let handler = Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            reload_flag: Arc::new(AtomicBool::new(false)),
        };
        handler.register_signals();
        handler
    }

    /// Check whether a shutdown has been requested.
    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Check (and clear) whether a config reload has been requested.
    pub fn should_reload(&self) -> bool {
        self.reload_flag.swap(false, Ordering::Relaxed)
    }

    /// Programmatically request shutdown.
    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    /// Programmatically request a config reload.
    pub fn request_reload(&self) {
        self.reload_flag.store(true, Ordering::Relaxed);
    }

    fn register_signals(&self) {
        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&self.shutdown_flag)) {
            warn!(error = %e, "failed to register SIGTERM");
        }
        if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&self.shutdown_flag)) {
            warn!(error = %e, "failed to register SIGINT");
        }

        #[cfg(unix)]
        {
            use signal_hook::consts::SIGHUP;
            if let Err(e) = signal_hook::flag::register(SIGHUP, Arc::clone(&self.reload_flag)) {
                warn!(error = %e, "failed to register SIGHUP");
            }
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────── tests ────────────────────
