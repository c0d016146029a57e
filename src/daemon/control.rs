//! Daemon lifecycle commands: status query, start, stop.
//!
//! All three are blocking subprocess invocations of the daemon CLI against a
//! specific config path, with a bounded deadline. The status query never
//! errors: invocation failure, non-zero exit, and timeout all collapse to
//! empty output, which the monitor reads as "daemon not running".

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::core::errors::{Result, StartFailureKind, SyncwatchError};

/// Default daemon CLI binary name.
pub const DEFAULT_COMMAND: &str = "yandex-disk";

/// Default deadline for a status query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for start/stop, which may legitimately take a while.
const LIFECYCLE_TIMEOUT: Duration = Duration::from_secs(30);

const WAIT_POLL: Duration = Duration::from_millis(20);

/// Captured result of one daemon CLI invocation.
#[derive(Debug)]
struct Invocation {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

/// Handle for invoking one daemon's CLI.
#[derive(Debug, Clone)]
pub struct DaemonControl {
    command: String,
    config_path: PathBuf,
    query_timeout: Duration,
}

impl DaemonControl {
    /// Control for the daemon configured at `config_path`.
    #[must_use]
    pub fn new(command: impl Into<String>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            config_path: config_path.into(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Override the status-query deadline.
    #[must_use]
    pub const fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// The daemon config path this control targets.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Result of the daemon's status subcommand.
    ///
    /// Forces a neutral locale unless `user_language` is requested, so parsed
    /// labels stay stable regardless of the user's environment. Returns empty
    /// text on any invocation failure — never errors.
    #[must_use]
    pub fn query_output(&self, user_language: bool) -> String {
        match self.invoke("status", !user_language, self.query_timeout) {
            Some(inv) if inv.status.success() => inv.stdout,
            Some(inv) => {
                debug!(code = ?inv.status.code(), "status query exited non-zero");
                String::new()
            }
            None => String::new(),
        }
    }

    /// Start the daemon.
    ///
    /// Failure output is scanned for the substrings the daemon emits for
    /// proxy/network trouble, daemon-launch trouble, and missing dir/auth
    /// configuration; everything else is `Unknown`.
    pub fn start(&self) -> Result<()> {
        let Some(inv) = self.invoke("start", false, LIFECYCLE_TIMEOUT) else {
            // Could not even spawn the CLI.
            return Err(SyncwatchError::DaemonStart {
                kind: StartFailureKind::NotInstalled,
                output: String::new(),
            });
        };
        if inv.status.success() {
            debug!("daemon start succeeded: {}", inv.stdout.trim());
            return Ok(());
        }

        let kind = classify_start_failure(&inv.stdout);
        warn!(%kind, "daemon start failed: {}", inv.stdout.trim());
        Err(SyncwatchError::DaemonStart {
            kind,
            output: if inv.stdout.is_empty() {
                inv.stderr
            } else {
                inv.stdout
            },
        })
    }

    /// Stop the daemon. True on a confirmed stop (the stop subcommand exits
    /// cleanly and acknowledges with output).
    #[must_use]
    pub fn stop(&self) -> bool {
        self.invoke("stop", false, LIFECYCLE_TIMEOUT)
            .is_some_and(|inv| inv.status.success() && !inv.stdout.is_empty())
    }

    fn invoke(&self, subcommand: &str, neutral_locale: bool, timeout: Duration) -> Option<Invocation> {
        let mut cmd = Command::new(&self.command);
        cmd.arg("-c")
            .arg(&self.config_path)
            .arg(subcommand)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if neutral_locale {
            cmd.env_clear().env("LANG", "en_US.UTF8");
            // PATH survives the wipe so a bare command name still resolves.
            if let Some(path) = std::env::var_os("PATH") {
                cmd.env("PATH", path);
            }
        }

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                debug!(command = %self.command, error = %err, "daemon invocation failed");
                return None;
            }
        };
        wait_with_deadline(child, subcommand, timeout)
    }
}

fn wait_with_deadline(mut child: Child, subcommand: &str, timeout: Duration) -> Option<Invocation> {
    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let err = SyncwatchError::DaemonQuery {
                        details: format!("'{subcommand}' deadline exceeded, child killed"),
                    };
                    warn!(error = %err, "daemon command timed out");
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                thread::sleep(WAIT_POLL);
            }
            Err(err) => {
                debug!(subcommand, error = %err, "wait on daemon command failed");
                let _ = child.kill();
                return None;
            }
        }
    };

    let mut stdout = String::new();
    if let Some(mut pipe) = child.stdout.take() {
        let _ = pipe.read_to_string(&mut stdout);
    }
    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        let _ = pipe.read_to_string(&mut stderr);
    }
    Some(Invocation {
        status,
        stdout,
        stderr,
    })
}

/// Map daemon start failure text onto a [`StartFailureKind`].
#[must_use]
pub fn classify_start_failure(output: &str) -> StartFailureKind {
    if output.is_empty() {
        StartFailureKind::NotInstalled
    } else if output.contains("Proxy") {
        StartFailureKind::NoNet
    } else if output.contains("daemon") {
        StartFailureKind::BadDaemon
    } else if output.contains("'dir'") || output.contains("OAuth") {
        StartFailureKind::NoConfig
    } else {
        StartFailureKind::Unknown
    }
}

// ──────────────────── tests ────────────────────
