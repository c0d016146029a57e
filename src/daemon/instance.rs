//! One sequential event loop per tracked daemon.
//!
//! The loop owns everything for its daemon — config, control, status monitor,
//! sync-log watch, backoff scheduler — and selects over three sources: the
//! control channel from the presentation layer, the watch event channel, and
//! the poll timer deadline. Both triggers funnel into the same cycle routine,
//! so no two cycles ever run concurrently for one daemon. Instances share
//! nothing mutable; one daemon failing leaves the others alone.

use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, select, unbounded};
use tracing::{debug, info, warn};

use crate::config::daemon::DaemonConfig;
use crate::core::errors::{Result, StartFailureKind, SyncwatchError};
use crate::core::paths;
use crate::daemon::control::{DEFAULT_COMMAND, DEFAULT_QUERY_TIMEOUT, DaemonControl};
use crate::daemon::events::MonitorEvent;
use crate::daemon::scheduler::{PollScheduler, SchedulerConfig, Trigger};
use crate::daemon::watcher::LogWatcher;
use crate::monitor::event::ChangeEvent;
use crate::monitor::status::SyncStatus;
use crate::monitor::tracker::StatusMonitor;

// ──────────────────── control surface ────────────────────

/// Commands the presentation layer can send into a running instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceCommand {
    /// Start the daemon (emits `StartFailed` on classified failure).
    Start,
    /// Stop the daemon and force one manual re-diff.
    Stop,
    /// Re-parse and re-diff immediately.
    Refresh,
    /// Leave the loop (running the stop-on-exit policy first).
    Shutdown,
}

/// Per-instance construction options.
#[derive(Debug, Clone)]
pub struct InstanceOptions {
    /// Display id: empty for a single daemon, `"#<n> "` in multi-daemon
    /// setups.
    pub id: String,
    /// Daemon CLI binary (name or path).
    pub daemon_command: String,
    /// Scheduler tuning.
    pub scheduler: SchedulerConfig,
    /// Status query deadline.
    pub query_timeout: Duration,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            id: String::new(),
            daemon_command: DEFAULT_COMMAND.to_string(),
            scheduler: SchedulerConfig::default(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

/// Handle to a spawned instance thread.
pub struct InstanceHandle {
    id: String,
    commands: Sender<InstanceCommand>,
    thread: JoinHandle<()>,
}

impl InstanceHandle {
    /// The instance's display id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Send a command; `false` when the loop is already gone.
    pub fn send(&self, command: InstanceCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Request shutdown and wait for the loop to finish.
    pub fn shutdown(self) {
        let _ = self.commands.send(InstanceCommand::Shutdown);
        let _ = self.thread.join();
    }
}

// ──────────────────── instance loop ────────────────────

/// State owned by one daemon's monitoring loop.
pub struct DaemonInstance {
    id: String,
    config: DaemonConfig,
    control: DaemonControl,
    monitor: StatusMonitor,
    watcher: LogWatcher,
    scheduler: PollScheduler,
    updates: Sender<MonitorEvent>,
    commands: Receiver<InstanceCommand>,
    next_poll: Instant,
    watch_block_until: Option<Instant>,
}

impl DaemonInstance {
    /// Spawn the monitoring loop for the daemon configured at `config_path`.
    ///
    /// Events flow out on `updates`; the returned handle is the only way in.
    pub fn spawn(
        config_path: PathBuf,
        options: InstanceOptions,
        updates: Sender<MonitorEvent>,
    ) -> Result<InstanceHandle> {
        let (tx, rx) = unbounded();
        let id = options.id.clone();
        let thread = thread::Builder::new()
            .name("syncwatch-instance".to_string())
            .spawn(move || {
                let mut instance = Self::new(config_path, options, updates, rx);
                instance.run();
            })
            .map_err(|err| SyncwatchError::Runtime {
                details: format!("instance thread spawn failed: {err}"),
            })?;
        Ok(InstanceHandle {
            id,
            commands: tx,
            thread,
        })
    }

    fn new(
        config_path: PathBuf,
        options: InstanceOptions,
        updates: Sender<MonitorEvent>,
        commands: Receiver<InstanceCommand>,
    ) -> Self {
        let config = DaemonConfig::open(&config_path);
        let control = DaemonControl::new(options.daemon_command, config_path)
            .with_query_timeout(options.query_timeout);
        let scheduler = PollScheduler::new(options.scheduler);
        let watcher = LogWatcher::new(scheduler.config().watch_poll());
        let next_poll = Instant::now() + scheduler.interval();
        Self {
            id: options.id,
            config,
            control,
            monitor: StatusMonitor::new(),
            watcher,
            scheduler,
            updates,
            commands,
            next_poll,
            watch_block_until: None,
        }
    }

    fn run(&mut self) {
        info!(id = %self.id, config = %self.control.config_path().display(), "monitor loop starting");
        self.initialize();

        // Cloned endpoints keep the select arms borrow-free.
        let commands = self.commands.clone();
        let watch_events = self.watcher.events().clone();

        loop {
            let timeout = self.next_poll.saturating_duration_since(Instant::now());
            select! {
                recv(commands) -> command => match command {
                    Ok(InstanceCommand::Start) => {
                        self.handle_start();
                    }
                    Ok(InstanceCommand::Stop) => self.handle_stop(),
                    Ok(InstanceCommand::Refresh) => self.cycle(Trigger::Manual),
                    Ok(InstanceCommand::Shutdown) | Err(_) => break,
                },
                recv(watch_events) -> event => {
                    if event.is_ok() {
                        self.handle_watch_event();
                    }
                },
                default(timeout) => self.cycle(Trigger::Timer),
            }
        }

        self.finalize();
    }

    /// First look at the daemon: parse if running, otherwise apply the
    /// start-on-launch policy, and in any case raise the initial event.
    fn initialize(&mut self) {
        if !self.config.is_configured() {
            warn!(id = %self.id, "daemon dir/auth configuration incomplete");
            self.emit(MonitorEvent::StartFailed {
                instance: self.id.clone(),
                kind: StartFailureKind::NoConfig,
                details: "sync directory or auth file missing".to_string(),
            });
        }

        let output = self.control.query_output(false);
        if output.is_empty() {
            let started = self.config.start_on_launch() && self.handle_start();
            if !started {
                // Not running and not started: the initial snapshot is the
                // default none/none record.
                let change = ChangeEvent {
                    initial: true,
                    ..ChangeEvent::default()
                };
                self.emit_changed(change);
            }
        } else {
            let mut change = self.monitor.apply(&output);
            // The pre-start status is unknown; don't invent a transition.
            self.monitor.align_last_status();
            change.initial = true;
            self.emit_changed(change);
            self.arm_watch();
        }
        self.next_poll = Instant::now() + self.scheduler.interval();
    }

    /// One re-parse/re-diff cycle, from any trigger.
    fn cycle(&mut self, trigger: Trigger) {
        let output = self.control.query_output(false);
        let change = self.monitor.apply(&output);
        if change.any() {
            self.emit_changed(change);
        }
        debug!(
            id = %self.id,
            ?trigger,
            status = %self.monitor.record().status,
            previous = %self.monitor.record().last_status,
            "cycle complete"
        );
        self.scheduler
            .note_cycle(trigger, self.monitor.record().status);
        self.next_poll = Instant::now() + self.scheduler.interval();
    }

    /// Watch events arrive at poll granularity; one cycle per granularity
    /// window is plenty.
    fn handle_watch_event(&mut self) {
        let now = Instant::now();
        if self.watch_block_until.is_some_and(|until| now < until) {
            return;
        }
        self.watch_block_until = Some(now + self.scheduler.config().watch_poll());
        self.cycle(Trigger::Watch);
    }

    /// Start the daemon and reinitialize monitoring state on success.
    fn handle_start(&mut self) -> bool {
        match self.control.start() {
            Ok(()) => {
                self.monitor.reset();
                let output = self.control.query_output(false);
                let mut change = self.monitor.apply(&output);
                // Freshly started daemons report transient statuses; pin a
                // known pair so the next real status cannot be mistaken for
                // an index-style no-op.
                self.monitor
                    .force_status(SyncStatus::Paused, SyncStatus::None);
                change.initial = true;
                self.emit_changed(change);
                self.arm_watch();
                self.scheduler.reset();
                self.next_poll = Instant::now() + self.scheduler.interval();
                true
            }
            Err(SyncwatchError::DaemonStart { kind, output }) => {
                self.emit(MonitorEvent::StartFailed {
                    instance: self.id.clone(),
                    kind,
                    details: output,
                });
                false
            }
            Err(err) => {
                warn!(id = %self.id, error = %err, "daemon start failed");
                false
            }
        }
    }

    /// Stop the daemon; on success release the watch and force a re-diff so
    /// observers see the transition immediately.
    fn handle_stop(&mut self) {
        if self.control.stop() {
            self.watcher.disarm();
            self.cycle(Trigger::Manual);
        } else {
            self.emit(MonitorEvent::StopFailed {
                instance: self.id.clone(),
            });
        }
    }

    fn arm_watch(&mut self) {
        let Some(dir) = self.config.dir().map(ToString::to_string) else {
            self.emit(MonitorEvent::WatchDegraded {
                instance: self.id.clone(),
                details: "sync directory not configured".to_string(),
            });
            return;
        };
        let log_path = paths::daemon_log_path(&dir);
        if let Err(err) = self.watcher.arm(&log_path) {
            warn!(id = %self.id, error = %err, "sync log watch unavailable, timer-only");
            self.emit(MonitorEvent::WatchDegraded {
                instance: self.id.clone(),
                details: err.to_string(),
            });
        }
    }

    /// Stop-on-exit policy, then release the watch before the loop ends.
    fn finalize(&mut self) {
        if self.config.stop_on_exit() && self.monitor.record().status != SyncStatus::None {
            info!(id = %self.id, "stopping daemon on exit per configuration");
            self.handle_stop();
        }
        self.watcher.disarm();
        info!(id = %self.id, "monitor loop stopped");
    }

    fn emit_changed(&self, change: ChangeEvent) {
        let event = MonitorEvent::Changed {
            instance: self.id.clone(),
            record: self.monitor.record().clone(),
            change,
        };
        self.emit(event);
    }

    fn emit(&self, event: MonitorEvent) {
        if self.updates.send(event).is_err() {
            debug!(id = %self.id, "no event subscriber, event dropped");
        }
    }
}

// ──────────────────── tests ────────────────────

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use crate::monitor::status::SyncStatus;

    const RECV_TIMEOUT: Duration = Duration::from_secs(10);

    struct Fixture {
        _dir: tempfile::TempDir,
        config_path: PathBuf,
        state_path: PathBuf,
        script_path: PathBuf,
    }

    /// A daemon config + fake daemon script whose status output is whatever
    /// the test writes into the state file.
    fn fixture(auto_start: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let sync_dir = dir.path().join("sync");
        fs::create_dir_all(sync_dir.join(".sync")).unwrap();
        let auth = dir.path().join("passwd");
        fs::write(&auth, "token").unwrap();
        fs::write(sync_dir.join(".sync/cli.log"), "log\n").unwrap();

        let state_path = dir.path().join("state.txt");
        fs::write(&state_path, "").unwrap();

        let config_path = dir.path().join("config.cfg");
        fs::write(
            &config_path,
            format!(
                "dir=\"{}\"\nauth=\"{}\"\nstartonstartofindicator={}\n",
                sync_dir.display(),
                auth.display(),
                if auto_start { "yes" } else { "no" },
            ),
        )
        .unwrap();

        let script_path = dir.path().join("fake-daemon");
        fs::write(
            &script_path,
            format!(
                "#!/bin/sh\n\
                 case \"$3\" in\n\
                 status) cat '{state}' ;;\n\
                 start) echo 'Starting daemon process...done' ;;\n\
                 stop) echo 'Daemon stopped.'; : > '{state}' ;;\n\
                 esac\n",
                state = state_path.display()
            ),
        )
        .unwrap();
        fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755)).unwrap();

        Fixture {
            _dir: dir,
            config_path,
            state_path,
            script_path,
        }
    }

    fn options(script: &Path) -> InstanceOptions {
        InstanceOptions {
            daemon_command: script.to_string_lossy().to_string(),
            scheduler: SchedulerConfig {
                base_interval_ms: 100,
                step_ms: 50,
                max_steps: 3,
                cap_ms: 300,
                watch_poll_ms: 50,
            },
            ..InstanceOptions::default()
        }
    }

    fn next_changed(
        events: &Receiver<MonitorEvent>,
    ) -> (crate::monitor::tracker::StatusRecord, ChangeEvent) {
        loop {
            match events.recv_timeout(RECV_TIMEOUT).expect("event expected") {
                MonitorEvent::Changed { record, change, .. } => return (record, change),
                _ => continue,
            }
        }
    }

    #[test]
    fn initial_event_for_stopped_daemon_is_none() {
        let fx = fixture(false);
        let (tx, rx) = unbounded();
        let handle =
            DaemonInstance::spawn(fx.config_path.clone(), options(&fx.script_path), tx).unwrap();

        let (record, change) = next_changed(&rx);
        assert!(change.initial);
        assert_eq!(record.status, SyncStatus::None);
        assert_eq!(record.last_status, SyncStatus::None);

        handle.shutdown();
    }

    #[test]
    fn initial_event_for_running_daemon_parses_output() {
        let fx = fixture(false);
        fs::write(
            &fx.state_path,
            "Synchronization core status: idle\nTotal: 10 GB\n",
        )
        .unwrap();
        let (tx, rx) = unbounded();
        let handle =
            DaemonInstance::spawn(fx.config_path.clone(), options(&fx.script_path), tx).unwrap();

        let (record, change) = next_changed(&rx);
        assert!(change.initial);
        assert_eq!(record.status, SyncStatus::Idle);
        assert_eq!(record.last_status, SyncStatus::Idle, "aligned, no invented transition");
        assert_eq!(record.total, "10 GB");

        handle.shutdown();
    }

    #[test]
    fn timer_cycles_pick_up_status_changes() {
        let fx = fixture(false);
        let (tx, rx) = unbounded();
        let handle =
            DaemonInstance::spawn(fx.config_path.clone(), options(&fx.script_path), tx).unwrap();
        let _ = next_changed(&rx); // initial none

        fs::write(&fx.state_path, "Synchronization core status: busy\n").unwrap();
        let (record, change) = next_changed(&rx);
        assert!(change.status);
        assert_eq!(record.status, SyncStatus::Busy);
        assert_eq!(record.last_status, SyncStatus::None);

        handle.shutdown();
    }

    #[test]
    fn start_command_emits_transitional_snapshot_and_classified_failures() {
        let fx = fixture(false);
        let (tx, rx) = unbounded();
        let handle =
            DaemonInstance::spawn(fx.config_path.clone(), options(&fx.script_path), tx).unwrap();
        let _ = next_changed(&rx);

        assert!(handle.send(InstanceCommand::Start));
        let (record, change) = next_changed(&rx);
        assert!(change.initial);
        assert_eq!(record.status, SyncStatus::Paused);
        assert_eq!(record.last_status, SyncStatus::None);

        handle.shutdown();
    }

    #[test]
    fn stop_command_forces_immediate_rediff() {
        let fx = fixture(false);
        fs::write(&fx.state_path, "Synchronization core status: idle\n").unwrap();
        let (tx, rx) = unbounded();
        let handle =
            DaemonInstance::spawn(fx.config_path.clone(), options(&fx.script_path), tx).unwrap();
        let _ = next_changed(&rx); // initial idle

        // The fake daemon's stop clears the state file, so the forced re-diff
        // must observe the none transition without waiting for a slow timer.
        assert!(handle.send(InstanceCommand::Stop));
        let (record, change) = next_changed(&rx);
        assert!(change.status);
        assert_eq!(record.status, SyncStatus::None);

        handle.shutdown();
    }

    #[test]
    fn unconfigured_daemon_surfaces_noconfig() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.cfg");
        fs::write(&config_path, "dir=\"/nonexistent/dir\"\n").unwrap();
        let script = dir.path().join("fake-daemon");
        fs::write(&script, "#!/bin/sh\nexit 1\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let (tx, rx) = unbounded();
        let mut opts = options(&script);
        opts.id = "#1 ".to_string();
        let handle = DaemonInstance::spawn(config_path, opts, tx).unwrap();

        let mut saw_noconfig = false;
        for _ in 0..4 {
            match rx.recv_timeout(RECV_TIMEOUT) {
                Ok(MonitorEvent::StartFailed { kind, instance, .. }) => {
                    assert_eq!(instance, "#1 ");
                    assert_eq!(kind, StartFailureKind::NoConfig);
                    saw_noconfig = true;
                    break;
                }
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        assert!(saw_noconfig, "expected a NoConfig start failure event");

        handle.shutdown();
    }
}
