//! Top-level CLI definition and dispatch.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use crossbeam_channel::{RecvTimeoutError, unbounded};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use syncwatch::config::app::AppSettings;
use syncwatch::core::errors::{Result, StartFailureKind, SyncwatchError};
#[cfg(unix)]
use syncwatch::core::lockfile::LockFile;
use syncwatch::core::paths;
use syncwatch::daemon::control::{DEFAULT_COMMAND, DaemonControl};
use syncwatch::daemon::events::{EventJournal, EventLevel, MonitorEvent};
use syncwatch::daemon::instance::{DaemonInstance, InstanceOptions};
use syncwatch::daemon::signals::SignalHandler;
use syncwatch::monitor::status::SyncStatus;
use syncwatch::monitor::tracker::{StatusMonitor, StatusRecord};

/// syncwatch — sync-daemon monitoring core.
#[derive(Debug, Parser)]
#[command(
    name = "syncwatch",
    author,
    version,
    about = "Sync-daemon status monitor and configuration tool",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override the application config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Daemon CLI binary to invoke.
    #[arg(long, global = true, value_name = "BIN", default_value = DEFAULT_COMMAND)]
    daemon_bin: String,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Monitor all configured daemons and stream change events.
    Run(RunArgs),
    /// Show the current status of one or all daemons.
    Status(StatusArgs),
    /// Start a daemon.
    Start(SelectArgs),
    /// Stop a daemon.
    Stop(SelectArgs),
    /// Manage the tracked daemon list.
    Daemons(DaemonsArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct RunArgs {
    /// Append events to a JSONL journal at this path.
    #[arg(long, value_name = "PATH")]
    journal: Option<PathBuf>,
}

#[derive(Debug, Clone, Args, Default)]
struct StatusArgs {
    /// Daemon config path (defaults to every tracked daemon).
    #[arg(value_name = "CONFIG")]
    daemon: Option<String>,
    /// Print the daemon's raw output (in the user's language) instead of the
    /// parsed record.
    #[arg(long)]
    raw: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct SelectArgs {
    /// Daemon config path (defaults to every tracked daemon).
    #[arg(value_name = "CONFIG")]
    daemon: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct DaemonsArgs {
    #[command(subcommand)]
    action: DaemonsAction,
}

#[derive(Debug, Clone, Subcommand)]
enum DaemonsAction {
    /// Track another daemon config path.
    Add {
        /// Daemon config path.
        path: String,
    },
    /// Stop tracking a daemon config path.
    Remove {
        /// Daemon config path.
        path: String,
    },
    /// List tracked daemon config paths.
    List,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    shell: CompletionShell,
}

/// Parse-and-dispatch entry point used by `main`.
pub fn run(cli: &Cli) -> Result<()> {
    init_tracing(cli);
    if cli.no_color {
        control::set_override(false);
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(paths::app_config_file);
    let mut settings = AppSettings::open(&config_path);
    // First run: persist the seeded defaults so the file exists from now on.
    if !settings.store().read_ok() && settings.store().changed() {
        settings.save();
    }

    match &cli.command {
        Command::Run(args) => cmd_run(cli, &settings, args),
        Command::Status(args) => cmd_status(cli, &settings, args),
        Command::Start(args) => cmd_start(cli, &settings, args),
        Command::Stop(args) => cmd_stop(cli, &settings, args),
        Command::Daemons(args) => cmd_daemons(&mut settings, &args.action, cli.json),
        Command::Completions(args) => {
            generate(
                args.shell,
                &mut Cli::command(),
                "syncwatch",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("syncwatch={default_level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn selected_daemons(settings: &AppSettings, selection: Option<&String>) -> Vec<String> {
    selection.map_or_else(|| settings.daemons(), |path| vec![path.clone()])
}

// ──────────────────── run ────────────────────

fn cmd_run(cli: &Cli, settings: &AppSettings, args: &RunArgs) -> Result<()> {
    #[cfg(unix)]
    let _lock = LockFile::acquire(&paths::lock_file())?;

    let daemons = settings.daemons();
    if daemons.is_empty() {
        return Err(SyncwatchError::Runtime {
            details: "no daemons configured; add one with 'syncwatch daemons add <path>'"
                .to_string(),
        });
    }

    let (events_tx, events_rx) = unbounded();
    let multi = daemons.len() > 1;
    let mut handles = Vec::new();
    for (index, daemon) in daemons.iter().enumerate() {
        let options = InstanceOptions {
            id: if multi {
                format!("#{} ", index + 1)
            } else {
                String::new()
            },
            daemon_command: cli.daemon_bin.clone(),
            ..InstanceOptions::default()
        };
        match DaemonInstance::spawn(paths::expand_tilde(daemon), options, events_tx.clone()) {
            Ok(handle) => handles.push(handle),
            // One daemon failing to come up must not take the others down.
            Err(err) => error!(daemon, error = %err, "failed to spawn monitor instance"),
        }
    }
    drop(events_tx);
    if handles.is_empty() {
        return Err(SyncwatchError::Runtime {
            details: "no monitor instance could be started".to_string(),
        });
    }

    let journal = args.journal.as_ref().and_then(|path| {
        EventJournal::open(path)
            .map_err(|err| warn!(error = %err, "journal unavailable"))
            .ok()
    });

    let signals = SignalHandler::new();
    info!(instances = handles.len(), "monitoring started");

    loop {
        if signals.should_shutdown() {
            break;
        }
        if signals.should_reload() {
            info!("SIGHUP received; daemon list changes apply on restart");
        }
        match events_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(event) => {
                if let Some(journal) = &journal {
                    journal.append(&event);
                }
                print_event(&event, cli.json);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for handle in handles {
        handle.shutdown();
    }
    Ok(())
}

fn print_event(event: &MonitorEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
        return;
    }
    let summary = event.summary();
    let line = match event.level() {
        EventLevel::Info => summary.normal(),
        EventLevel::Warning => summary.yellow(),
        EventLevel::Error => summary.red().bold(),
    };
    println!("{line}");
}

// ──────────────────── status ────────────────────

fn cmd_status(cli: &Cli, settings: &AppSettings, args: &StatusArgs) -> Result<()> {
    let daemons = selected_daemons(settings, args.daemon.as_ref());
    let multi = daemons.len() > 1;
    for daemon in &daemons {
        let control = DaemonControl::new(cli.daemon_bin.clone(), paths::expand_tilde(daemon));

        if args.raw {
            let output = control.query_output(true);
            if output.is_empty() {
                println!("{}", "daemon is not running".dimmed());
            } else {
                print!("{output}");
            }
            continue;
        }

        let output = control.query_output(false);
        let mut monitor = StatusMonitor::new();
        monitor.apply(&output);
        let record = monitor.record();

        if cli.json {
            println!("{}", serde_json::to_string(record)?);
            continue;
        }
        if multi {
            println!("{}", daemon.bold());
        }
        print_record(record);
    }
    Ok(())
}

fn colored_status(status: SyncStatus) -> colored::ColoredString {
    let label = status.to_string();
    match status {
        SyncStatus::Idle => label.green(),
        SyncStatus::Busy => label.cyan(),
        SyncStatus::Paused => label.yellow(),
        SyncStatus::None => label.dimmed(),
        SyncStatus::NoNet | SyncStatus::Error => label.red(),
    }
}

fn print_record(record: &StatusRecord) {
    print!("Status: {}", colored_status(record.status));
    if record.status == SyncStatus::Busy && !record.progress.is_empty() {
        print!(" {}", record.progress);
    }
    println!();
    println!("Used: {} of {}", record.used, record.total);
    println!("Free: {}, trash: {}", record.free, record.trash);
    if !record.last_synced.is_empty() {
        println!("Last synchronized:");
        for item in &record.last_synced {
            println!("  {item}");
        }
    }
}

// ──────────────────── start / stop ────────────────────

fn cmd_start(cli: &Cli, settings: &AppSettings, args: &SelectArgs) -> Result<()> {
    for daemon in selected_daemons(settings, args.daemon.as_ref()) {
        let control = DaemonControl::new(cli.daemon_bin.clone(), paths::expand_tilde(&daemon));
        match control.start() {
            Ok(()) => println!("{}: {}", daemon, "started".green()),
            Err(SyncwatchError::DaemonStart { kind, output }) => {
                println!("{}: {}", daemon, start_failure_hint(kind).red());
                if !output.trim().is_empty() {
                    println!("  {}", output.trim());
                }
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn start_failure_hint(kind: StartFailureKind) -> String {
    match kind {
        StartFailureKind::NotInstalled => {
            "daemon utility is not installed; install it and retry".to_string()
        }
        StartFailureKind::NoNet => {
            "start failed due to a network/proxy issue; check the connection and retry".to_string()
        }
        StartFailureKind::BadDaemon => "the daemon process failed to come up".to_string(),
        StartFailureKind::NoConfig => {
            "the daemon is not configured (sync directory or auth token missing)".to_string()
        }
        StartFailureKind::Unknown => "start failed for an unrecognized reason".to_string(),
    }
}

fn cmd_stop(cli: &Cli, settings: &AppSettings, args: &SelectArgs) -> Result<()> {
    for daemon in selected_daemons(settings, args.daemon.as_ref()) {
        let control = DaemonControl::new(cli.daemon_bin.clone(), paths::expand_tilde(&daemon));
        if control.stop() {
            println!("{}: {}", daemon, "stopped".green());
        } else {
            println!("{}: {}", daemon, "stop was not acknowledged".yellow());
        }
    }
    Ok(())
}

// ──────────────────── daemons ────────────────────

fn cmd_daemons(settings: &mut AppSettings, action: &DaemonsAction, json: bool) -> Result<()> {
    match action {
        DaemonsAction::Add { path } => {
            if settings.add_daemon(path) {
                if !settings.save() {
                    return Err(SyncwatchError::Runtime {
                        details: "failed to save application config".to_string(),
                    });
                }
                println!("added {path}");
            } else {
                println!("{path} is already tracked");
            }
        }
        DaemonsAction::Remove { path } => {
            if settings.remove_daemon(path) {
                if !settings.save() {
                    return Err(SyncwatchError::Runtime {
                        details: "failed to save application config".to_string(),
                    });
                }
                println!("removed {path}");
            } else {
                println!("{path} is not tracked");
            }
        }
        DaemonsAction::List => {
            let daemons = settings.daemons();
            if json {
                println!("{}", serde_json::to_string(&daemons)?);
            } else if daemons.is_empty() {
                println!("no daemons tracked");
            } else {
                for daemon in daemons {
                    println!("{daemon}");
                }
            }
        }
    }
    Ok(())
}
