use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_syncwatch") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) {
        "syncwatch.exe"
    } else {
        "syncwatch"
    };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve syncwatch binary path for integration test"),
    }
}

pub fn run_cli(args: &[&str]) -> CmdResult {
    let bin_path = resolve_bin_path();
    let output = Command::new(&bin_path)
        .args(args)
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute syncwatch command");

    CmdResult {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

/// A daemon config + executable fake daemon script whose status output is
/// whatever the test writes into the state file.
pub struct FakeDaemon {
    pub dir: tempfile::TempDir,
    pub config_path: PathBuf,
    pub state_path: PathBuf,
    pub script_path: PathBuf,
    pub sync_log: PathBuf,
}

#[cfg(unix)]
pub fn fake_daemon(auto_start: bool) -> FakeDaemon {
    let dir = tempfile::tempdir().expect("create temp dir");
    let sync_dir = dir.path().join("sync");
    fs::create_dir_all(sync_dir.join(".sync")).expect("create sync dir");
    let sync_log = sync_dir.join(".sync/cli.log");
    fs::write(&sync_log, "log\n").expect("seed sync log");
    let auth = dir.path().join("passwd");
    fs::write(&auth, "token").expect("seed auth file");

    let state_path = dir.path().join("state.txt");
    fs::write(&state_path, "").expect("seed state file");

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
    .expect("write daemon config");

    let script_path = dir.path().join("fake-daemon");
    write_script(
        &script_path,
        &format!(
            "case \"$3\" in\n\
             status) cat '{state}' ;;\n\
             start) echo 'Starting daemon process...done' ;;\n\
             stop) echo 'Daemon stopped.'; : > '{state}' ;;\n\
             esac",
            state = state_path.display()
        ),
    );

    FakeDaemon {
        dir,
        config_path,
        state_path,
        script_path,
        sync_log,
    }
}

#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod script");
}
