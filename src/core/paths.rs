//! Well-known paths: application config dir, daemon sync log, tilde expansion.

use std::path::PathBuf;

/// Application directory name under the user config root.
pub const APP_DIR: &str = "syncwatch";

/// Application config file name inside [`APP_DIR`].
pub const APP_CONFIG_FILE: &str = "syncwatch.conf";

/// Default daemon config path seeded into a fresh application config.
pub const DEFAULT_DAEMON_CONFIG: &str = "~/.config/yandex-disk/config.cfg";

/// Relative path of the daemon's internal sync log under its sync directory.
/// This is the file the modification watch is armed on.
pub const DAEMON_LOG_RELATIVE: &str = ".sync/cli.log";

/// Expand a leading `~` to the user's home directory.
///
/// Paths without a leading `~` are returned unchanged. If the home directory
/// cannot be determined the `~` is left literal (and will simply fail any
/// later existence check).
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// The application configuration directory (`$XDG_CONFIG_HOME/syncwatch`).
///
/// Falls back to a relative `.syncwatch` when no config root can be resolved.
#[must_use]
pub fn app_config_dir() -> PathBuf {
    dirs::config_dir().map_or_else(|| PathBuf::from(".syncwatch"), |dir| dir.join(APP_DIR))
}

/// Full path of the application's own config file.
#[must_use]
pub fn app_config_file() -> PathBuf {
    app_config_dir().join(APP_CONFIG_FILE)
}

/// Full path of the single-instance pid lock file.
#[must_use]
pub fn lock_file() -> PathBuf {
    app_config_dir().join("pid")
}

/// Path of the daemon's internal sync log for a given sync directory setting
/// (as written in the daemon config, `~` allowed).
#[must_use]
pub fn daemon_log_path(sync_dir: &str) -> PathBuf {
    expand_tilde(sync_dir).join(DAEMON_LOG_RELATIVE)
}

/// Best-effort check that a config-file path setting points at something real.
#[must_use]
pub fn setting_path_exists(setting: &str) -> bool {
    !setting.is_empty() && expand_tilde(setting).exists()
}
