//! Daemon-variant config store.
//!
//! The sync daemon's own config file speaks a slightly different dialect than
//! the in-memory view: `read-only`/`overwrite` are presence flags whose value
//! is an empty quoted string, and `exclude-dirs` may arrive either as a bare
//! comma-separated list or as one quoted `"a,b,c"` blob. This wrapper
//! translates both directions on load/save and seeds defaults for keys that
//! older daemon config files predate.

use std::path::Path;

use tracing::debug;

use crate::config::store::{ConfigStore, parse_list};
use crate::config::value::{MultiValue, Scalar, Value};
use crate::core::paths;

/// Per-instance start policy key (seeded when missing).
pub const KEY_START_ON_LAUNCH: &str = "startonstartofindicator";
/// Per-instance stop-on-exit policy key (seeded when missing).
pub const KEY_STOP_ON_EXIT: &str = "stoponexitfromindicator";

const KEY_READ_ONLY: &str = "read-only";
const KEY_OVERWRITE: &str = "overwrite";
const KEY_EXCLUDE_DIRS: &str = "exclude-dirs";

/// A [`ConfigStore`] over the daemon's native config file.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    store: ConfigStore,
}

impl DaemonConfig {
    /// Bind to a daemon config file and load it.
    #[must_use]
    pub fn open(path: impl AsRef<Path>) -> Self {
        let mut config = Self {
            store: ConfigStore::new(path.as_ref().to_path_buf()),
        };
        config.load();
        config
    }

    /// (Re)load and translate. Returns `false` when the file is unreadable.
    pub fn load(&mut self) -> bool {
        if !self.store.load() {
            return false;
        }

        // Presence flags: `read-only=""` in the file means "on".
        let read_only = self.flag_present(KEY_READ_ONLY);
        self.store.set(KEY_READ_ONLY, Scalar::Bool(read_only).into());
        let overwrite = self.flag_present(KEY_OVERWRITE);
        self.store.set(KEY_OVERWRITE, Scalar::Bool(overwrite).into());

        // Keys introduced after older daemon config files were written.
        self.store
            .seed_default(KEY_START_ON_LAUNCH, Scalar::Bool(true).into());
        self.store
            .seed_default(KEY_STOP_ON_EXIT, Scalar::Bool(false).into());
        self.store.seed_default(KEY_EXCLUDE_DIRS, MultiValue::Empty);

        // A quoted "a,b,c" exclude list needs a second tokenizer pass; the
        // unquoted form already arrived as a list.
        if let Some(blob) = self.store.text(KEY_EXCLUDE_DIRS).map(ToString::to_string) {
            let aliases = self.store.options.aliases.clone();
            if let Ok(list) = parse_list(&blob, &aliases) {
                self.store.set(KEY_EXCLUDE_DIRS, list);
            }
        }

        self.store.set_changed(false);
        debug!(path = %self.store.path().display(), "daemon config loaded");
        true
    }

    /// Translate back to the daemon dialect and save.
    ///
    /// Works on a fresh file-view copy so the in-memory booleans stay typed.
    pub fn save(&mut self) -> bool {
        let mut file_view = ConfigStore::new(self.store.path().to_path_buf());
        for (key, value) in self.store.entries() {
            file_view.set(key, value.clone());
        }

        let read_only = self.read_only();
        file_view.set(KEY_READ_ONLY, presence(read_only));
        file_view.set(KEY_OVERWRITE, presence(self.overwrite() && read_only));

        let dirs = self.exclude_dirs().texts();
        if !dirs.is_empty() {
            file_view.set(KEY_EXCLUDE_DIRS, Scalar::text(dirs.join(",")).into());
        }

        let ok = file_view.save();
        if ok {
            self.store.set_changed(false);
        }
        ok
    }

    fn flag_present(&self, key: &str) -> bool {
        self.store.get(key).is_some_and(|v| match v {
            MultiValue::Single(Scalar::Text(s)) => s.is_empty(),
            MultiValue::Single(Scalar::Bool(b)) => *b,
            _ => false,
        })
    }

    // ──────────────────── typed accessors ────────────────────

    /// The sync directory setting, as written (tilde not expanded).
    #[must_use]
    pub fn dir(&self) -> Option<&str> {
        self.store.text("dir")
    }

    /// The auth token file setting.
    #[must_use]
    pub fn auth(&self) -> Option<&str> {
        self.store.text("auth")
    }

    #[must_use]
    pub fn read_only(&self) -> bool {
        self.store.bool_or(KEY_READ_ONLY, false)
    }

    #[must_use]
    pub fn overwrite(&self) -> bool {
        self.store.bool_or(KEY_OVERWRITE, false)
    }

    /// Excluded directory list (possibly `Empty`).
    #[must_use]
    pub fn exclude_dirs(&self) -> Value {
        self.store
            .get(KEY_EXCLUDE_DIRS)
            .cloned()
            .unwrap_or(MultiValue::Empty)
    }

    #[must_use]
    pub fn start_on_launch(&self) -> bool {
        self.store.bool_or(KEY_START_ON_LAUNCH, true)
    }

    #[must_use]
    pub fn stop_on_exit(&self) -> bool {
        self.store.bool_or(KEY_STOP_ON_EXIT, false)
    }

    /// Whether the daemon is usable: both the sync dir and the auth file the
    /// config points at actually exist.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.dir().is_some_and(paths::setting_path_exists)
            && self.auth().is_some_and(paths::setting_path_exists)
    }

    pub fn set_read_only(&mut self, on: bool) {
        self.store.set(KEY_READ_ONLY, Scalar::Bool(on).into());
    }

    pub fn set_overwrite(&mut self, on: bool) {
        self.store.set(KEY_OVERWRITE, Scalar::Bool(on).into());
    }

    pub fn set_exclude_dirs(&mut self, dirs: Value) {
        self.store.set(KEY_EXCLUDE_DIRS, dirs);
    }

    /// Underlying store (path, changed flag, raw entries).
    #[must_use]
    pub const fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Mutable underlying store for callers adjusting untyped keys.
    pub fn store_mut(&mut self) -> &mut ConfigStore {
        &mut self.store
    }
}

fn presence(on: bool) -> Value {
    if on {
        MultiValue::Single(Scalar::Text(String::new()))
    } else {
        MultiValue::Empty
    }
}

// ──────────────────── tests ────────────────────
