//! Application-wide settings backed by the generic store.
//!
//! Stores the tracked daemon config paths plus the indicator-facing toggles
//! (notifications, theme, file-manager extensions). The toggles are consumed
//! by the presentation layer; this crate only persists them.

use std::path::Path;

use tracing::{debug, info};

use crate::config::store::ConfigStore;
use crate::config::value::{MultiValue, Scalar, Value};
use crate::core::paths;

/// Multivalue key listing tracked daemon config paths.
pub const KEY_DAEMONS: &str = "daemons";

/// Typed view over the application's own config file.
#[derive(Debug, Clone)]
pub struct AppSettings {
    store: ConfigStore,
}

impl AppSettings {
    /// Load from `path`, seeding defaults for a fresh installation.
    #[must_use]
    pub fn open(path: impl AsRef<Path>) -> Self {
        let mut store = ConfigStore::open(path.as_ref().to_path_buf());
        if !store.read_ok() {
            info!(path = %path.as_ref().display(), "no application config, assuming first run");
        }
        let seeded = [
            store.seed_default("notifications", Scalar::Bool(true).into()),
            store.seed_default("theme", Scalar::Bool(false).into()),
            store.seed_default("fmextensions", Scalar::Bool(true).into()),
            store.seed_default(
                KEY_DAEMONS,
                Scalar::text(paths::DEFAULT_DAEMON_CONFIG).into(),
            ),
        ];
        if seeded.contains(&true) {
            debug!("application config defaults seeded");
        } else {
            store.set_changed(false);
        }
        Self { store }
    }

    /// Tracked daemon config paths, in list order (tilde not expanded).
    #[must_use]
    pub fn daemons(&self) -> Vec<String> {
        self.store
            .get(KEY_DAEMONS)
            .map(Value::texts)
            .unwrap_or_default()
    }

    /// Track a daemon config path. Returns `false` when already present.
    pub fn add_daemon(&mut self, path: &str) -> bool {
        let item = Scalar::text(path);
        let mut value = self
            .store
            .get(KEY_DAEMONS)
            .cloned()
            .unwrap_or(MultiValue::Empty);
        if value.contains(&item) {
            return false;
        }
        value.add(item);
        self.store.set(KEY_DAEMONS, value);
        true
    }

    /// Stop tracking a daemon config path. Returns `false` when absent.
    pub fn remove_daemon(&mut self, path: &str) -> bool {
        let item = Scalar::text(path);
        let mut value = self
            .store
            .get(KEY_DAEMONS)
            .cloned()
            .unwrap_or(MultiValue::Empty);
        if value.remove(&item).is_err() {
            return false;
        }
        self.store.set(KEY_DAEMONS, value);
        true
    }

    #[must_use]
    pub fn notifications(&self) -> bool {
        self.store.bool_or("notifications", true)
    }

    #[must_use]
    pub fn theme_light(&self) -> bool {
        self.store.bool_or("theme", false)
    }

    #[must_use]
    pub fn fm_extensions(&self) -> bool {
        self.store.bool_or("fmextensions", true)
    }

    pub fn set_notifications(&mut self, on: bool) {
        self.store.set("notifications", Scalar::Bool(on).into());
    }

    /// Persist current settings.
    pub fn save(&mut self) -> bool {
        self.store.save()
    }

    /// Underlying store.
    #[must_use]
    pub const fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Mutable underlying store.
    pub fn store_mut(&mut self) -> &mut ConfigStore {
        &mut self.store
    }
}

// ──────────────────── tests ────────────────────
