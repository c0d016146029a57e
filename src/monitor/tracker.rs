//! Status record ownership and cycle-to-cycle diffing.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::monitor::event::ChangeEvent;
use crate::monitor::parser::{
    self, LABEL_FREE, LABEL_PROGRESS, LABEL_STATUS, LABEL_TOTAL, LABEL_TRASH, LABEL_USED,
};
use crate::monitor::status::SyncStatus;

/// Placeholder written into size fields the daemon reported empty.
pub const SIZE_PLACEHOLDER: &str = "...";

/// Normalized snapshot of one daemon's reported state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Current canonical status.
    pub status: SyncStatus,
    /// Status from the previous parse cycle.
    pub last_status: SyncStatus,
    /// Progress text, possibly empty outside `busy`.
    pub progress: String,
    /// Total cloud space.
    pub total: String,
    /// Used cloud space.
    pub used: String,
    /// Available cloud space.
    pub free: String,
    /// Trash size.
    pub trash: String,
    /// Recently synchronized paths, most recent first, replaced wholesale.
    pub last_synced: Vec<String>,
}

impl Default for StatusRecord {
    fn default() -> Self {
        Self {
            status: SyncStatus::None,
            last_status: SyncStatus::None,
            progress: String::new(),
            total: SIZE_PLACEHOLDER.to_string(),
            used: SIZE_PLACEHOLDER.to_string(),
            free: SIZE_PLACEHOLDER.to_string(),
            trash: SIZE_PLACEHOLDER.to_string(),
            last_synced: Vec::new(),
        }
    }
}

/// Owns the [`StatusRecord`] for one daemon and diffs each new parse against
/// it. Exactly one writer; readers get snapshots or shared references on the
/// same loop.
#[derive(Debug, Clone, Default)]
pub struct StatusMonitor {
    record: StatusRecord,
}

impl StatusMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current record.
    #[must_use]
    pub const fn record(&self) -> &StatusRecord {
        &self.record
    }

    /// Drop back to the default record (used on daemon restart).
    pub fn reset(&mut self) {
        self.record = StatusRecord::default();
    }

    /// After an initial parse the previous status is unknown; adopt the
    /// current one so the first diff does not invent a transition.
    pub fn align_last_status(&mut self) {
        self.record.last_status = self.record.status;
    }

    /// Pin status/previous to a well-known transitional pair. Used right
    /// after a successful daemon start (`paused`/`none`) so the next real
    /// status cannot be misread as an `index`-style no-op.
    pub fn force_status(&mut self, status: SyncStatus, last: SyncStatus) {
        self.record.status = status;
        self.record.last_status = last;
    }

    /// Parse raw status output, update every field, and report what changed.
    ///
    /// `last_status` is set to the pre-parse status on every call, changed or
    /// not. Returns a fresh [`ChangeEvent`]; truthy iff any field moved.
    pub fn apply(&mut self, output: &str) -> ChangeEvent {
        let parsed = parser::parse_output(output);
        let mut event = ChangeEvent::default();

        // Status first: normalization needs the previous value.
        self.record.last_status = self.record.status;
        let status = SyncStatus::normalize(parsed.field(LABEL_STATUS), self.record.last_status);
        if status != self.record.status {
            self.record.status = status;
            event.status = true;
        }

        // Progress is allowed to be empty.
        let progress = parsed.field(LABEL_PROGRESS);
        if progress != self.record.progress {
            self.record.progress = progress.to_string();
            event.progress = true;
        }

        // Size fields fall back to a placeholder when empty.
        for (label, slot) in [
            (LABEL_TOTAL, &mut self.record.total),
            (LABEL_USED, &mut self.record.used),
            (LABEL_FREE, &mut self.record.free),
            (LABEL_TRASH, &mut self.record.trash),
        ] {
            let mut value = parsed.field(label);
            if value.is_empty() {
                value = SIZE_PLACEHOLDER;
            }
            if *slot != value {
                *slot = value.to_string();
                event.size = true;
            }
        }

        // Item list replaces wholesale, no merging.
        if parsed.items != self.record.last_synced {
            self.record.last_synced = parsed.items;
            event.list = true;
        }

        trace!(change = %event, status = %self.record.status, "parse cycle applied");
        event
    }
}

// ──────────────────── tests ────────────────────
