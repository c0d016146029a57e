//! Change flags produced by one parse cycle.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What changed between two consecutive parses.
///
/// Produced fresh every cycle and never retained. `progress` is tracked
/// separately from `status` so progress ticks during `busy` do not re-fire
/// start/stop handling upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Canonical status changed.
    pub status: bool,
    /// Sync progress text changed.
    pub progress: bool,
    /// Any of the total/used/free/trash sizes changed.
    pub size: bool,
    /// The synchronized-items list changed.
    pub list: bool,
    /// This is the initial event after (re)initialization.
    pub initial: bool,
}

impl ChangeEvent {
    /// Truthiness contract: at least one flag set.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.status || self.progress || self.size || self.list || self.initial
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.status {
            parts.push("status");
        }
        if self.progress {
            parts.push("progress");
        }
        if self.size {
            parts.push("size");
        }
        if self.list {
            parts.push("list");
        }
        if self.initial {
            parts.push("initial");
        }
        write!(f, "{{{}}}", parts.join(", "))
    }
}
