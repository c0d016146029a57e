//! Dual-trigger poll scheduling: backoff timer state shared by both triggers.
//!
//! The periodic timer backs off while nothing happens; a filesystem-watch
//! trigger (or a manual re-diff) snaps it back to the base interval. Status
//! `busy` pins the fast interval regardless of trigger source.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::monitor::status::SyncStatus;

/// Tuning knobs for the dual-trigger scheduler.
///
/// The backoff shape (base + step × min(n, max_steps), capped) mirrors the
/// historical polling behavior; all of it is configuration, not invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Base poll interval in milliseconds.
    pub base_interval_ms: u64,
    /// Backoff increment per stagnant timer cycle.
    pub step_ms: u64,
    /// Number of backoff steps before the interval stops growing.
    pub max_steps: u32,
    /// Hard ceiling for the poll interval.
    pub cap_ms: u64,
    /// Granularity of the sync-log modification watch; also the minimum
    /// spacing between watch-triggered cycles (debounce).
    pub watch_poll_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 2_000,
            step_ms: 1_000,
            max_steps: 8,
            cap_ms: 10_000,
            watch_poll_ms: 700,
        }
    }
}

impl SchedulerConfig {
    /// Base interval as a [`Duration`].
    #[must_use]
    pub const fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms)
    }

    /// Watch granularity as a [`Duration`].
    #[must_use]
    pub const fn watch_poll(&self) -> Duration {
        Duration::from_millis(self.watch_poll_ms)
    }
}

/// Which trigger caused a re-parse cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The periodic backoff timer fired.
    Timer,
    /// The sync-log modification watch fired.
    Watch,
    /// A forced re-diff (e.g. right after a daemon stop).
    Manual,
}

/// Backoff state for one daemon instance.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    config: SchedulerConfig,
    stagnation: u32,
    interval: Duration,
}

impl PollScheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        let interval = config.base_interval();
        Self {
            config,
            stagnation: 0,
            interval,
        }
    }

    /// Current poll interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Stagnant timer cycles since the last reset.
    #[must_use]
    pub const fn stagnation(&self) -> u32 {
        self.stagnation
    }

    /// The scheduler's configuration.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Back to the base interval with a clear stagnation counter.
    pub fn reset(&mut self) {
        self.interval = self.config.base_interval();
        self.stagnation = 0;
    }

    /// Account for a completed cycle and update the next interval.
    ///
    /// Watch and manual triggers reset the backoff. Timer triggers grow the
    /// interval while the status stagnates — unless the daemon is `busy`,
    /// which always keeps the fast base interval.
    pub fn note_cycle(&mut self, trigger: Trigger, status: SyncStatus) {
        if status == SyncStatus::Busy {
            self.reset();
            return;
        }
        match trigger {
            Trigger::Watch | Trigger::Manual => self.reset(),
            Trigger::Timer => {
                let steps = u64::from(self.stagnation.min(self.config.max_steps));
                let grown = self
                    .config
                    .base_interval_ms
                    .saturating_add(self.config.step_ms.saturating_mul(steps))
                    .min(self.config.cap_ms);
                self.interval = Duration::from_millis(grown);
                if self.stagnation <= self.config.max_steps {
                    self.stagnation += 1;
                }
            }
        }
    }
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn defaults_match_historical_tuning() {
        let config = SchedulerConfig::default();
        assert_eq!(config.base_interval(), ms(2_000));
        assert_eq!(config.step_ms, 1_000);
        assert_eq!(config.max_steps, 8);
        assert_eq!(config.cap_ms, 10_000);
        assert_eq!(config.watch_poll(), ms(700));
    }

    #[test]
    fn idle_timer_cycles_back_off_monotonically_to_cap() {
        let mut scheduler = PollScheduler::new(SchedulerConfig::default());
        let mut last = Duration::ZERO;
        let mut seen = Vec::new();
        for _ in 0..12 {
            scheduler.note_cycle(Trigger::Timer, SyncStatus::Idle);
            let interval = scheduler.interval();
            assert!(interval >= last, "interval must grow monotonically");
            last = interval;
            seen.push(interval.as_millis() as u64);
        }
        assert_eq!(seen[0], 2_000);
        assert_eq!(seen[1], 3_000);
        assert_eq!(seen[2], 4_000);
        assert_eq!(*seen.last().unwrap(), 10_000, "capped at the ceiling");
    }

    #[test]
    fn three_stagnant_cycles_grow_the_interval() {
        let mut scheduler = PollScheduler::new(SchedulerConfig::default());
        scheduler.note_cycle(Trigger::Timer, SyncStatus::Idle);
        scheduler.note_cycle(Trigger::Timer, SyncStatus::Idle);
        scheduler.note_cycle(Trigger::Timer, SyncStatus::Idle);
        assert_eq!(scheduler.interval(), ms(4_000));
    }

    #[test]
    fn watch_trigger_resets_backoff() {
        let mut scheduler = PollScheduler::new(SchedulerConfig::default());
        for _ in 0..5 {
            scheduler.note_cycle(Trigger::Timer, SyncStatus::Idle);
        }
        assert!(scheduler.interval() > ms(2_000));

        scheduler.note_cycle(Trigger::Watch, SyncStatus::Idle);
        assert_eq!(scheduler.interval(), ms(2_000));
        assert_eq!(scheduler.stagnation(), 0);
    }

    #[test]
    fn manual_trigger_resets_like_watch() {
        let mut scheduler = PollScheduler::new(SchedulerConfig::default());
        scheduler.note_cycle(Trigger::Timer, SyncStatus::Idle);
        scheduler.note_cycle(Trigger::Timer, SyncStatus::Idle);
        scheduler.note_cycle(Trigger::Manual, SyncStatus::None);
        assert_eq!(scheduler.interval(), ms(2_000));
    }

    #[test]
    fn busy_pins_base_interval_on_any_trigger() {
        let mut scheduler = PollScheduler::new(SchedulerConfig::default());
        for _ in 0..5 {
            scheduler.note_cycle(Trigger::Timer, SyncStatus::Idle);
        }
        scheduler.note_cycle(Trigger::Timer, SyncStatus::Busy);
        assert_eq!(scheduler.interval(), ms(2_000));

        // Stays pinned while busy.
        scheduler.note_cycle(Trigger::Timer, SyncStatus::Busy);
        assert_eq!(scheduler.interval(), ms(2_000));
    }

    #[test]
    fn backoff_resumes_after_busy_ends() {
        let mut scheduler = PollScheduler::new(SchedulerConfig::default());
        scheduler.note_cycle(Trigger::Timer, SyncStatus::Busy);
        scheduler.note_cycle(Trigger::Timer, SyncStatus::Idle);
        assert_eq!(scheduler.interval(), ms(2_000));
        scheduler.note_cycle(Trigger::Timer, SyncStatus::Idle);
        assert_eq!(scheduler.interval(), ms(3_000));
    }

    #[test]
    fn custom_tuning_is_respected() {
        let config = SchedulerConfig {
            base_interval_ms: 100,
            step_ms: 50,
            max_steps: 2,
            cap_ms: 180,
            watch_poll_ms: 10,
        };
        let mut scheduler = PollScheduler::new(config);
        scheduler.note_cycle(Trigger::Timer, SyncStatus::Idle); // 100
        scheduler.note_cycle(Trigger::Timer, SyncStatus::Idle); // 150
        scheduler.note_cycle(Trigger::Timer, SyncStatus::Idle); // 200 -> cap 180
        assert_eq!(scheduler.interval(), ms(180));
        scheduler.note_cycle(Trigger::Timer, SyncStatus::Idle);
        assert_eq!(scheduler.interval(), ms(180));
    }
}
