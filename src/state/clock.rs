//! Event-wide virtual clock: pause/resume accounting and timer windows.
//!
//! Every timer field on the board (report deadlines, break windows, run
//! clocks) is stored in virtual milliseconds produced by [`EventClock`], so
//! pausing the event freezes every countdown at once without rewriting any
//! stored deadline.

use std::time::{SystemTime, UNIX_EPOCH};

/// Report window granted to a competitor called to a pad, in milliseconds.
pub const DEFAULT_REPORT_WINDOW_MS: i64 = 5 * 60 * 1_000;

/// Lifecycle status of the event itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventStatus {
    /// Rosters can be loaded and pads arranged; no report timers run.
    #[default]
    Planning,
    /// The event is underway and report timers may be created.
    Live,
}

/// Pause-aware clock shared by the whole event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventClock {
    /// Whether the event is live or still being planned.
    pub status: EventStatus,
    /// Wall-clock instant (epoch ms) the event went live.
    pub start_at: Option<i64>,
    /// Wall-clock instant of the pause currently in effect, if any.
    pub paused_at: Option<i64>,
    /// Total paused duration accumulated so far; never decreases.
    pub paused_accum_ms: i64,
}

impl EventClock {
    /// Virtual "now" for timer math: wall time minus accumulated pauses,
    /// frozen at the pause instant while a pause is in effect.
    pub fn virtual_now(&self, wall_ms: i64) -> i64 {
        match self.paused_at {
            Some(paused_at) => paused_at - self.paused_accum_ms,
            None => wall_ms - self.paused_accum_ms,
        }
    }

    /// Whether report timers may exist right now.
    ///
    /// Planning never creates timers; going live is the only trigger that
    /// allows them to be (re)created.
    pub fn timers_allowed(&self) -> bool {
        self.status == EventStatus::Live
    }

    /// Whether the event clock is currently frozen by a pause.
    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Mark the event live, stamping the start instant.
    ///
    /// Returns `false` (no-op) when the event is already live.
    pub fn start(&mut self, wall_ms: i64) -> bool {
        if self.status == EventStatus::Live {
            return false;
        }
        self.status = EventStatus::Live;
        self.start_at = Some(wall_ms);
        true
    }

    /// Freeze the clock. Returns `false` when not live or already paused.
    pub fn pause(&mut self, wall_ms: i64) -> bool {
        if self.status != EventStatus::Live || self.paused_at.is_some() {
            return false;
        }
        self.paused_at = Some(wall_ms);
        true
    }

    /// Unfreeze the clock, folding the pause into the accumulator.
    ///
    /// Returns `false` when no pause is in effect.
    pub fn resume(&mut self, wall_ms: i64) -> bool {
        let Some(paused_at) = self.paused_at.take() else {
            return false;
        };
        // A resume stamped earlier than its pause would shrink the
        // accumulator; clamp so it only ever grows.
        self.paused_accum_ms += (wall_ms - paused_at).max(0);
        true
    }

    /// Drop back to planning, resetting the clock for a fresh run.
    ///
    /// Returns `false` (no-op) when already planning.
    pub fn set_planning(&mut self) -> bool {
        if self.status == EventStatus::Planning {
            return false;
        }
        *self = Self::default();
        true
    }
}

/// Current wall-clock time as epoch milliseconds.
pub fn wall_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
