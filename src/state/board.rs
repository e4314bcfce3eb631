//! The whole competition board: pads, global windows, schedule and stats.

use std::collections::{BTreeMap, VecDeque};

use indexmap::IndexMap;
use uuid::Uuid;

use super::clock::EventClock;
use super::pad::{Notice, Pad, PadId, Team, TimerCtx};

/// Samples kept per rolling cycle-time bucket.
pub const STAT_WINDOW: usize = 10;

/// Hard ceiling on the number of pads a board can hold.
pub const MAX_PADS: usize = 64;

/// Global pause window covering every pad at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalBreak {
    /// Virtual instant the break began.
    pub started_at: i64,
    /// Virtual instant the break ends.
    pub until: i64,
    /// Operator-supplied reason, if any.
    pub reason: Option<String>,
}

/// One planned block in the event schedule. Times are wall-clock epoch
/// milliseconds; the schedule is not affected by event pauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// Server-assigned identifier.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Planned start, epoch ms.
    pub starts_at: i64,
    /// Planned end, epoch ms.
    pub ends_at: i64,
    /// Pad this block applies to, or `None` for the whole event.
    pub pad_id: Option<PadId>,
}

/// Rolling average over the most recent cycle-time samples of one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RollingStat {
    samples: VecDeque<i64>,
    /// Lifetime number of samples recorded into this bucket.
    pub count: u64,
}

impl RollingStat {
    /// Record one sample, evicting the oldest beyond [`STAT_WINDOW`].
    pub fn record(&mut self, sample_ms: i64) {
        self.samples.push_back(sample_ms);
        while self.samples.len() > STAT_WINDOW {
            self.samples.pop_front();
        }
        self.count += 1;
    }

    /// Average of the retained window, or `None` before the first sample.
    pub fn average_ms(&self) -> Option<i64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: i64 = self.samples.iter().sum();
        Some(sum / self.samples.len() as i64)
    }
}

/// Cycle-time statistics grouped by pad, pad label and competitor category.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CycleStats {
    /// Buckets keyed by pad number.
    pub per_pad: BTreeMap<PadId, RollingStat>,
    /// Buckets keyed by pad label.
    pub per_label: BTreeMap<String, RollingStat>,
    /// Buckets keyed by competitor category.
    pub per_category: BTreeMap<String, RollingStat>,
}

impl CycleStats {
    /// Record one sample into every bucket it belongs to.
    pub fn record(
        &mut self,
        pad_id: PadId,
        label: Option<&str>,
        category: Option<&str>,
        sample_ms: i64,
    ) {
        self.per_pad.entry(pad_id).or_default().record(sample_ms);
        if let Some(label) = label {
            self.per_label
                .entry(label.to_owned())
                .or_default()
                .record(sample_ms);
        }
        if let Some(category) = category {
            self.per_category
                .entry(category.to_owned())
                .or_default()
                .record(sample_ms);
        }
    }
}

/// Root of the synchronized state: every pad plus the board-wide fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    /// Pads keyed by number, kept sorted for display.
    pub pads: IndexMap<PadId, Pad>,
    /// Wall-clock instant of the last mutation, epoch ms.
    pub updated_at: i64,
    /// Next pad number handed out by [`Board::create_pad`].
    pub next_pad_id: PadId,
    /// Active global break window, if any.
    pub global_break: Option<GlobalBreak>,
    /// Board-wide operator notice, if any.
    pub global_notice: Option<Notice>,
    /// Planned schedule blocks, in insertion order.
    pub schedule: Vec<ScheduleEntry>,
    /// Rolling cycle-time statistics.
    pub stats: CycleStats,
    /// Event lifecycle clock.
    pub event: EventClock,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Empty board in planning state.
    pub fn new() -> Self {
        Self {
            pads: IndexMap::new(),
            updated_at: 0,
            next_pad_id: 1,
            global_break: None,
            global_notice: None,
            schedule: Vec::new(),
            stats: CycleStats::default(),
            event: EventClock::default(),
        }
    }

    /// Timer context for queue operations at the given wall instant.
    pub fn timer_ctx(&self, wall_ms: i64, report_window_ms: i64) -> TimerCtx {
        let vnow = self.event.virtual_now(wall_ms);
        TimerCtx {
            vnow,
            timers_allowed: self.event.timers_allowed(),
            global_break: self.global_break_active(vnow),
            report_window_ms,
        }
    }

    /// Whether a global break window covers the board at `vnow`.
    pub fn global_break_active(&self, vnow: i64) -> bool {
        self.global_break
            .as_ref()
            .is_some_and(|brk| brk.until > vnow)
    }

    /// Create a pad with the next free number.
    pub fn create_pad(&mut self, name: Option<String>) -> PadId {
        let id = self.next_pad_id;
        let name = name.unwrap_or_else(|| format!("Pad {id}"));
        self.pads.insert(id, Pad::new(id, name));
        self.next_pad_id = id + 1;
        id
    }

    /// Fetch a pad by number, creating it when absent.
    pub fn pad_or_create(&mut self, id: PadId) -> &mut Pad {
        if id >= self.next_pad_id {
            self.next_pad_id = id + 1;
        }
        self.pads
            .entry(id)
            .or_insert_with(|| Pad::new(id, format!("Pad {id}")))
    }

    /// Make sure pads `1..=upto` all exist. Returns how many were created.
    pub fn ensure_range(&mut self, upto: PadId) -> u32 {
        let mut created = 0;
        for id in 1..=upto {
            if !self.pads.contains_key(&id) {
                self.pad_or_create(id);
                created += 1;
            }
        }
        created
    }

    /// Remove a pad entirely. Returns `false` when the number is unknown.
    pub fn delete_pad(&mut self, id: PadId) -> bool {
        self.pads.shift_remove(&id).is_some()
    }

    /// Record a finished cycle into the stats buckets of a pad.
    pub fn record_cycle(&mut self, pad_id: PadId, finished: &Team, sample_ms: i64) {
        let label = self
            .pads
            .get(&pad_id)
            .and_then(|pad| pad.label.clone());
        self.stats.record(
            pad_id,
            label.as_deref(),
            finished.category.as_deref(),
            sample_ms,
        );
    }

    /// Repair derived state across the whole board.
    ///
    /// Expires finished global windows, lets every pad drop stale stamps
    /// and recreate missing deadlines, and keeps the pad order sorted by
    /// number. Runs after every mutation and before every snapshot that
    /// leaves the process.
    pub fn sanitize(&mut self, wall_ms: i64, report_window_ms: i64) {
        let vnow = self.event.virtual_now(wall_ms);
        if self
            .global_break
            .as_ref()
            .is_some_and(|brk| brk.until <= vnow)
        {
            self.global_break = None;
        }
        if self
            .global_notice
            .as_ref()
            .is_some_and(|notice| notice.until.is_some_and(|until| until <= vnow))
        {
            self.global_notice = None;
        }

        let ctx = TimerCtx {
            vnow,
            timers_allowed: self.event.timers_allowed(),
            global_break: self.global_break.is_some(),
            report_window_ms,
        };
        for pad in self.pads.values_mut() {
            pad.sanitize(&ctx);
        }
        self.pads.sort_unstable_keys();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::pad::{InsertSlot, PadStatus};

    const WINDOW: i64 = 300_000;

    fn team(id: &str, category: Option<&str>) -> Team {
        Team {
            id: id.to_owned(),
            name: format!("Team {id}"),
            unit: None,
            category: category.map(str::to_owned),
            division: None,
            tag: None,
        }
    }

    #[test]
    fn pad_numbers_are_stable_and_sorted() {
        let mut board = Board::new();
        board.pad_or_create(3);
        board.pad_or_create(1);
        assert_eq!(board.create_pad(None), 4);
        board.sanitize(0, WINDOW);

        let ids: Vec<_> = board.pads.keys().copied().collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert_eq!(board.pads[&4].name, "Pad 4");
    }

    #[test]
    fn ensure_range_fills_the_gaps_only() {
        let mut board = Board::new();
        board.pad_or_create(2);
        assert_eq!(board.ensure_range(4), 3);
        assert_eq!(board.pads.len(), 4);
        assert_eq!(board.ensure_range(4), 0);
    }

    #[test]
    fn deleting_a_pad_does_not_recycle_its_number() {
        let mut board = Board::new();
        board.create_pad(None);
        board.create_pad(None);
        assert!(board.delete_pad(1));
        assert!(!board.delete_pad(1));
        assert_eq!(board.create_pad(None), 3);
    }

    #[test]
    fn expired_global_windows_fall_away() {
        let mut board = Board::new();
        board.event.start(0);
        board.global_break = Some(GlobalBreak {
            started_at: 0,
            until: 10_000,
            reason: None,
        });
        board.global_notice = Some(Notice {
            text: "doors open".to_owned(),
            until: Some(5_000),
        });

        board.sanitize(4_000, WINDOW);
        assert!(board.global_break.is_some());
        assert!(board.global_notice.is_some());

        board.sanitize(10_000, WINDOW);
        assert!(board.global_break.is_none());
        assert!(board.global_notice.is_none());
    }

    #[test]
    fn global_break_suppresses_every_report_deadline() {
        let mut board = Board::new();
        board.event.start(0);
        for id in 1..=2 {
            let ctx = board.timer_ctx(1_000, WINDOW);
            board
                .pad_or_create(id)
                .insert(team(&format!("t{id}"), None), InsertSlot::Now, &ctx);
        }
        board.sanitize(1_000, WINDOW);
        assert!(board.pads[&1].report_by_deadline_at.is_some());

        board.global_break = Some(GlobalBreak {
            started_at: 2_000,
            until: 900_000,
            reason: Some("lunch".to_owned()),
        });
        board.sanitize(2_000, WINDOW);

        for pad in board.pads.values() {
            assert!(pad.report_by_deadline_at.is_none());
            assert_eq!(pad.status, PadStatus::Break);
        }

        // Once the window lapses the deadlines come back with full length.
        board.sanitize(900_000, WINDOW);
        for pad in board.pads.values() {
            assert_eq!(pad.report_by_deadline_at, Some(900_000 + WINDOW));
            assert_eq!(pad.status, PadStatus::Reporting);
        }
    }

    #[test]
    fn cycle_stats_group_by_pad_label_and_category() {
        let mut board = Board::new();
        board.pad_or_create(1).label = Some("North".to_owned());
        board.record_cycle(1, &team("a", Some("Senior")), 60_000);
        board.record_cycle(1, &team("b", Some("Senior")), 120_000);
        board.record_cycle(1, &team("c", None), 30_000);

        assert_eq!(board.stats.per_pad[&1].average_ms(), Some(70_000));
        assert_eq!(board.stats.per_pad[&1].count, 3);
        assert_eq!(board.stats.per_label["North"].count, 3);
        assert_eq!(board.stats.per_category["Senior"].average_ms(), Some(90_000));
        assert!(!board.stats.per_category.contains_key(""));
    }

    #[test]
    fn rolling_window_evicts_the_oldest_samples() {
        let mut stat = RollingStat::default();
        for sample in 0..STAT_WINDOW as i64 + 5 {
            stat.record(sample * 1_000);
        }
        assert_eq!(stat.count, STAT_WINDOW as u64 + 5);
        // Only the newest STAT_WINDOW samples shape the average.
        let expected: i64 = (5..STAT_WINDOW as i64 + 5).map(|s| s * 1_000).sum::<i64>()
            / STAT_WINDOW as i64;
        assert_eq!(stat.average_ms(), Some(expected));
    }

    #[test]
    fn timer_ctx_reflects_pause_and_break_state() {
        let mut board = Board::new();
        board.event.start(0);
        board.event.pause(30_000);
        board.global_break = Some(GlobalBreak {
            started_at: 0,
            until: 60_000,
            reason: None,
        });

        let ctx = board.timer_ctx(45_000, WINDOW);
        assert_eq!(ctx.vnow, 30_000);
        assert!(ctx.timers_allowed);
        assert!(ctx.global_break);
    }
}
