//! Per-pad competitor queue and the pure operations that rearrange it.
//!
//! A pad holds at most one competitor in each of the `now` and `on_deck`
//! slots plus an ordered `standby` list. Every mutation here is pure over
//! a [`TimerCtx`] so the queue logic can be tested without a running event.

/// Identifier of a pad. Pads are numbered from 1.
pub type PadId = u32;

/// Smallest cycle-time sample worth recording, in milliseconds.
pub const CYCLE_SAMPLE_MIN_MS: i64 = 10_000;
/// Largest cycle-time sample worth recording, in milliseconds.
pub const CYCLE_SAMPLE_MAX_MS: i64 = 30 * 60 * 1_000;

/// Snapshot of the clocks a queue operation runs under.
#[derive(Debug, Clone, Copy)]
pub struct TimerCtx {
    /// Virtual now in milliseconds, already adjusted for event pauses.
    pub vnow: i64,
    /// Whether report deadlines may be created at all (event is live).
    pub timers_allowed: bool,
    /// Whether a global break currently suppresses report deadlines.
    pub global_break: bool,
    /// Report window granted to a freshly called competitor.
    pub report_window_ms: i64,
}

/// Marker attached to a competitor entry by queue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamTag {
    /// Passed over while on deck; parked at the end of standby.
    Skipped,
    /// Removed from competition but kept visible on the board.
    Disqualified,
    /// Placed by hand rather than by roster order.
    Manual,
}

/// A competitor entry as it sits in a pad queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Stable competitor identifier, unique within a pad.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Organizational unit, when the roster provides one.
    pub unit: Option<String>,
    /// Competition category, used for cycle-time grouping.
    pub category: Option<String>,
    /// Division within the category.
    pub division: Option<String>,
    /// Marker applied by queue operations, if any.
    pub tag: Option<TeamTag>,
}

/// Display status of a pad, derived from its timer and queue fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PadStatus {
    /// Nothing active on the pad.
    #[default]
    Idle,
    /// The current occupant is inside its report window.
    Reporting,
    /// The current occupant has checked in at the pad.
    OnPad,
    /// The current occupant's run clock is ticking.
    Running,
    /// The pad is held by an operator.
    Hold,
    /// A local or global break window covers the pad.
    Break,
}

/// Transient operator message shown on a pad or across the whole board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Message text.
    pub text: String,
    /// Virtual instant the notice expires, or `None` to pin it.
    pub until: Option<i64>,
}

/// Target slot for inserting a competitor into a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertSlot {
    /// Replace the head; previous occupants ripple backwards.
    Now,
    /// Replace the on-deck slot; its occupant moves to the standby front.
    OnDeck,
    /// Append to the end of standby.
    End,
}

/// One of the two head slots of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadSlot {
    /// The `now` slot.
    Now,
    /// The `on_deck` slot.
    OnDeck,
}

/// Where a demoted competitor lands in standby.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoteTarget {
    /// Front of standby (next up after on deck).
    Top,
    /// End of standby.
    End,
}

/// Result of completing the current occupant of a pad.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// The competitor that finished.
    pub finished: Team,
    /// Cycle-time sample in milliseconds, when one could be measured.
    pub sample_ms: Option<i64>,
}

/// One competition area and its queue.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pad {
    /// Pad number, unique on the board.
    pub id: PadId,
    /// Display name.
    pub name: String,
    /// Optional grouping label used for cycle-time statistics.
    pub label: Option<String>,
    /// Competitor currently called to the pad.
    pub now: Option<Team>,
    /// Competitor called up next.
    pub on_deck: Option<Team>,
    /// Remaining queue, in order.
    pub standby: Vec<Team>,
    /// Derived display status; recomputed by [`Pad::sanitize`].
    pub status: PadStatus,
    /// Virtual instant the current occupant checked in.
    pub now_arrived_at: Option<i64>,
    /// Competitor the arrival stamp belongs to.
    pub now_arrived_team_id: Option<String>,
    /// Virtual deadline by which the current occupant must report.
    pub report_by_deadline_at: Option<i64>,
    /// Competitor the report deadline belongs to.
    pub report_by_team_id: Option<String>,
    /// Virtual instant a pad-local break ends, if one is running.
    pub break_until_at: Option<i64>,
    /// Reason attached to the local break.
    pub break_reason: Option<String>,
    /// Virtual instant the current occupant's run started.
    pub run_started_at: Option<i64>,
    /// Operator hold flag; freezes the pad without a break window.
    pub held: bool,
    /// Transient message pinned to this pad.
    pub notice: Option<Notice>,
}

impl Pad {
    /// Fresh empty pad with the given number.
    pub fn new(id: PadId, name: String) -> Self {
        Self {
            id,
            name,
            ..Self::default()
        }
    }

    /// Whether a pad-local break window is running at `vnow`.
    pub fn local_break_active(&self, vnow: i64) -> bool {
        self.break_until_at.is_some_and(|until| until > vnow)
    }

    /// Whether the arrival stamp belongs to the current occupant.
    pub fn arrival_valid(&self) -> bool {
        match (&self.now, &self.now_arrived_team_id) {
            (Some(now), Some(team_id)) => now.id == *team_id,
            _ => false,
        }
    }

    /// Whether the competitor id occupies any slot of this pad.
    pub fn contains(&self, team_id: &str) -> bool {
        self.now.as_ref().is_some_and(|t| t.id == team_id)
            || self.on_deck.as_ref().is_some_and(|t| t.id == team_id)
            || self.standby.iter().any(|t| t.id == team_id)
    }

    /// Insert a competitor at the requested slot.
    ///
    /// Inserting at `now` bumps the previous occupant to on deck and the
    /// previous on-deck competitor to the front of standby, then restarts
    /// the report timer for the newcomer.
    pub fn insert(&mut self, team: Team, slot: InsertSlot, ctx: &TimerCtx) {
        match slot {
            InsertSlot::Now => {
                if let Some(prev_on_deck) = self.on_deck.take() {
                    self.standby.insert(0, prev_on_deck);
                }
                self.on_deck = self.now.take();
                self.now = Some(team);
                self.clear_arrival();
                self.run_started_at = None;
                self.restart_report_timer(ctx);
            }
            InsertSlot::OnDeck => {
                if let Some(prev_on_deck) = self.on_deck.take() {
                    self.standby.insert(0, prev_on_deck);
                }
                self.on_deck = Some(team);
            }
            InsertSlot::End => self.standby.push(team),
        }
    }

    /// Finish the current occupant and advance the queue.
    ///
    /// Returns the finished competitor together with a cycle-time sample
    /// when one can be measured from the run or arrival stamp. `None` when
    /// the pad has no occupant.
    pub fn complete(&mut self, ctx: &TimerCtx) -> Option<Completion> {
        let finished = self.now.take()?;
        let arrival = self
            .now_arrived_team_id
            .as_deref()
            .filter(|id| *id == finished.id)
            .and(self.now_arrived_at);
        let base = match (self.run_started_at, arrival) {
            (Some(run), Some(arrived)) => Some(run.max(arrived)),
            (Some(run), None) => Some(run),
            (None, Some(arrived)) => Some(arrived),
            (None, None) => None,
        };
        let sample_ms = base.and_then(|base| {
            let elapsed = ctx.vnow - base;
            (elapsed > 0).then(|| elapsed.clamp(CYCLE_SAMPLE_MIN_MS, CYCLE_SAMPLE_MAX_MS))
        });
        self.advance(ctx);
        Some(Completion { finished, sample_ms })
    }

    /// Exchange the `now` and `on_deck` occupants in place.
    ///
    /// Clears any local break window and restarts the report timer for the
    /// competitor that lands in `now`. No-op when both slots are empty.
    pub fn swap_now_on_deck(&mut self, ctx: &TimerCtx) -> bool {
        if self.now.is_none() && self.on_deck.is_none() {
            return false;
        }
        std::mem::swap(&mut self.now, &mut self.on_deck);
        self.break_until_at = None;
        self.break_reason = None;
        self.clear_arrival();
        self.run_started_at = None;
        self.restart_report_timer(ctx);
        true
    }

    /// Park the on-deck competitor at the end of standby, tagged as
    /// skipped, and promote the standby head in its place.
    pub fn skip_on_deck(&mut self) -> bool {
        let Some(mut skipped) = self.on_deck.take() else {
            return false;
        };
        skipped.tag = Some(TeamTag::Skipped);
        if !self.standby.is_empty() {
            self.on_deck = Some(self.standby.remove(0));
        }
        self.standby.push(skipped);
        true
    }

    /// Move a head-slot occupant back into standby.
    ///
    /// Demoting from `now` advances the queue the same way a completion
    /// does, without recording a cycle sample.
    pub fn demote(&mut self, from: HeadSlot, to: DemoteTarget, ctx: &TimerCtx) -> bool {
        let team = match from {
            HeadSlot::Now => {
                let team = self.now.take();
                if team.is_some() {
                    self.advance(ctx);
                }
                team
            }
            HeadSlot::OnDeck => self.on_deck.take(),
        };
        let Some(team) = team else {
            return false;
        };
        match to {
            DemoteTarget::Top => self.standby.insert(0, team),
            DemoteTarget::End => self.standby.push(team),
        }
        true
    }

    /// Pull a competitor out of whatever slot it occupies and re-insert it
    /// at the requested head slot. Returns `false` when the id is unknown.
    pub fn assign(&mut self, team_id: &str, slot: HeadSlot, ctx: &TimerCtx) -> bool {
        let Some(team) = self.remove_team(team_id) else {
            return false;
        };
        match slot {
            HeadSlot::Now => self.insert(team, InsertSlot::Now, ctx),
            HeadSlot::OnDeck => self.insert(team, InsertSlot::OnDeck, ctx),
        }
        true
    }

    /// Set or clear the tag on a competitor anywhere in this pad.
    pub fn tag_team(&mut self, team_id: &str, tag: Option<TeamTag>) -> bool {
        let slot = self
            .now
            .iter_mut()
            .chain(self.on_deck.iter_mut())
            .chain(self.standby.iter_mut())
            .find(|team| team.id == team_id);
        match slot {
            Some(team) => {
                team.tag = tag;
                true
            }
            None => false,
        }
    }

    /// Stamp the current occupant as arrived and stop its report clock.
    pub fn mark_arrived(&mut self, ctx: &TimerCtx) -> bool {
        let Some(now) = &self.now else {
            return false;
        };
        self.now_arrived_at = Some(ctx.vnow);
        self.now_arrived_team_id = Some(now.id.clone());
        self.report_by_deadline_at = None;
        self.report_by_team_id = None;
        self.status = PadStatus::OnPad;
        true
    }

    /// Start the run clock for the current occupant.
    pub fn start_run(&mut self, ctx: &TimerCtx) -> bool {
        if self.now.is_none() {
            return false;
        }
        self.run_started_at = Some(ctx.vnow);
        self.report_by_deadline_at = None;
        self.report_by_team_id = None;
        self.status = PadStatus::Running;
        true
    }

    /// Empty every slot and reset all per-pad clocks and messages.
    pub fn clear(&mut self) {
        self.now = None;
        self.on_deck = None;
        self.standby.clear();
        self.clear_arrival();
        self.report_by_deadline_at = None;
        self.report_by_team_id = None;
        self.break_until_at = None;
        self.break_reason = None;
        self.run_started_at = None;
        self.held = false;
        self.notice = None;
        self.status = PadStatus::Idle;
    }

    /// Repair cross-field state and rederive the display status.
    ///
    /// Runs after every mutation: stale arrival stamps and expired windows
    /// are dropped, a missing or foreign report deadline is recreated for
    /// the current occupant, and deadlines are removed whenever timers are
    /// not allowed to exist.
    pub fn sanitize(&mut self, ctx: &TimerCtx) {
        if !self.arrival_valid() {
            self.clear_arrival();
        }
        if self.break_until_at.is_some_and(|until| until <= ctx.vnow) {
            self.break_until_at = None;
            self.break_reason = None;
        }
        if let Some(notice) = &self.notice {
            if notice.until.is_some_and(|until| until <= ctx.vnow) {
                self.notice = None;
            }
        }
        if self.now.is_none() {
            self.run_started_at = None;
        }

        let wants_deadline = self.now.is_some()
            && ctx.timers_allowed
            && !ctx.global_break
            && !self.local_break_active(ctx.vnow)
            && !self.arrival_valid()
            && self.run_started_at.is_none();
        if wants_deadline {
            let owner = self.now.as_ref().map(|team| team.id.as_str());
            if self.report_by_deadline_at.is_none() || self.report_by_team_id.as_deref() != owner {
                self.restart_report_timer(ctx);
            }
        } else {
            self.report_by_deadline_at = None;
            self.report_by_team_id = None;
        }

        self.status = self.derived_status(ctx);
    }

    fn derived_status(&self, ctx: &TimerCtx) -> PadStatus {
        if ctx.global_break || self.local_break_active(ctx.vnow) {
            PadStatus::Break
        } else if self.now.is_none() {
            PadStatus::Idle
        } else if self.held {
            PadStatus::Hold
        } else if self.run_started_at.is_some() {
            PadStatus::Running
        } else if self.arrival_valid() {
            PadStatus::OnPad
        } else if self.report_by_deadline_at.is_some() {
            PadStatus::Reporting
        } else {
            PadStatus::Idle
        }
    }

    /// Advance the queue after the `now` slot was vacated.
    fn advance(&mut self, ctx: &TimerCtx) {
        self.now = self.on_deck.take();
        if !self.standby.is_empty() {
            self.on_deck = Some(self.standby.remove(0));
        }
        self.clear_arrival();
        self.run_started_at = None;
        self.restart_report_timer(ctx);
    }

    /// Grant the current occupant a fresh report window, or drop the
    /// deadline entirely when timers may not exist right now.
    fn restart_report_timer(&mut self, ctx: &TimerCtx) {
        let may_run = ctx.timers_allowed && !ctx.global_break && !self.local_break_active(ctx.vnow);
        match (&self.now, may_run) {
            (Some(now), true) => {
                self.report_by_deadline_at = Some(ctx.vnow + ctx.report_window_ms);
                self.report_by_team_id = Some(now.id.clone());
                self.status = PadStatus::Reporting;
            }
            _ => {
                self.report_by_deadline_at = None;
                self.report_by_team_id = None;
            }
        }
    }

    fn clear_arrival(&mut self) {
        self.now_arrived_at = None;
        self.now_arrived_team_id = None;
    }

    fn remove_team(&mut self, team_id: &str) -> Option<Team> {
        if self.now.as_ref().is_some_and(|t| t.id == team_id) {
            let team = self.now.take();
            self.clear_arrival();
            self.run_started_at = None;
            return team;
        }
        if self.on_deck.as_ref().is_some_and(|t| t.id == team_id) {
            return self.on_deck.take();
        }
        let index = self.standby.iter().position(|t| t.id == team_id)?;
        Some(self.standby.remove(index))
    }
}
