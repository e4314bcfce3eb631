//! Read-only projections of the board pushed to clients.
//!
//! Clients never receive the state structs themselves: every broadcast and
//! REST response is built from these DTOs, after the sanitation pass has
//! run, so no stale cross-field state ever leaves the process.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::format_epoch_ms,
    state::{
        StateStore,
        audit::AuditEntry,
        board::{Board, CycleStats, GlobalBreak, RollingStat, ScheduleEntry},
        clock::{EventClock, EventStatus},
        pad::{Notice, Pad, PadId, PadStatus, Team, TeamTag},
    },
};

/// Marker attached to a competitor entry.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TeamTagDto {
    Skipped,
    Disqualified,
    Manual,
}

impl From<TeamTag> for TeamTagDto {
    fn from(tag: TeamTag) -> Self {
        match tag {
            TeamTag::Skipped => TeamTagDto::Skipped,
            TeamTag::Disqualified => TeamTagDto::Disqualified,
            TeamTag::Manual => TeamTagDto::Manual,
        }
    }
}

/// Competitor entry as shown in a queue.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamDto {
    pub id: String,
    pub name: String,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub division: Option<String>,
    pub tag: Option<TeamTagDto>,
}

impl From<&Team> for TeamDto {
    fn from(team: &Team) -> Self {
        Self {
            id: team.id.clone(),
            name: team.name.clone(),
            unit: team.unit.clone(),
            category: team.category.clone(),
            division: team.division.clone(),
            tag: team.tag.map(Into::into),
        }
    }
}

/// Display status of a pad.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PadStatusDto {
    Idle,
    Reporting,
    OnPad,
    Running,
    Hold,
    Break,
}

impl From<PadStatus> for PadStatusDto {
    fn from(status: PadStatus) -> Self {
        match status {
            PadStatus::Idle => PadStatusDto::Idle,
            PadStatus::Reporting => PadStatusDto::Reporting,
            PadStatus::OnPad => PadStatusDto::OnPad,
            PadStatus::Running => PadStatusDto::Running,
            PadStatus::Hold => PadStatusDto::Hold,
            PadStatus::Break => PadStatusDto::Break,
        }
    }
}

/// Transient message pinned to a pad or to the whole board.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NoticeDto {
    pub text: String,
    /// Virtual expiry instant in ms, absent for pinned notices.
    pub until: Option<i64>,
}

impl From<&Notice> for NoticeDto {
    fn from(notice: &Notice) -> Self {
        Self {
            text: notice.text.clone(),
            until: notice.until,
        }
    }
}

/// One pad and everything a client needs to render it.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PadDto {
    pub id: PadId,
    pub name: String,
    pub label: Option<String>,
    pub status: PadStatusDto,
    pub now: Option<TeamDto>,
    pub on_deck: Option<TeamDto>,
    pub standby: Vec<TeamDto>,
    /// Virtual instant the current occupant checked in.
    pub now_arrived_at: Option<i64>,
    /// Virtual deadline for the current occupant to report.
    pub report_by_deadline_at: Option<i64>,
    /// Virtual end of a pad-local break.
    pub break_until_at: Option<i64>,
    pub break_reason: Option<String>,
    /// Virtual instant the current run started.
    pub run_started_at: Option<i64>,
    pub held: bool,
    pub notice: Option<NoticeDto>,
}

impl From<&Pad> for PadDto {
    fn from(pad: &Pad) -> Self {
        Self {
            id: pad.id,
            name: pad.name.clone(),
            label: pad.label.clone(),
            status: pad.status.into(),
            now: pad.now.as_ref().map(Into::into),
            on_deck: pad.on_deck.as_ref().map(Into::into),
            standby: pad.standby.iter().map(Into::into).collect(),
            now_arrived_at: pad.now_arrived_at,
            report_by_deadline_at: pad.report_by_deadline_at,
            break_until_at: pad.break_until_at,
            break_reason: pad.break_reason.clone(),
            run_started_at: pad.run_started_at,
            held: pad.held,
            notice: pad.notice.as_ref().map(Into::into),
        }
    }
}

/// Active global break window.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GlobalBreakDto {
    pub started_at: i64,
    pub until: i64,
    pub reason: Option<String>,
}

impl From<&GlobalBreak> for GlobalBreakDto {
    fn from(brk: &GlobalBreak) -> Self {
        Self {
            started_at: brk.started_at,
            until: brk.until,
            reason: brk.reason.clone(),
        }
    }
}

/// One planned schedule block.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScheduleEntryDto {
    pub id: Uuid,
    pub title: String,
    /// Planned start, wall-clock epoch ms.
    pub starts_at: i64,
    /// Planned end, wall-clock epoch ms.
    pub ends_at: i64,
    pub pad_id: Option<PadId>,
}

impl From<&ScheduleEntry> for ScheduleEntryDto {
    fn from(entry: &ScheduleEntry) -> Self {
        Self {
            id: entry.id,
            title: entry.title.clone(),
            starts_at: entry.starts_at,
            ends_at: entry.ends_at,
            pad_id: entry.pad_id,
        }
    }
}

/// Rolling average of one cycle-time bucket.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RollingStatDto {
    /// Average over the retained window, absent before the first sample.
    pub average_ms: Option<i64>,
    /// Lifetime number of samples.
    pub count: u64,
}

impl From<&RollingStat> for RollingStatDto {
    fn from(stat: &RollingStat) -> Self {
        Self {
            average_ms: stat.average_ms(),
            count: stat.count,
        }
    }
}

/// Cycle-time statistics grouped three ways.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CycleStatsDto {
    pub per_pad: BTreeMap<PadId, RollingStatDto>,
    pub per_label: BTreeMap<String, RollingStatDto>,
    pub per_category: BTreeMap<String, RollingStatDto>,
}

impl From<&CycleStats> for CycleStatsDto {
    fn from(stats: &CycleStats) -> Self {
        let project = |buckets: &BTreeMap<String, RollingStat>| {
            buckets
                .iter()
                .map(|(key, stat)| (key.clone(), stat.into()))
                .collect()
        };
        Self {
            per_pad: stats
                .per_pad
                .iter()
                .map(|(pad_id, stat)| (*pad_id, stat.into()))
                .collect(),
            per_label: project(&stats.per_label),
            per_category: project(&stats.per_category),
        }
    }
}

/// Lifecycle status of the event.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventStatusDto {
    Planning,
    Live,
}

impl From<EventStatus> for EventStatusDto {
    fn from(status: EventStatus) -> Self {
        match status {
            EventStatus::Planning => EventStatusDto::Planning,
            EventStatus::Live => EventStatusDto::Live,
        }
    }
}

/// Event clock as served to clients.
///
/// `virtual_now` lets clients render every countdown against the same
/// pause-aware clock the server stamps deadlines with.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventClockDto {
    pub status: EventStatusDto,
    pub start_at: Option<i64>,
    pub paused: bool,
    pub paused_at: Option<i64>,
    pub paused_accum_ms: i64,
    pub virtual_now: i64,
}

impl EventClockDto {
    fn capture(clock: &EventClock, wall_ms: i64) -> Self {
        Self {
            status: clock.status.into(),
            start_at: clock.start_at,
            paused: clock.is_paused(),
            paused_at: clock.paused_at,
            paused_accum_ms: clock.paused_accum_ms,
            virtual_now: clock.virtual_now(wall_ms),
        }
    }
}

/// One audit trail entry.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditEntryDto {
    pub id: u64,
    /// Wall-clock instant, epoch ms.
    pub ts: i64,
    /// Same instant formatted as RFC 3339 for human readers.
    pub at: String,
    pub pad_id: Option<PadId>,
    pub action: String,
    pub detail: String,
}

impl From<&AuditEntry> for AuditEntryDto {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            id: entry.id,
            ts: entry.ts,
            at: format_epoch_ms(entry.ts),
            pad_id: entry.pad_id,
            action: entry.action.clone(),
            detail: entry.detail.clone(),
        }
    }
}

/// Complete board state pushed after every mutation.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BoardSnapshot {
    pub pads: Vec<PadDto>,
    /// Wall-clock instant of the last mutation, epoch ms.
    pub updated_at: i64,
    pub global_break: Option<GlobalBreakDto>,
    pub global_notice: Option<NoticeDto>,
    pub schedule: Vec<ScheduleEntryDto>,
    pub stats: CycleStatsDto,
    pub event: EventClockDto,
    /// Audit trail, oldest first.
    pub audit: Vec<AuditEntryDto>,
}

impl BoardSnapshot {
    /// Project the store into a snapshot at the given wall instant.
    ///
    /// Callers must have run the sanitation pass first; this is a pure
    /// projection and repairs nothing.
    pub fn capture(store: &StateStore, wall_ms: i64) -> Self {
        let board: &Board = &store.board;
        Self {
            pads: board.pads.values().map(Into::into).collect(),
            updated_at: board.updated_at,
            global_break: board.global_break.as_ref().map(Into::into),
            global_notice: board.global_notice.as_ref().map(Into::into),
            schedule: board.schedule.iter().map(Into::into).collect(),
            stats: (&board.stats).into(),
            event: EventClockDto::capture(&board.event, wall_ms),
            audit: store.audit.entries().map(Into::into).collect(),
        }
    }
}
