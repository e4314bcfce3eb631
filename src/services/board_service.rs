//! Board mutations: every command that changes pads, queues or the event
//! clock funnels through here.
//!
//! All mutations share one pipeline: take the command gate, heal expired
//! windows, apply the change, push an undo snapshot for pad-scoped
//! actions, record audit, sanitize again and push the board to everyone.
//! The gate stays held through the push so no two commands interleave
//! between state change and broadcast.

use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::ws::TeamInput,
    error::ServiceError,
    services::events,
    state::{
        SharedState,
        board::{Board, GlobalBreak, MAX_PADS, ScheduleEntry},
        clock::wall_now_ms,
        pad::{DemoteTarget, HeadSlot, InsertSlot, Notice, Pad, PadId, TeamTag, TimerCtx},
    },
};

/// Longest accepted break window, in minutes.
const MAX_BREAK_MINUTES: u32 = 12 * 60;
/// Longest accepted notice or title text.
const MAX_TEXT_CHARS: usize = 280;

/// Outcome of one mutation closure.
///
/// `Rejected` is a semantic no-op that still leaves an audit entry, as
/// opposed to closure errors which abort before touching the trail.
enum Applied {
    Mutated(String),
    Rejected(String),
}

/// Run one board mutation through the shared pipeline.
///
/// The closure receives the board, a timer context computed after the
/// pre-op heal, and the wall instant. It must not change the board on
/// the paths where it returns an error.
async fn mutate<F>(
    state: &SharedState,
    pad_scope: Option<PadId>,
    action: &'static str,
    op: F,
) -> Result<(), ServiceError>
where
    F: FnOnce(&mut Board, &TimerCtx, i64) -> Result<Applied, ServiceError>,
{
    let _gate = state.command_gate().lock().await;
    let wall = wall_now_ms();
    let window = state.config().report_window_ms;

    let outcome = {
        let mut store = state.store().write().await;
        store.board.sanitize(wall, window);
        let ctx = store.board.timer_ctx(wall, window);
        let snapshot = pad_scope.map(|_| store.board.clone());
        let store = &mut *store;
        match op(&mut store.board, &ctx, wall) {
            Ok(Applied::Mutated(detail)) => {
                if let (Some(pad_id), Some(snapshot)) = (pad_scope, snapshot) {
                    store.undo.push(pad_id, snapshot);
                }
                store.audit.record(wall, pad_scope, action, detail.as_str());
                store.board.updated_at = wall;
                store.board.sanitize(wall, window);
                info!(action, detail = %detail, pad_id = ?pad_scope, "board updated");
                Ok(())
            }
            Ok(Applied::Rejected(reason)) => {
                store
                    .audit
                    .record(wall, pad_scope, action, format!("rejected: {reason}"));
                debug!(action, reason = %reason, pad_id = ?pad_scope, "command rejected");
                Err(ServiceError::InvalidState(reason))
            }
            Err(err) => return Err(err),
        }
    };

    // The audit trail grew either way, so everyone gets the new board.
    events::broadcast_board(state).await;
    outcome
}

fn pad_mut(board: &mut Board, pad_id: PadId) -> Result<&mut Pad, ServiceError> {
    board
        .pads
        .get_mut(&pad_id)
        .ok_or_else(|| ServiceError::NotFound(format!("pad {pad_id}")))
}

fn require_text(value: String, what: &str) -> Result<String, ServiceError> {
    let value = value.trim().to_owned();
    if value.is_empty() {
        return Err(ServiceError::InvalidInput(format!(
            "{what} must not be blank"
        )));
    }
    if value.chars().count() > MAX_TEXT_CHARS {
        return Err(ServiceError::InvalidInput(format!(
            "{what} must stay under {MAX_TEXT_CHARS} characters"
        )));
    }
    Ok(value)
}

fn require_minutes(minutes: u32) -> Result<u32, ServiceError> {
    if !(1..=MAX_BREAK_MINUTES).contains(&minutes) {
        return Err(ServiceError::InvalidInput(format!(
            "minutes must be between 1 and {MAX_BREAK_MINUTES}"
        )));
    }
    Ok(minutes)
}

fn clean_reason(reason: Option<String>) -> Option<String> {
    reason
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

fn minutes_ms(minutes: u32) -> i64 {
    i64::from(minutes) * 60_000
}

fn slot_name(slot: InsertSlot) -> &'static str {
    match slot {
        InsertSlot::Now => "now",
        InsertSlot::OnDeck => "on deck",
        InsertSlot::End => "standby",
    }
}

fn head_name(slot: HeadSlot) -> &'static str {
    match slot {
        HeadSlot::Now => "now",
        HeadSlot::OnDeck => "on deck",
    }
}

fn tag_name(tag: TeamTag) -> &'static str {
    match tag {
        TeamTag::Skipped => "skipped",
        TeamTag::Disqualified => "disqualified",
        TeamTag::Manual => "manual",
    }
}

/// Insert a competitor into a queue slot of a pad.
pub async fn queue_insert(
    state: &SharedState,
    pad_id: PadId,
    team: TeamInput,
    slot: InsertSlot,
) -> Result<(), ServiceError> {
    team.validate()?;
    mutate(state, Some(pad_id), "queue_insert", move |board, ctx, _| {
        let pad = pad_mut(board, pad_id)?;
        let team = team.into_team();
        if pad.contains(&team.id) {
            return Ok(Applied::Rejected(format!(
                "competitor `{}` is already queued",
                team.id
            )));
        }
        let detail = format!("added `{}` to {}", team.id, slot_name(slot));
        pad.insert(team, slot, ctx);
        Ok(Applied::Mutated(detail))
    })
    .await
}

/// Finish the current occupant of a pad and advance the queue.
///
/// Refused while a global break is running, so nobody gets called up
/// into a frozen board.
pub async fn queue_complete(state: &SharedState, pad_id: PadId) -> Result<(), ServiceError> {
    mutate(state, Some(pad_id), "queue_complete", move |board, ctx, _| {
        if ctx.global_break {
            return Ok(Applied::Rejected("global break active".into()));
        }
        let pad = pad_mut(board, pad_id)?;
        let Some(done) = pad.complete(ctx) else {
            return Ok(Applied::Rejected("no competitor on the pad".into()));
        };
        let detail = match done.sample_ms {
            Some(sample) => format!("finished `{}` in {}s", done.finished.id, sample / 1_000),
            None => format!("finished `{}`", done.finished.id),
        };
        if let Some(sample) = done.sample_ms {
            board.record_cycle(pad_id, &done.finished, sample);
        }
        Ok(Applied::Mutated(detail))
    })
    .await
}

/// Exchange the now and on-deck occupants of a pad.
pub async fn queue_swap(state: &SharedState, pad_id: PadId) -> Result<(), ServiceError> {
    mutate(state, Some(pad_id), "queue_swap", move |board, ctx, _| {
        let pad = pad_mut(board, pad_id)?;
        if !pad.swap_now_on_deck(ctx) {
            return Ok(Applied::Rejected("nothing to swap".into()));
        }
        Ok(Applied::Mutated("swapped now and on deck".into()))
    })
    .await
}

/// Park the on-deck competitor at the end of standby.
pub async fn queue_skip_on_deck(state: &SharedState, pad_id: PadId) -> Result<(), ServiceError> {
    mutate(state, Some(pad_id), "queue_skip", move |board, _, _| {
        let pad = pad_mut(board, pad_id)?;
        if !pad.skip_on_deck() {
            return Ok(Applied::Rejected("no competitor on deck".into()));
        }
        Ok(Applied::Mutated("skipped the on-deck competitor".into()))
    })
    .await
}

/// Move a head-slot occupant back into standby.
pub async fn queue_demote(
    state: &SharedState,
    pad_id: PadId,
    from: HeadSlot,
    to: DemoteTarget,
) -> Result<(), ServiceError> {
    mutate(state, Some(pad_id), "queue_demote", move |board, ctx, _| {
        let pad = pad_mut(board, pad_id)?;
        if !pad.demote(from, to, ctx) {
            return Ok(Applied::Rejected(format!(
                "{} slot is empty",
                head_name(from)
            )));
        }
        Ok(Applied::Mutated(format!(
            "demoted the {} competitor to standby",
            head_name(from)
        )))
    })
    .await
}

/// Pull a queued competitor into a head slot of the same pad.
pub async fn queue_assign(
    state: &SharedState,
    pad_id: PadId,
    team_id: String,
    slot: HeadSlot,
) -> Result<(), ServiceError> {
    mutate(state, Some(pad_id), "queue_assign", move |board, ctx, _| {
        let pad = pad_mut(board, pad_id)?;
        if !pad.assign(&team_id, slot, ctx) {
            return Ok(Applied::Rejected(format!(
                "competitor `{team_id}` is not queued on this pad"
            )));
        }
        Ok(Applied::Mutated(format!(
            "assigned `{team_id}` to {}",
            head_name(slot)
        )))
    })
    .await
}

/// Set or clear the marker on a queued competitor.
pub async fn queue_tag(
    state: &SharedState,
    pad_id: PadId,
    team_id: String,
    tag: Option<TeamTag>,
) -> Result<(), ServiceError> {
    mutate(state, Some(pad_id), "queue_tag", move |board, _, _| {
        let pad = pad_mut(board, pad_id)?;
        if !pad.tag_team(&team_id, tag) {
            return Ok(Applied::Rejected(format!(
                "competitor `{team_id}` is not queued on this pad"
            )));
        }
        let detail = match tag {
            Some(tag) => format!("tagged `{team_id}` {}", tag_name(tag)),
            None => format!("cleared the tag on `{team_id}`"),
        };
        Ok(Applied::Mutated(detail))
    })
    .await
}

/// Empty the whole queue of a pad.
pub async fn queue_clear(state: &SharedState, pad_id: PadId) -> Result<(), ServiceError> {
    mutate(state, Some(pad_id), "queue_clear", move |board, _, _| {
        let pad = pad_mut(board, pad_id)?;
        if pad.now.is_none() && pad.on_deck.is_none() && pad.standby.is_empty() {
            return Ok(Applied::Rejected("queue already empty".into()));
        }
        pad.clear();
        Ok(Applied::Mutated("cleared the queue".into()))
    })
    .await
}

/// Restore the board to before the last action on this pad.
///
/// Undo replays nothing: it swaps the whole board back to the snapshot
/// taken before the action, then heals it against the current clock.
pub async fn queue_undo(state: &SharedState, pad_id: PadId) -> Result<(), ServiceError> {
    let _gate = state.command_gate().lock().await;
    let wall = wall_now_ms();
    let window = state.config().report_window_ms;

    let outcome = {
        let mut store = state.store().write().await;
        let store = &mut *store;
        match store.undo.pop(pad_id) {
            Some(snapshot) => {
                store.board = snapshot;
                store.board.updated_at = wall;
                store.board.sanitize(wall, window);
                store
                    .audit
                    .record(wall, Some(pad_id), "queue_undo", "restored the previous board");
                info!(pad_id, "board restored from undo history");
                Ok(())
            }
            None => {
                store
                    .audit
                    .record(wall, Some(pad_id), "queue_undo", "rejected: nothing to undo");
                Err(ServiceError::InvalidState("nothing to undo".into()))
            }
        }
    };

    events::broadcast_board(state).await;
    outcome
}

/// Stamp the current occupant of a pad as arrived.
pub async fn mark_arrived(state: &SharedState, pad_id: PadId) -> Result<(), ServiceError> {
    mutate(state, Some(pad_id), "mark_arrived", move |board, ctx, _| {
        let pad = pad_mut(board, pad_id)?;
        if !pad.mark_arrived(ctx) {
            return Ok(Applied::Rejected("no competitor on the pad".into()));
        }
        Ok(Applied::Mutated("competitor on the pad".into()))
    })
    .await
}

/// Start the run clock for the current occupant of a pad.
pub async fn start_run(state: &SharedState, pad_id: PadId) -> Result<(), ServiceError> {
    mutate(state, Some(pad_id), "start_run", move |board, ctx, _| {
        let pad = pad_mut(board, pad_id)?;
        if !pad.start_run(ctx) {
            return Ok(Applied::Rejected("no competitor on the pad".into()));
        }
        Ok(Applied::Mutated("run started".into()))
    })
    .await
}

/// Freeze or unfreeze a pad without a break window.
pub async fn pad_hold(state: &SharedState, pad_id: PadId, on: bool) -> Result<(), ServiceError> {
    mutate(state, Some(pad_id), "pad_hold", move |board, _, _| {
        let pad = pad_mut(board, pad_id)?;
        if pad.held == on {
            let reason = if on { "already held" } else { "not held" };
            return Ok(Applied::Rejected(reason.into()));
        }
        pad.held = on;
        let detail = if on { "held the pad" } else { "released the hold" };
        Ok(Applied::Mutated(detail.into()))
    })
    .await
}

/// Create one pad with the next free number.
pub async fn pad_create(state: &SharedState, name: Option<String>) -> Result<(), ServiceError> {
    let name = match name {
        Some(name) => Some(require_text(name, "pad name")?),
        None => None,
    };
    mutate(state, None, "pad_create", move |board, _, _| {
        if board.pads.len() >= MAX_PADS {
            return Ok(Applied::Rejected("pad limit reached".into()));
        }
        let id = board.create_pad(name);
        Ok(Applied::Mutated(format!("created pad {id}")))
    })
    .await
}

/// Rename a pad.
pub async fn pad_rename(
    state: &SharedState,
    pad_id: PadId,
    name: String,
) -> Result<(), ServiceError> {
    let name = require_text(name, "pad name")?;
    mutate(state, Some(pad_id), "pad_rename", move |board, _, _| {
        let pad = pad_mut(board, pad_id)?;
        let detail = format!("renamed `{}` to `{name}`", pad.name);
        pad.name = name;
        Ok(Applied::Mutated(detail))
    })
    .await
}

/// Delete a pad, its chat channel and any presence bindings to it.
///
/// The pre-delete board lands on the pad's undo stack, so the deletion
/// itself can be taken back. Pad numbers are never handed out again.
pub async fn pad_delete(state: &SharedState, pad_id: PadId) -> Result<(), ServiceError> {
    let _gate = state.command_gate().lock().await;
    let wall = wall_now_ms();
    let window = state.config().report_window_ms;

    {
        let mut store = state.store().write().await;
        let store = &mut *store;
        if !store.board.pads.contains_key(&pad_id) {
            return Err(ServiceError::NotFound(format!("pad {pad_id}")));
        }
        let snapshot = store.board.clone();
        store.board.delete_pad(pad_id);
        store.undo.push(pad_id, snapshot);
        store
            .audit
            .record(wall, Some(pad_id), "pad_delete", "deleted the pad");
        store.board.updated_at = wall;
        store.board.sanitize(wall, window);
    }

    let dropped_channel = {
        let mut chat = state.chat().write().await;
        chat.remove_channel(pad_id)
    };
    if dropped_channel {
        state.request_chat_save();
    }

    for mut entry in state.clients().iter_mut() {
        if entry.pad_id == Some(pad_id) {
            entry.pad_id = None;
        }
    }

    info!(pad_id, "pad deleted");
    events::broadcast_board(state).await;
    events::broadcast_presence(state);
    Ok(())
}

/// Make sure pads 1 through `count` all exist.
pub async fn pad_ensure(state: &SharedState, count: PadId) -> Result<(), ServiceError> {
    if count == 0 || count as usize > MAX_PADS {
        return Err(ServiceError::InvalidInput(format!(
            "count must be between 1 and {MAX_PADS}"
        )));
    }
    mutate(state, None, "pad_ensure", move |board, _, _| {
        let created = board.ensure_range(count);
        if created == 0 {
            return Ok(Applied::Rejected(format!("pads 1 to {count} already exist")));
        }
        Ok(Applied::Mutated(format!("created {created} pads")))
    })
    .await
}

/// Start a pad-local break window.
///
/// Refused while a global break is running; the board-wide window
/// already covers the pad.
pub async fn break_start(
    state: &SharedState,
    pad_id: PadId,
    minutes: u32,
    reason: Option<String>,
) -> Result<(), ServiceError> {
    let minutes = require_minutes(minutes)?;
    let reason = clean_reason(reason);
    mutate(state, Some(pad_id), "break_start", move |board, ctx, _| {
        if ctx.global_break {
            return Ok(Applied::Rejected("global break active".into()));
        }
        let pad = pad_mut(board, pad_id)?;
        pad.break_until_at = Some(ctx.vnow + minutes_ms(minutes));
        pad.break_reason = reason;
        Ok(Applied::Mutated(format!("break for {minutes}m")))
    })
    .await
}

/// End a pad-local break early. The occupant gets a fresh report window.
pub async fn break_clear(state: &SharedState, pad_id: PadId) -> Result<(), ServiceError> {
    mutate(state, Some(pad_id), "break_clear", move |board, ctx, _| {
        let pad = pad_mut(board, pad_id)?;
        if !pad.local_break_active(ctx.vnow) {
            return Ok(Applied::Rejected("no break running".into()));
        }
        pad.break_until_at = None;
        pad.break_reason = None;
        Ok(Applied::Mutated("break ended early".into()))
    })
    .await
}

/// Start a break window covering every pad.
pub async fn global_break_set(
    state: &SharedState,
    minutes: u32,
    reason: Option<String>,
) -> Result<(), ServiceError> {
    let minutes = require_minutes(minutes)?;
    let reason = clean_reason(reason);
    mutate(state, None, "global_break_set", move |board, ctx, _| {
        board.global_break = Some(GlobalBreak {
            started_at: ctx.vnow,
            until: ctx.vnow + minutes_ms(minutes),
            reason,
        });
        Ok(Applied::Mutated(format!("global break for {minutes}m")))
    })
    .await
}

/// End the global break early. Every occupied pad gets a fresh window.
pub async fn global_break_clear(state: &SharedState) -> Result<(), ServiceError> {
    mutate(state, None, "global_break_clear", move |board, _, _| {
        if board.global_break.is_none() {
            return Ok(Applied::Rejected("no global break running".into()));
        }
        board.global_break = None;
        Ok(Applied::Mutated("global break ended early".into()))
    })
    .await
}

/// Pin the board-wide notice, optionally time-boxed.
pub async fn notice_set(
    state: &SharedState,
    text: String,
    minutes: Option<u32>,
) -> Result<(), ServiceError> {
    let text = require_text(text, "notice text")?;
    let minutes = match minutes {
        Some(minutes) => Some(require_minutes(minutes)?),
        None => None,
    };
    mutate(state, None, "notice_set", move |board, ctx, _| {
        board.global_notice = Some(Notice {
            text,
            until: minutes.map(|m| ctx.vnow + minutes_ms(m)),
        });
        Ok(Applied::Mutated("pinned a notice".into()))
    })
    .await
}

/// Remove the board-wide notice.
pub async fn notice_clear(state: &SharedState) -> Result<(), ServiceError> {
    mutate(state, None, "notice_clear", move |board, _, _| {
        if board.global_notice.is_none() {
            return Ok(Applied::Rejected("no notice pinned".into()));
        }
        board.global_notice = None;
        Ok(Applied::Mutated("removed the notice".into()))
    })
    .await
}

/// Pin a notice to one pad, optionally time-boxed.
pub async fn pad_notice_set(
    state: &SharedState,
    pad_id: PadId,
    text: String,
    minutes: Option<u32>,
) -> Result<(), ServiceError> {
    let text = require_text(text, "notice text")?;
    let minutes = match minutes {
        Some(minutes) => Some(require_minutes(minutes)?),
        None => None,
    };
    mutate(state, Some(pad_id), "pad_notice_set", move |board, ctx, _| {
        let pad = pad_mut(board, pad_id)?;
        pad.notice = Some(Notice {
            text,
            until: minutes.map(|m| ctx.vnow + minutes_ms(m)),
        });
        Ok(Applied::Mutated("pinned a notice".into()))
    })
    .await
}

/// Remove the notice of one pad.
pub async fn pad_notice_clear(state: &SharedState, pad_id: PadId) -> Result<(), ServiceError> {
    mutate(
        state,
        Some(pad_id),
        "pad_notice_clear",
        move |board, _, _| {
            let pad = pad_mut(board, pad_id)?;
            if pad.notice.is_none() {
                return Ok(Applied::Rejected("no notice pinned".into()));
            }
            pad.notice = None;
            Ok(Applied::Mutated("removed the notice".into()))
        },
    )
    .await
}

/// Append a schedule block. Times are wall-clock epoch ms.
pub async fn schedule_add(
    state: &SharedState,
    title: String,
    starts_at: i64,
    ends_at: i64,
    pad_id: Option<PadId>,
) -> Result<(), ServiceError> {
    let title = require_text(title, "block title")?;
    if ends_at <= starts_at {
        return Err(ServiceError::InvalidInput(
            "block must end after it starts".into(),
        ));
    }
    mutate(state, None, "schedule_add", move |board, _, _| {
        if let Some(pad_id) = pad_id {
            if !board.pads.contains_key(&pad_id) {
                return Err(ServiceError::NotFound(format!("pad {pad_id}")));
            }
        }
        let detail = format!("added block `{title}`");
        board.schedule.push(ScheduleEntry {
            id: Uuid::new_v4(),
            title,
            starts_at,
            ends_at,
            pad_id,
        });
        board.schedule.sort_by_key(|entry| entry.starts_at);
        Ok(Applied::Mutated(detail))
    })
    .await
}

/// Update fields of a schedule block; absent fields keep their value.
pub async fn schedule_update(
    state: &SharedState,
    id: Uuid,
    title: Option<String>,
    starts_at: Option<i64>,
    ends_at: Option<i64>,
    pad_id: Option<PadId>,
) -> Result<(), ServiceError> {
    let title = match title {
        Some(title) => Some(require_text(title, "block title")?),
        None => None,
    };
    mutate(state, None, "schedule_update", move |board, _, _| {
        if let Some(pad_id) = pad_id {
            if !board.pads.contains_key(&pad_id) {
                return Err(ServiceError::NotFound(format!("pad {pad_id}")));
            }
        }
        let Some(entry) = board.schedule.iter_mut().find(|entry| entry.id == id) else {
            return Err(ServiceError::NotFound(format!("schedule block {id}")));
        };
        let starts_at = starts_at.unwrap_or(entry.starts_at);
        let ends_at = ends_at.unwrap_or(entry.ends_at);
        if ends_at <= starts_at {
            return Err(ServiceError::InvalidInput(
                "block must end after it starts".into(),
            ));
        }
        if let Some(title) = title {
            entry.title = title;
        }
        entry.starts_at = starts_at;
        entry.ends_at = ends_at;
        if let Some(pad_id) = pad_id {
            entry.pad_id = Some(pad_id);
        }
        let detail = format!("updated block `{}`", entry.title);
        board.schedule.sort_by_key(|entry| entry.starts_at);
        Ok(Applied::Mutated(detail))
    })
    .await
}

/// Remove a schedule block.
pub async fn schedule_delete(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    mutate(state, None, "schedule_delete", move |board, _, _| {
        let before = board.schedule.len();
        board.schedule.retain(|entry| entry.id != id);
        if board.schedule.len() == before {
            return Err(ServiceError::NotFound(format!("schedule block {id}")));
        }
        Ok(Applied::Mutated("removed a block".into()))
    })
    .await
}

/// Go live. Occupied pads get report timers from here on.
pub async fn event_start(state: &SharedState) -> Result<(), ServiceError> {
    mutate(state, None, "event_start", move |board, _, wall| {
        if !board.event.start(wall) {
            return Ok(Applied::Rejected("event already live".into()));
        }
        Ok(Applied::Mutated("event live".into()))
    })
    .await
}

/// Freeze the event clock. Every visible countdown stops moving.
pub async fn event_pause(state: &SharedState) -> Result<(), ServiceError> {
    mutate(state, None, "event_pause", move |board, _, wall| {
        if !board.event.pause(wall) {
            return Ok(Applied::Rejected("event is not running".into()));
        }
        Ok(Applied::Mutated("event paused".into()))
    })
    .await
}

/// Unfreeze the event clock with no visible countdown jump.
pub async fn event_resume(state: &SharedState) -> Result<(), ServiceError> {
    mutate(state, None, "event_resume", move |board, _, wall| {
        if !board.event.resume(wall) {
            return Ok(Applied::Rejected("event is not paused".into()));
        }
        Ok(Applied::Mutated("event resumed".into()))
    })
    .await
}

/// Drop back to planning. Timers disappear until the next start.
pub async fn event_set_planning(state: &SharedState) -> Result<(), ServiceError> {
    mutate(state, None, "event_set_planning", move |board, _, _| {
        if !board.event.set_planning() {
            return Ok(Applied::Rejected("event already in planning".into()));
        }
        Ok(Applied::Mutated("event back to planning".into()))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        services::chat_saver,
        state::{AppState, chat::ChatStore, pad::PadStatus},
    };

    fn test_state() -> SharedState {
        let (handle, _queue) = chat_saver::channel();
        AppState::new(AppConfig::default(), ChatStore::default(), handle)
    }

    fn competitor(id: &str) -> TeamInput {
        TeamInput {
            id: id.to_owned(),
            name: format!("Team {id}"),
            unit: None,
            category: None,
            division: None,
        }
    }

    async fn seeded_state() -> SharedState {
        let state = test_state();
        pad_ensure(&state, 1).await.unwrap();
        queue_insert(&state, 1, competitor("alpha"), InsertSlot::Now)
            .await
            .unwrap();
        state
    }

    #[tokio::test]
    async fn a_global_break_refuses_completions_and_leaves_a_trace() {
        let state = seeded_state().await;
        global_break_set(&state, 10, Some("lunch".into()))
            .await
            .unwrap();

        let err = queue_complete(&state, 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let store = state.store().read().await;
        assert_eq!(store.board.pads[&1].now.as_ref().unwrap().id, "alpha");
        let last = store.audit.entries().last().unwrap();
        assert_eq!(last.action, "queue_complete");
        assert!(last.detail.contains("global break"));
    }

    #[tokio::test]
    async fn a_global_break_refuses_local_breaks_and_leaves_a_trace() {
        let state = seeded_state().await;
        global_break_set(&state, 10, None).await.unwrap();

        let err = break_start(&state, 1, 5, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let store = state.store().read().await;
        assert!(store.board.pads[&1].break_until_at.is_none());
        let last = store.audit.entries().last().unwrap();
        assert_eq!(last.action, "break_start");
        assert!(last.detail.contains("global break"));
    }

    #[tokio::test]
    async fn undo_rewinds_to_the_board_before_the_last_action() {
        let state = seeded_state().await;
        let before = state.store().read().await.board.clone();

        queue_insert(&state, 1, competitor("beta"), InsertSlot::End)
            .await
            .unwrap();
        queue_undo(&state, 1).await.unwrap();

        // Restored boards are re-stamped so clients treat them as fresh;
        // everything else must come back exactly as it was.
        let store = state.store().read().await;
        let mut restored = store.board.clone();
        restored.updated_at = before.updated_at;
        assert_eq!(restored, before);
    }

    #[tokio::test]
    async fn undo_on_an_untouched_pad_is_refused() {
        let state = test_state();
        pad_ensure(&state, 2).await.unwrap();

        let err = queue_undo(&state, 2).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn going_live_arms_deadlines_for_occupied_pads() {
        let state = seeded_state().await;
        {
            let store = state.store().read().await;
            assert!(store.board.pads[&1].report_by_deadline_at.is_none());
        }

        event_start(&state).await.unwrap();

        let store = state.store().read().await;
        let pad = &store.board.pads[&1];
        assert!(pad.report_by_deadline_at.is_some());
        assert_eq!(pad.report_by_team_id.as_deref(), Some("alpha"));
        assert_eq!(pad.status, PadStatus::Reporting);
    }

    #[tokio::test]
    async fn inserting_the_same_competitor_twice_is_refused() {
        let state = seeded_state().await;

        let err = queue_insert(&state, 1, competitor("alpha"), InsertSlot::End)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let store = state.store().read().await;
        assert!(store.board.pads[&1].standby.is_empty());
    }
}
