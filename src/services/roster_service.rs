//! Roster upload: replace the whole board with a freshly seeded one.

use tracing::info;
use validator::Validate;

use crate::{
    dto::roster::{RosterLoadRequest, RosterLoadResponse},
    error::ServiceError,
    services::events,
    state::{
        SharedState, StateStore,
        board::{Board, MAX_PADS},
        clock::wall_now_ms,
        pad::Team,
    },
};

/// Replace the board with one seeded from the uploaded roster.
///
/// Entry order within a pad is queue order: the first competitor lands
/// in `now`, the second on deck, the rest in standby. The new board
/// starts in planning with no timers running, and the audit trail and
/// undo history restart from scratch. Chat channels survive the reload.
pub async fn load(
    state: &SharedState,
    request: RosterLoadRequest,
) -> Result<RosterLoadResponse, ServiceError> {
    request.validate()?;

    let _gate = state.command_gate().lock().await;
    let wall = wall_now_ms();
    let window = state.config().report_window_ms;

    let mut board = Board::new();
    let mut teams = 0usize;
    let mut skipped = 0usize;

    for entry in request.entries {
        let pad = board.pad_or_create(entry.pad_id);
        if let Some(name) = entry.pad_name.filter(|name| !name.trim().is_empty()) {
            pad.name = name.trim().to_owned();
        }
        if let Some(label) = entry.pad_label.filter(|label| !label.trim().is_empty()) {
            pad.label = Some(label.trim().to_owned());
        }
        if pad.contains(&entry.team_id) {
            skipped += 1;
            continue;
        }
        pad.standby.push(Team {
            id: entry.team_id,
            name: entry.team_name,
            unit: entry.unit,
            category: entry.category,
            division: entry.division,
            tag: None,
        });
        teams += 1;
    }

    if board.pads.len() > MAX_PADS {
        return Err(ServiceError::InvalidInput(format!(
            "roster spans more than {MAX_PADS} pads"
        )));
    }

    // Pull the head of each queue into the calling slots.
    for pad in board.pads.values_mut() {
        if pad.now.is_none() && !pad.standby.is_empty() {
            pad.now = Some(pad.standby.remove(0));
        }
        if pad.on_deck.is_none() && !pad.standby.is_empty() {
            pad.on_deck = Some(pad.standby.remove(0));
        }
    }

    let pads = board.pads.len();

    {
        let mut store = state.store().write().await;
        *store = StateStore::with_board(board);
        store.audit.record(
            wall,
            None,
            "roster_load",
            format!("seeded {pads} pads with {teams} competitors, {skipped} duplicates skipped"),
        );
        store.board.sanitize(wall, window);
    }

    info!(pads, teams, skipped, "roster loaded");
    events::broadcast_board(state).await;

    Ok(RosterLoadResponse {
        pads,
        teams,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dto::roster::RosterEntryInput,
        services::chat_saver,
        state::{AppState, chat::ChatStore, clock::EventStatus, pad::PadId},
    };

    fn test_state() -> SharedState {
        let (handle, _queue) = chat_saver::channel();
        AppState::new(AppConfig::default(), ChatStore::default(), handle)
    }

    fn entry(pad_id: PadId, team_id: &str) -> RosterEntryInput {
        RosterEntryInput {
            pad_id,
            team_id: team_id.to_owned(),
            team_name: format!("Team {team_id}"),
            unit: None,
            category: None,
            division: None,
            pad_name: None,
            pad_label: None,
        }
    }

    #[tokio::test]
    async fn a_fresh_roster_stays_in_planning_with_no_deadlines() {
        let state = test_state();
        let request = RosterLoadRequest {
            entries: vec![
                entry(1, "a-1"),
                entry(1, "a-2"),
                entry(1, "a-3"),
                entry(2, "b-1"),
            ],
        };

        let summary = load(&state, request).await.unwrap();
        assert_eq!(summary.pads, 2);
        assert_eq!(summary.teams, 4);
        assert_eq!(summary.skipped, 0);

        let store = state.store().read().await;
        assert_eq!(store.board.event.status, EventStatus::Planning);
        let pad = &store.board.pads[&1];
        assert_eq!(pad.now.as_ref().unwrap().id, "a-1");
        assert_eq!(pad.on_deck.as_ref().unwrap().id, "a-2");
        assert_eq!(pad.standby.len(), 1);
        for pad in store.board.pads.values() {
            assert!(pad.report_by_deadline_at.is_none());
        }
    }

    #[tokio::test]
    async fn duplicate_ids_on_one_pad_are_skipped() {
        let state = test_state();
        let request = RosterLoadRequest {
            entries: vec![entry(3, "c-1"), entry(3, "c-1"), entry(3, "c-2")],
        };

        let summary = load(&state, request).await.unwrap();
        assert_eq!(summary.teams, 2);
        assert_eq!(summary.skipped, 1);

        let store = state.store().read().await;
        let pad = &store.board.pads[&3];
        assert_eq!(pad.now.as_ref().unwrap().id, "c-1");
        assert_eq!(pad.on_deck.as_ref().unwrap().id, "c-2");
        assert!(pad.standby.is_empty());
    }

    #[tokio::test]
    async fn a_reload_replaces_the_previous_board_wholesale() {
        let state = test_state();
        let first = RosterLoadRequest {
            entries: vec![entry(1, "a-1")],
        };
        load(&state, first).await.unwrap();
        let second = RosterLoadRequest {
            entries: vec![entry(5, "e-1")],
        };
        load(&state, second).await.unwrap();

        let store = state.store().read().await;
        assert!(!store.board.pads.contains_key(&1));
        assert!(store.board.pads.contains_key(&5));
        // Audit restarts with the reload; only its own entry remains.
        assert_eq!(store.audit.len(), 1);
    }
}
