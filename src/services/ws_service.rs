//! WebSocket sessions: the write path of the protocol.
//!
//! Every session starts with a `welcome` frame carrying the full truth,
//! then receives the same pushes as every other subscriber plus one
//! `ack` frame per command it sends. Commands are gated by the role the
//! connection presented at upgrade time.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::value::RawValue;
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc,
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        chat::ChatOverview,
        claim::{Role, RoleClaim},
        push::ServerEvent,
        ws::{ClientCommand, CommandAck, CommandFrame, JoinedFrame, Welcome},
    },
    error::ServiceError,
    services::{board_service, chat_service, events},
    state::{ClientPresence, SharedState, chat::ChatSender, clock::wall_now_ms, pad::PadId},
};

/// First frame of every session.
const EVENT_WELCOME: &str = "welcome";
/// Reply to one command frame.
const EVENT_ACK: &str = "ack";
/// Confirmation that the connection is bound to a pad.
const EVENT_JOINED: &str = "joined";

/// Writer channel closed; the session must wind down.
#[derive(Debug)]
struct SessionClosed;

/// Mutable per-connection context threaded through command handling.
struct Session {
    conn_id: Uuid,
    role: Role,
    bound_pad: Option<PadId>,
    tx: mpsc::UnboundedSender<Message>,
}

impl Session {
    fn chat_sender(&self) -> ChatSender {
        match self.role {
            Role::Judge => ChatSender::Judge,
            _ => ChatSender::Admin,
        }
    }
}

/// Handle the full lifecycle of one client WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket, claim: RoleClaim) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound frames flowing even while we
    // await inbound ones.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let conn_id = Uuid::new_v4();
    let role = claim.role;
    state.clients().insert(
        conn_id,
        ClientPresence {
            role,
            name: claim.name,
            pad_id: None,
            last_seen_ms: wall_now_ms(),
        },
    );
    info!(%conn_id, ?role, "client connected");

    // Subscribe before capturing the welcome: a mutation landing in
    // between stays buffered in the receiver and arrives as a push
    // instead of vanishing.
    let pushes = state.hub().subscribe();

    let welcome = welcome_frame(&state, role).await;
    if push_frame(&outbound_tx, EVENT_WELCOME, &welcome).is_err() {
        state.clients().remove(&conn_id);
        finalize(writer_task, outbound_tx).await;
        return;
    }
    events::broadcast_presence(&state);

    let forwarder_task = tokio::spawn(forward_pushes(pushes, outbound_tx.clone()));

    let mut session = Session {
        conn_id,
        role,
        bound_pad: None,
        tx: outbound_tx.clone(),
    };

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                touch(&state, conn_id);
                if handle_frame(&state, &mut session, &text).await.is_err() {
                    info!(%conn_id, "writer gone, terminating session");
                    break;
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(%conn_id, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%conn_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.clients().remove(&conn_id);
    info!(%conn_id, "client disconnected");

    forwarder_task.abort();
    finalize(writer_task, outbound_tx).await;
    events::broadcast_presence(&state);
}

/// Forward hub pushes into the session writer until either side closes.
async fn forward_pushes(
    mut receiver: broadcast::Receiver<ServerEvent>,
    tx: mpsc::UnboundedSender<Message>,
) {
    loop {
        match receiver.recv().await {
            Ok(event) => {
                if push_raw(&tx, &event.event, event.data).is_err() {
                    break;
                }
            }
            Err(RecvError::Closed) => break,
            Err(RecvError::Lagged(skipped)) => {
                // Safe to skip: every push carries a full snapshot, so
                // the next one supersedes anything missed.
                debug!(skipped, "session fell behind the hub");
                continue;
            }
        }
    }
}

/// Parse one text frame, run the command and reply with an `ack`.
async fn handle_frame(
    state: &SharedState,
    session: &mut Session,
    text: &str,
) -> Result<(), SessionClosed> {
    let frame: CommandFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(conn_id = %session.conn_id, error = %err, "unreadable command frame");
            let ack = CommandAck::rejected(None, "invalid_input", format!("unreadable frame: {err}"));
            return push_frame(&session.tx, EVENT_ACK, &ack);
        }
    };

    let req_id = frame.req_id;
    let ack = match dispatch(state, session, frame.command).await {
        Ok(()) => CommandAck::accepted(req_id),
        Err(err) => CommandAck::rejected(req_id, err.code(), err.to_string()),
    };
    push_frame(&session.tx, EVENT_ACK, &ack)
}

/// Check the role table, then run the command against the services.
async fn dispatch(
    state: &SharedState,
    session: &mut Session,
    command: ClientCommand,
) -> Result<(), ServiceError> {
    permitted(session.role, session.bound_pad, &command)?;

    match command {
        ClientCommand::JoinPad { pad_id } => join_pad(state, session, pad_id).await,
        ClientCommand::PresencePing { name } => presence_ping(state, session, name),
        ClientCommand::QueueInsert { pad_id, team, slot } => {
            board_service::queue_insert(state, pad_id, team, slot.into()).await
        }
        ClientCommand::QueueComplete { pad_id } => {
            board_service::queue_complete(state, pad_id).await
        }
        ClientCommand::QueueSwap { pad_id } => board_service::queue_swap(state, pad_id).await,
        ClientCommand::QueueSkipOnDeck { pad_id } => {
            board_service::queue_skip_on_deck(state, pad_id).await
        }
        ClientCommand::QueueDemote { pad_id, from, to } => {
            board_service::queue_demote(state, pad_id, from.into(), to.into()).await
        }
        ClientCommand::QueueAssign {
            pad_id,
            team_id,
            slot,
        } => board_service::queue_assign(state, pad_id, team_id, slot.into()).await,
        ClientCommand::QueueTag {
            pad_id,
            team_id,
            tag,
        } => board_service::queue_tag(state, pad_id, team_id, tag.map(Into::into)).await,
        ClientCommand::QueueClear { pad_id } => board_service::queue_clear(state, pad_id).await,
        ClientCommand::QueueUndo { pad_id } => board_service::queue_undo(state, pad_id).await,
        ClientCommand::MarkArrived { pad_id } => board_service::mark_arrived(state, pad_id).await,
        ClientCommand::StartRun { pad_id } => board_service::start_run(state, pad_id).await,
        ClientCommand::PadHold { pad_id, on } => board_service::pad_hold(state, pad_id, on).await,
        ClientCommand::PadCreate { name } => board_service::pad_create(state, name).await,
        ClientCommand::PadRename { pad_id, name } => {
            board_service::pad_rename(state, pad_id, name).await
        }
        ClientCommand::PadDelete { pad_id } => board_service::pad_delete(state, pad_id).await,
        ClientCommand::PadEnsure { count } => board_service::pad_ensure(state, count).await,
        ClientCommand::BreakStart {
            pad_id,
            minutes,
            reason,
        } => board_service::break_start(state, pad_id, minutes, reason).await,
        ClientCommand::BreakClear { pad_id } => board_service::break_clear(state, pad_id).await,
        ClientCommand::GlobalBreakSet { minutes, reason } => {
            board_service::global_break_set(state, minutes, reason).await
        }
        ClientCommand::GlobalBreakClear => board_service::global_break_clear(state).await,
        ClientCommand::NoticeSet { text, minutes } => {
            board_service::notice_set(state, text, minutes).await
        }
        ClientCommand::NoticeClear => board_service::notice_clear(state).await,
        ClientCommand::PadNoticeSet {
            pad_id,
            text,
            minutes,
        } => board_service::pad_notice_set(state, pad_id, text, minutes).await,
        ClientCommand::PadNoticeClear { pad_id } => {
            board_service::pad_notice_clear(state, pad_id).await
        }
        ClientCommand::ScheduleAdd {
            title,
            starts_at,
            ends_at,
            pad_id,
        } => board_service::schedule_add(state, title, starts_at, ends_at, pad_id).await,
        ClientCommand::ScheduleUpdate {
            id,
            title,
            starts_at,
            ends_at,
            pad_id,
        } => board_service::schedule_update(state, id, title, starts_at, ends_at, pad_id).await,
        ClientCommand::ScheduleDelete { id } => board_service::schedule_delete(state, id).await,
        ClientCommand::EventStart => board_service::event_start(state).await,
        ClientCommand::EventPause => board_service::event_pause(state).await,
        ClientCommand::EventResume => board_service::event_resume(state).await,
        ClientCommand::EventSetPlanning => board_service::event_set_planning(state).await,
        ClientCommand::ChatSend {
            pad_id,
            text,
            urgent,
        } => chat_service::send(state, session.chat_sender(), pad_id, text, urgent).await,
        ClientCommand::ChatAck { pad_id, message_id } => {
            chat_service::acknowledge(state, pad_id, message_id).await
        }
        ClientCommand::ChatBroadcast {
            pad_id,
            text,
            urgent,
        } => chat_service::broadcast(state, pad_id, text, urgent).await,
        ClientCommand::Unknown => Err(ServiceError::InvalidInput(
            "unknown command type".into(),
        )),
    }
}

/// Role table for inbound commands.
///
/// Operators may do anything. Judges act only on the pad they joined,
/// with the short command set the pad console exposes. Observers watch.
fn permitted(
    role: Role,
    bound_pad: Option<PadId>,
    command: &ClientCommand,
) -> Result<(), ServiceError> {
    match role {
        Role::Operator => Ok(()),
        Role::Judge => match command {
            ClientCommand::JoinPad { .. } | ClientCommand::PresencePing { .. } => Ok(()),
            ClientCommand::QueueComplete { .. }
            | ClientCommand::MarkArrived { .. }
            | ClientCommand::StartRun { .. }
            | ClientCommand::BreakStart { .. }
            | ClientCommand::BreakClear { .. }
            | ClientCommand::ChatSend { .. }
            | ClientCommand::ChatAck { .. } => match (bound_pad, command.pad_scope()) {
                (Some(bound), Some(target)) if bound == target => Ok(()),
                (None, _) => Err(ServiceError::Forbidden(
                    "join a pad before acting on it".into(),
                )),
                _ => Err(ServiceError::Forbidden(
                    "judges may only act on their own pad".into(),
                )),
            },
            _ => Err(ServiceError::Forbidden(
                "judges may not use this command".into(),
            )),
        },
        Role::Observer => match command {
            ClientCommand::JoinPad { .. } | ClientCommand::PresencePing { .. } => Ok(()),
            _ => Err(ServiceError::Forbidden(
                "observers may not change the board".into(),
            )),
        },
    }
}

/// Bind the connection to a pad and confirm with a `joined` frame.
async fn join_pad(
    state: &SharedState,
    session: &mut Session,
    pad_id: PadId,
) -> Result<(), ServiceError> {
    {
        let store = state.store().read().await;
        if !store.board.pads.contains_key(&pad_id) {
            return Err(ServiceError::NotFound(format!("pad {pad_id}")));
        }
    }

    session.bound_pad = Some(pad_id);
    if let Some(mut entry) = state.clients().get_mut(&session.conn_id) {
        entry.pad_id = Some(pad_id);
    }

    let _ = push_frame(&session.tx, EVENT_JOINED, &JoinedFrame { pad_id });
    events::broadcast_presence(state);
    Ok(())
}

/// Refresh the heartbeat and pick up a display-name change.
fn presence_ping(
    state: &SharedState,
    session: &Session,
    name: Option<String>,
) -> Result<(), ServiceError> {
    let name = name
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty());

    let mut renamed = false;
    if let Some(mut entry) = state.clients().get_mut(&session.conn_id) {
        entry.last_seen_ms = wall_now_ms();
        if let Some(name) = name {
            if entry.name.as_deref() != Some(name.as_str()) {
                entry.name = Some(name);
                renamed = true;
            }
        }
    }

    if renamed {
        events::broadcast_presence(state);
    }
    Ok(())
}

fn touch(state: &SharedState, conn_id: Uuid) {
    if let Some(mut entry) = state.clients().get_mut(&conn_id) {
        entry.last_seen_ms = wall_now_ms();
    }
}

async fn welcome_frame(state: &SharedState, role: Role) -> Welcome {
    let board = events::capture_board(state).await;
    let chat = {
        let chat = state.chat().read().await;
        ChatOverview::capture(&chat)
    };
    Welcome {
        role,
        board,
        chat,
        presence: events::presence_snapshot(state),
        degraded: state.is_degraded(),
    }
}

#[derive(Serialize)]
struct OutboundFrame<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    data: &'a RawValue,
}

/// Serialize a payload and queue it on the session writer.
///
/// Serialization failures are logged and swallowed, they cannot heal by
/// retrying. A closed writer surfaces so the session can wind down.
fn push_frame<T>(
    tx: &mpsc::UnboundedSender<Message>,
    kind: &str,
    payload: &T,
) -> Result<(), SessionClosed>
where
    T: Serialize,
{
    match serde_json::to_string(payload) {
        Ok(data) => push_raw(tx, kind, data),
        Err(err) => {
            warn!(kind, error = %err, "failed to serialize outbound frame");
            Ok(())
        }
    }
}

/// Wrap already-serialized JSON into the typed frame envelope and queue it.
fn push_raw(
    tx: &mpsc::UnboundedSender<Message>,
    kind: &str,
    data: String,
) -> Result<(), SessionClosed> {
    let data = match RawValue::from_string(data) {
        Ok(data) => data,
        Err(err) => {
            warn!(kind, error = %err, "push payload is not valid JSON");
            return Ok(());
        }
    };
    let frame = OutboundFrame { kind, data: &data };
    match serde_json::to_string(&frame) {
        Ok(text) => tx
            .send(Message::Text(text.into()))
            .map_err(|_| SessionClosed),
        Err(err) => {
            warn!(kind, error = %err, "failed to serialize outbound frame");
            Ok(())
        }
    }
}

/// Ensure the writer task winds down before we return from the handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Hub;

    fn complete(pad_id: PadId) -> ClientCommand {
        ClientCommand::QueueComplete { pad_id }
    }

    #[test]
    fn operators_pass_the_role_table_everywhere() {
        assert!(permitted(Role::Operator, None, &complete(1)).is_ok());
        assert!(permitted(Role::Operator, None, &ClientCommand::EventStart).is_ok());
        assert!(
            permitted(
                Role::Operator,
                None,
                &ClientCommand::GlobalBreakSet {
                    minutes: 10,
                    reason: None
                }
            )
            .is_ok()
        );
    }

    #[test]
    fn judges_act_only_on_their_bound_pad() {
        assert!(permitted(Role::Judge, Some(3), &complete(3)).is_ok());
        assert!(permitted(Role::Judge, Some(3), &complete(4)).is_err());
        assert!(permitted(Role::Judge, None, &complete(3)).is_err());
        assert!(
            permitted(
                Role::Judge,
                Some(3),
                &ClientCommand::ChatSend {
                    pad_id: 3,
                    text: "running late".into(),
                    urgent: false
                }
            )
            .is_ok()
        );
    }

    #[test]
    fn judges_never_get_board_wide_commands() {
        assert!(permitted(Role::Judge, Some(3), &ClientCommand::EventStart).is_err());
        assert!(
            permitted(
                Role::Judge,
                Some(3),
                &ClientCommand::QueueClear { pad_id: 3 }
            )
            .is_err()
        );
        assert!(
            permitted(
                Role::Judge,
                Some(3),
                &ClientCommand::ChatBroadcast {
                    pad_id: None,
                    text: "hi".into(),
                    urgent: false
                }
            )
            .is_err()
        );
    }

    #[test]
    fn observers_may_only_watch() {
        assert!(permitted(Role::Observer, None, &ClientCommand::JoinPad { pad_id: 2 }).is_ok());
        assert!(
            permitted(
                Role::Observer,
                None,
                &ClientCommand::PresencePing { name: None }
            )
            .is_ok()
        );
        assert!(permitted(Role::Observer, Some(2), &complete(2)).is_err());
        assert!(permitted(Role::Observer, None, &ClientCommand::EventPause).is_err());
    }

    #[tokio::test]
    async fn frames_carry_a_typed_envelope() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        push_frame(&tx, EVENT_ACK, &CommandAck::accepted(Some("7".into()))).unwrap();

        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "ack");
        assert_eq!(value["data"]["req_id"], "7");
        assert_eq!(value["data"]["ok"], true);
    }

    #[tokio::test]
    async fn raw_pushes_pass_through_unchanged() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        push_raw(&tx, "board", r#"{"pads":[]}"#.to_owned()).unwrap();

        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "board");
        assert!(value["data"]["pads"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pushes_between_subscribe_and_forward_still_arrive() {
        let hub = Hub::new(8);
        let receiver = hub.subscribe();

        // Broadcast while the session is still assembling its welcome.
        hub.broadcast(ServerEvent {
            event: "board".to_owned(),
            data: r#"{"pads":[]}"#.to_owned(),
        });

        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let forwarder = tokio::spawn(forward_pushes(receiver, tx));

        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "board");

        forwarder.abort();
    }
}
