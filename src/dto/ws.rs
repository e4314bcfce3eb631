//! WebSocket protocol: commands accepted from clients and frames pushed back.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{
        board::BoardSnapshot,
        chat::ChatOverview,
        claim::Role,
        validation::{validate_identifier, validate_not_blank},
    },
    state::pad::{DemoteTarget, HeadSlot, InsertSlot, PadId, Team, TeamTag},
};

/// Queue slot accepted by insert commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotDto {
    Now,
    OnDeck,
    End,
}

impl From<SlotDto> for InsertSlot {
    fn from(slot: SlotDto) -> Self {
        match slot {
            SlotDto::Now => InsertSlot::Now,
            SlotDto::OnDeck => InsertSlot::OnDeck,
            SlotDto::End => InsertSlot::End,
        }
    }
}

/// Head slot accepted by assign and demote commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HeadSlotDto {
    Now,
    OnDeck,
}

impl From<HeadSlotDto> for HeadSlot {
    fn from(slot: HeadSlotDto) -> Self {
        match slot {
            HeadSlotDto::Now => HeadSlot::Now,
            HeadSlotDto::OnDeck => HeadSlot::OnDeck,
        }
    }
}

/// Standby position accepted by demote commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DemoteTargetDto {
    Top,
    End,
}

impl From<DemoteTargetDto> for DemoteTarget {
    fn from(target: DemoteTargetDto) -> Self {
        match target {
            DemoteTargetDto::Top => DemoteTarget::Top,
            DemoteTargetDto::End => DemoteTarget::End,
        }
    }
}

/// Competitor marker accepted by tag commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TeamTagInput {
    Skipped,
    Disqualified,
    Manual,
}

impl From<TeamTagInput> for TeamTag {
    fn from(tag: TeamTagInput) -> Self {
        match tag {
            TeamTagInput::Skipped => TeamTag::Skipped,
            TeamTagInput::Disqualified => TeamTag::Disqualified,
            TeamTagInput::Manual => TeamTag::Manual,
        }
    }
}

/// Competitor definition carried by insert commands.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TeamInput {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub division: Option<String>,
}

impl TeamInput {
    /// Build the queue entry, untagged.
    pub fn into_team(self) -> Team {
        Team {
            id: self.id,
            name: self.name,
            unit: self.unit,
            category: self.category,
            division: self.division,
            tag: None,
        }
    }
}

impl Validate for TeamInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(error) = validate_identifier(&self.id) {
            errors.add("id", error);
        }
        if let Err(error) = validate_not_blank(&self.name) {
            errors.add("name", error);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// One inbound WebSocket frame: a command plus an optional correlation id
/// echoed back in the acknowledgement.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CommandFrame {
    #[serde(default)]
    pub req_id: Option<String>,
    #[serde(flatten)]
    pub command: ClientCommand,
}

/// Commands accepted from WebSocket clients.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Bind this connection to a pad (judges must, viewers may).
    JoinPad { pad_id: PadId },
    /// Heartbeat carrying an optional display name.
    PresencePing {
        #[serde(default)]
        name: Option<String>,
    },
    /// Insert a new competitor into a queue slot.
    QueueInsert {
        pad_id: PadId,
        team: TeamInput,
        slot: SlotDto,
    },
    /// Finish the current occupant and advance the queue.
    QueueComplete { pad_id: PadId },
    /// Exchange the now and on-deck occupants.
    QueueSwap { pad_id: PadId },
    /// Park the on-deck competitor at the end of standby.
    QueueSkipOnDeck { pad_id: PadId },
    /// Move a head-slot occupant back into standby.
    QueueDemote {
        pad_id: PadId,
        from: HeadSlotDto,
        to: DemoteTargetDto,
    },
    /// Move a competitor already on the pad into a head slot.
    QueueAssign {
        pad_id: PadId,
        team_id: String,
        slot: HeadSlotDto,
    },
    /// Set or clear the marker on a competitor.
    QueueTag {
        pad_id: PadId,
        team_id: String,
        #[serde(default)]
        tag: Option<TeamTagInput>,
    },
    /// Empty the whole queue of a pad.
    QueueClear { pad_id: PadId },
    /// Restore the board to before the last action on this pad.
    QueueUndo { pad_id: PadId },
    /// Stamp the current occupant as arrived.
    MarkArrived { pad_id: PadId },
    /// Start the run clock for the current occupant.
    StartRun { pad_id: PadId },
    /// Freeze or unfreeze a pad without a break window.
    PadHold { pad_id: PadId, on: bool },
    /// Create a pad with the next free number.
    PadCreate {
        #[serde(default)]
        name: Option<String>,
    },
    /// Rename a pad.
    PadRename { pad_id: PadId, name: String },
    /// Delete a pad and its chat channel.
    PadDelete { pad_id: PadId },
    /// Make sure pads 1..=count exist.
    PadEnsure { count: PadId },
    /// Start a pad-local break window.
    BreakStart {
        pad_id: PadId,
        minutes: u32,
        #[serde(default)]
        reason: Option<String>,
    },
    /// End a pad-local break early.
    BreakClear { pad_id: PadId },
    /// Start a break window covering every pad.
    GlobalBreakSet {
        minutes: u32,
        #[serde(default)]
        reason: Option<String>,
    },
    /// End the global break early.
    GlobalBreakClear,
    /// Pin a board-wide notice, optionally time-boxed.
    NoticeSet {
        text: String,
        #[serde(default)]
        minutes: Option<u32>,
    },
    /// Remove the board-wide notice.
    NoticeClear,
    /// Pin a notice to one pad, optionally time-boxed.
    PadNoticeSet {
        pad_id: PadId,
        text: String,
        #[serde(default)]
        minutes: Option<u32>,
    },
    /// Remove the notice of one pad.
    PadNoticeClear { pad_id: PadId },
    /// Append a schedule block.
    ScheduleAdd {
        title: String,
        starts_at: i64,
        ends_at: i64,
        #[serde(default)]
        pad_id: Option<PadId>,
    },
    /// Update fields of a schedule block; absent fields keep their value.
    ScheduleUpdate {
        id: Uuid,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        starts_at: Option<i64>,
        #[serde(default)]
        ends_at: Option<i64>,
        #[serde(default)]
        pad_id: Option<PadId>,
    },
    /// Remove a schedule block.
    ScheduleDelete { id: Uuid },
    /// Go live, allowing report timers to exist.
    EventStart,
    /// Freeze the event clock.
    EventPause,
    /// Unfreeze the event clock with no visible countdown jump.
    EventResume,
    /// Drop back to planning, clearing every timer.
    EventSetPlanning,
    /// Send a chat message into a pad channel.
    ChatSend {
        pad_id: PadId,
        text: String,
        #[serde(default)]
        urgent: bool,
    },
    /// Acknowledge an urgent chat message.
    ChatAck { pad_id: PadId, message_id: Uuid },
    /// Send one message into one or every pad channel.
    ChatBroadcast {
        #[serde(default)]
        pad_id: Option<PadId>,
        text: String,
        #[serde(default)]
        urgent: bool,
    },
    /// Anything this build does not understand.
    #[serde(other)]
    Unknown,
}

impl ClientCommand {
    /// Pad the command is scoped to, for role checks.
    pub fn pad_scope(&self) -> Option<PadId> {
        match self {
            ClientCommand::JoinPad { pad_id }
            | ClientCommand::QueueInsert { pad_id, .. }
            | ClientCommand::QueueComplete { pad_id }
            | ClientCommand::QueueSwap { pad_id }
            | ClientCommand::QueueSkipOnDeck { pad_id }
            | ClientCommand::QueueDemote { pad_id, .. }
            | ClientCommand::QueueAssign { pad_id, .. }
            | ClientCommand::QueueTag { pad_id, .. }
            | ClientCommand::QueueClear { pad_id }
            | ClientCommand::QueueUndo { pad_id }
            | ClientCommand::MarkArrived { pad_id }
            | ClientCommand::StartRun { pad_id }
            | ClientCommand::PadHold { pad_id, .. }
            | ClientCommand::PadRename { pad_id, .. }
            | ClientCommand::PadDelete { pad_id }
            | ClientCommand::BreakStart { pad_id, .. }
            | ClientCommand::BreakClear { pad_id }
            | ClientCommand::PadNoticeSet { pad_id, .. }
            | ClientCommand::PadNoticeClear { pad_id }
            | ClientCommand::ChatSend { pad_id, .. }
            | ClientCommand::ChatAck { pad_id, .. } => Some(*pad_id),
            _ => None,
        }
    }
}

/// Acknowledgement for one command frame.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct CommandAck {
    /// Correlation id echoed from the command, when one was given.
    pub req_id: Option<String>,
    pub ok: bool,
    /// Stable error tag, absent on success.
    pub code: Option<String>,
    /// Human-readable error, absent on success.
    pub message: Option<String>,
}

impl CommandAck {
    /// Positive acknowledgement.
    pub fn accepted(req_id: Option<String>) -> Self {
        Self {
            req_id,
            ok: true,
            code: None,
            message: None,
        }
    }

    /// Negative acknowledgement with a stable code.
    pub fn rejected(req_id: Option<String>, code: &str, message: String) -> Self {
        Self {
            req_id,
            ok: false,
            code: Some(code.to_owned()),
            message: Some(message),
        }
    }
}

/// Confirmation that this connection is now bound to a pad.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinedFrame {
    pub pad_id: PadId,
}

/// One connected client as listed in presence pushes.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PresenceEntry {
    pub role: Role,
    pub name: Option<String>,
    pub pad_id: Option<PadId>,
    /// Wall-clock instant of the last frame seen from this client.
    pub last_seen_ms: i64,
}

/// Everyone connected right now.
#[derive(Debug, Serialize, ToSchema)]
pub struct PresenceSnapshot {
    pub clients: Vec<PresenceEntry>,
}

/// First frame of every WebSocket session.
#[derive(Debug, Serialize, ToSchema)]
pub struct Welcome {
    /// Role the connection was admitted as.
    pub role: Role,
    pub board: BoardSnapshot,
    pub chat: ChatOverview,
    pub presence: PresenceSnapshot,
    /// Whether chat archiving is currently failing.
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_with_correlation_id() {
        let frame: CommandFrame = serde_json::from_str(
            r#"{
                "type": "queue_insert",
                "req_id": "42",
                "pad_id": 3,
                "team": {"id": "a-1", "name": "Crew A"},
                "slot": "on_deck"
            }"#,
        )
        .unwrap();

        assert_eq!(frame.req_id.as_deref(), Some("42"));
        match frame.command {
            ClientCommand::QueueInsert { pad_id, team, slot } => {
                assert_eq!(pad_id, 3);
                assert_eq!(team.id, "a-1");
                assert_eq!(slot, SlotDto::OnDeck);
            }
            other => panic!("parsed into {other:?}"),
        }
    }

    #[test]
    fn unit_commands_need_only_a_type() {
        let frame: CommandFrame = serde_json::from_str(r#"{"type": "event_pause"}"#).unwrap();
        assert!(frame.req_id.is_none());
        assert!(matches!(frame.command, ClientCommand::EventPause));
    }

    #[test]
    fn unknown_types_parse_as_unknown() {
        let frame: CommandFrame =
            serde_json::from_str(r#"{"type": "teleport", "pad_id": 1}"#).unwrap();
        assert!(matches!(frame.command, ClientCommand::Unknown));
    }

    #[test]
    fn optional_fields_default_quietly() {
        let frame: CommandFrame =
            serde_json::from_str(r#"{"type": "chat_send", "pad_id": 2, "text": "hi"}"#).unwrap();
        match frame.command {
            ClientCommand::ChatSend {
                pad_id,
                text,
                urgent,
            } => {
                assert_eq!(pad_id, 2);
                assert_eq!(text, "hi");
                assert!(!urgent);
            }
            other => panic!("parsed into {other:?}"),
        }
    }

    #[test]
    fn pad_scope_covers_pad_commands_only() {
        let scoped: CommandFrame =
            serde_json::from_str(r#"{"type": "queue_complete", "pad_id": 5}"#).unwrap();
        assert_eq!(scoped.command.pad_scope(), Some(5));

        let global: CommandFrame = serde_json::from_str(r#"{"type": "event_start"}"#).unwrap();
        assert_eq!(global.command.pad_scope(), None);

        let broadcast: CommandFrame =
            serde_json::from_str(r#"{"type": "chat_broadcast", "text": "all pads"}"#).unwrap();
        assert_eq!(broadcast.command.pad_scope(), None);
    }
}
