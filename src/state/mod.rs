pub mod audit;
pub mod board;
pub mod chat;
pub mod clock;
mod hub;
pub mod pad;
pub mod undo;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dto::claim::Role,
    services::chat_saver::SaverHandle,
    state::{
        audit::AuditLog,
        board::Board,
        chat::ChatStore,
        clock::wall_now_ms,
        pad::PadId,
        undo::UndoHistory,
    },
};

pub use self::hub::Hub;

pub type SharedState = Arc<AppState>;

/// Presence record for one connected client.
#[derive(Debug, Clone)]
pub struct ClientPresence {
    /// Role the connection authenticated with.
    pub role: Role,
    /// Display name announced by the client, if any.
    pub name: Option<String>,
    /// Pad the connection is bound to, for judges and joined viewers.
    pub pad_id: Option<PadId>,
    /// Wall-clock instant of the last frame seen from this client.
    pub last_seen_ms: i64,
}

/// Board, audit trail and undo history guarded together.
///
/// The three move as one unit: a mutation appends audit, may push undo,
/// and the whole store is replaced wholesale on roster reload.
pub struct StateStore {
    /// The synchronized board itself.
    pub board: Board,
    /// Bounded trail of applied and rejected actions.
    pub audit: AuditLog,
    /// Per-pad undo stacks of board snapshots.
    pub undo: UndoHistory,
}

impl StateStore {
    /// Fresh store around an empty board.
    pub fn new() -> Self {
        Self::with_board(Board::new())
    }

    /// Fresh store around a seeded board, stamping it as touched now.
    pub fn with_board(mut board: Board) -> Self {
        board.updated_at = wall_now_ms();
        Self {
            board,
            audit: AuditLog::default(),
            undo: UndoHistory::default(),
        }
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Central application state storing the board, chat and live connections.
pub struct AppState {
    config: AppConfig,
    store: RwLock<StateStore>,
    chat: RwLock<ChatStore>,
    clients: DashMap<Uuid, ClientPresence>,
    hub: Hub,
    command_gate: Mutex<()>,
    saver: SaverHandle,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// `chat` carries whatever the archive held at boot; the application
    /// starts healthy and only degrades when archive writes begin failing.
    pub fn new(config: AppConfig, chat: ChatStore, saver: SaverHandle) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(false);
        Arc::new(Self {
            config,
            store: RwLock::new(StateStore::new()),
            chat: RwLock::new(chat),
            clients: DashMap::new(),
            hub: Hub::new(32),
            command_gate: Mutex::new(()),
            saver,
            degraded: degraded_tx,
        })
    }

    /// Runtime configuration the process was started with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Board, audit and undo under one lock.
    pub fn store(&self) -> &RwLock<StateStore> {
        &self.store
    }

    /// Chat channels, guarded separately from the board.
    pub fn chat(&self) -> &RwLock<ChatStore> {
        &self.chat
    }

    /// Registry of connected clients keyed by connection id.
    pub fn clients(&self) -> &DashMap<Uuid, ClientPresence> {
        &self.clients
    }

    /// Broadcast hub shared by WebSocket and SSE subscribers.
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Gate serializing whole commands, so no two mutations interleave
    /// between state change and broadcast.
    pub fn command_gate(&self) -> &Mutex<()> {
        &self.command_gate
    }

    /// Ask the background saver to persist chat soon.
    pub fn request_chat_save(&self) {
        self.saver.request_save();
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn set_degraded(&self, value: bool) {
        if self.is_degraded() == value {
            return;
        }

        let _ = self.degraded.send(value);
    }
}
