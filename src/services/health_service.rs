use crate::{dto::health::HealthResponse, state::SharedState};

/// Report the archive health and how many clients are listening.
///
/// Degraded means the board still works but chat archive writes are
/// failing, so chat history would not survive a restart.
pub fn health_status(state: &SharedState) -> HealthResponse {
    let clients = state.hub().receiver_count();
    if state.is_degraded() {
        HealthResponse::degraded(clients)
    } else {
        HealthResponse::ok(clients)
    }
}
