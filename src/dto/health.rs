use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Connected WebSocket and SSE clients.
    pub clients: usize,
}

impl HealthResponse {
    /// Health response indicating the system is fully operational.
    pub fn ok(clients: usize) -> Self {
        Self {
            status: "ok".to_string(),
            clients,
        }
    }

    /// Health response indicating chat archiving is failing.
    pub fn degraded(clients: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            clients,
        }
    }
}
