use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for OnDeck Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::board::board_snapshot,
        crate::routes::board::chat_overview,
        crate::routes::roster::load_roster,
        crate::routes::sse::board_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::board::BoardSnapshot,
            crate::dto::chat::ChatOverview,
            crate::dto::roster::RosterLoadRequest,
            crate::dto::roster::RosterLoadResponse,
            crate::dto::ws::CommandFrame,
            crate::dto::ws::CommandAck,
            crate::dto::ws::Welcome,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "board", description = "Board snapshot reads"),
        (name = "chat", description = "Pad chat channels"),
        (name = "roster", description = "Roster upload"),
    )
)]
pub struct ApiDoc;
