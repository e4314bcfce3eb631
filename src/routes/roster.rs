use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::{
        claim::RoleClaim,
        roster::{RosterLoadRequest, RosterLoadResponse},
    },
    error::AppError,
    services::roster_service,
    state::SharedState,
};

/// Routes seeding the board from an uploaded roster.
pub fn router() -> Router<SharedState> {
    Router::new().route("/roster/load", post(load_roster))
}

#[utoipa::path(
    post,
    path = "/roster/load",
    tag = "roster",
    request_body = RosterLoadRequest,
    responses(
        (status = 200, description = "Board replaced with the seeded roster", body = RosterLoadResponse)
    )
)]
/// Replace the whole board with one seeded from the uploaded roster.
pub async fn load_roster(
    State(state): State<SharedState>,
    claim: RoleClaim,
    Json(payload): Json<RosterLoadRequest>,
) -> Result<Json<RosterLoadResponse>, AppError> {
    if !claim.role.is_operator() {
        return Err(AppError::Forbidden(
            "only operators may load a roster".into(),
        ));
    }
    let summary = roster_service::load(&state, payload).await?;
    Ok(Json(summary))
}
