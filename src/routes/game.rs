use std::sync::Arc;

use axum::{Extension, Json, Router, middleware, routing::get};

use crate::{
    dto::game::GameStateView,
    routes::session::require_session,
    services::player_service,
    state::{Session, SharedState},
};

/// Read-only game endpoints for any session.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/game/state", get(game_state))
        .route_layer(middleware::from_fn_with_state(state, require_session))
}

/// Game progression and the current question.
#[utoipa::path(
    get,
    path = "/game/state",
    tag = "game",
    params(("X-Session-Token" = String, Header, description = "Player or admin session token")),
    responses((status = 200, description = "Current game state", body = GameStateView))
)]
pub async fn game_state(Extension(session): Extension<Arc<Session>>) -> Json<GameStateView> {
    Json(player_service::game_state(&session))
}
