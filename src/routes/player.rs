use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::player::{AnswerRequest, LoginRequest, LoginResponse, PlayerView},
    error::AppError,
    routes::session::require_session,
    services::player_service,
    state::{Session, SharedState},
};

/// Player login plus the endpoints that need a player session.
pub fn router(state: SharedState) -> Router<SharedState> {
    let authenticated = Router::new()
        .route("/player/me", get(me))
        .route("/player/answer", post(submit_answer))
        .route_layer(middleware::from_fn_with_state(state, require_session));

    Router::new()
        .route("/player/login", post(login))
        .merge(authenticated)
}

/// Claim a room code and open a player session.
#[utoipa::path(
    post,
    path = "/player/login",
    tag = "player",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login outcome; `token` is set on success", body = LoginResponse),
        (status = 503, description = "Storage unavailable"),
    )
)]
pub async fn login(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<LoginRequest>>,
) -> Result<Json<LoginResponse>, AppError> {
    Ok(Json(player_service::login(&state, payload).await?))
}

/// Current projection of the session's player.
#[utoipa::path(
    get,
    path = "/player/me",
    tag = "player",
    params(("X-Session-Token" = String, Header, description = "Token returned by /player/login")),
    responses(
        (status = 200, description = "Player projection", body = PlayerView),
        (status = 404, description = "No player on this session"),
    )
)]
pub async fn me(Extension(session): Extension<Arc<Session>>) -> Result<Json<PlayerView>, AppError> {
    Ok(Json(player_service::me(&session)?))
}

/// Submit the answer for a level.
#[utoipa::path(
    post,
    path = "/player/answer",
    tag = "player",
    params(("X-Session-Token" = String, Header, description = "Token returned by /player/login")),
    request_body = AnswerRequest,
    responses(
        (status = 204, description = "Answer recorded"),
        (status = 409, description = "Level locked or player eliminated"),
        (status = 503, description = "Storage unavailable"),
    )
)]
pub async fn submit_answer(
    Extension(session): Extension<Arc<Session>>,
    Valid(Json(payload)): Valid<Json<AnswerRequest>>,
) -> Result<StatusCode, AppError> {
    player_service::submit_answer(&session, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}
