use std::convert::Infallible;

use axum::{
    Router,
    extract::{Query, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    error::AppError,
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

/// `EventSource` cannot set headers, so the token travels in the query string.
#[derive(Debug, Deserialize, IntoParams)]
pub struct StreamQuery {
    /// Session token returned by a login endpoint.
    pub token: Uuid,
}

#[utoipa::path(
    get,
    path = "/sse/player",
    tag = "sse",
    params(StreamQuery),
    responses((status = 200, description = "Player projection and game state", content_type = "text/event-stream", body = String))
)]
/// Stream the player projection and game state of a player session.
pub async fn player_stream(
    State(state): State<SharedState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let session = state
        .session(&query.token)
        .filter(|session| session.player().is_some())
        .ok_or_else(|| AppError::Unauthorized("unknown player session".into()))?;
    info!(session = %session.id(), "New player SSE connection");
    let events = sse_service::session_events(&session, state.degraded_watcher(), StreamKind::Player);
    Ok(sse_service::to_sse_stream(events))
}

#[utoipa::path(
    get,
    path = "/sse/admin",
    tag = "sse",
    params(StreamQuery),
    responses((status = 200, description = "Player list and game state", content_type = "text/event-stream", body = String))
)]
/// Stream the player list and game state of an admin session.
pub async fn admin_stream(
    State(state): State<SharedState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let session = state
        .admin_session(&query.token)
        .ok_or_else(|| AppError::Unauthorized("unknown admin session".into()))?;
    info!(session = %session.id(), "New admin SSE connection");
    let events = sse_service::session_events(&session, state.degraded_watcher(), StreamKind::Admin);
    Ok(sse_service::to_sse_stream(events))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/player", get(player_stream))
        .route("/sse/admin", get(admin_stream))
}
