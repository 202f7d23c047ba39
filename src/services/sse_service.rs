use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    dto::{
        admin::PlayersResponse,
        game::GameStateView,
        player::PlayerView,
        sse::{Handshake, ServerEvent, SystemStatus, events},
    },
    state::{
        Session,
        game::{GameState, Player},
        levels,
    },
};

/// Which projections a stream carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    /// Player projection and game state.
    Player,
    /// Player list and game state.
    Admin,
}

impl StreamKind {
    fn as_str(self) -> &'static str {
        match self {
            StreamKind::Player => "player",
            StreamKind::Admin => "admin",
        }
    }
}

/// Spawn a forwarder that turns the session projections into [`ServerEvent`]s.
///
/// The current value of every projection is sent first. The forwarder ends
/// when the receiver is dropped or the session goes away.
pub fn session_events(
    session: &Session,
    mut degraded: watch::Receiver<bool>,
    kind: StreamKind,
) -> mpsc::Receiver<ServerEvent> {
    let (tx, rx) = mpsc::channel::<ServerEvent>(16);
    let session_id = session.id();
    let mut player = session.watch_player();
    let mut players = session.watch_players();
    let mut game_state = session.watch_game_state();
    let is_admin = kind == StreamKind::Admin;
    let stream_guard = session.open_stream();

    tokio::spawn(async move {
        let _stream_guard = stream_guard;
        let mut initial = vec![json_event(
            events::HANDSHAKE,
            &Handshake {
                stream: kind.as_str().to_string(),
                session: session_id,
                degraded: *degraded.borrow_and_update(),
            },
        )];
        initial.push(game_state_event(&game_state.borrow_and_update()));
        if is_admin {
            initial.push(players_event(
                &players.borrow_and_update(),
                &game_state.borrow(),
            ));
        } else {
            initial.push(player_event(player.borrow_and_update().as_ref()));
        }
        for event in initial.into_iter().flatten() {
            if tx.send(event).await.is_err() {
                return;
            }
        }

        loop {
            let event = tokio::select! {
                _ = tx.closed() => break,
                changed = game_state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *game_state.borrow_and_update();
                    let mut batch = vec![game_state_event(&state)];
                    // Correctness markers depend on the current level.
                    if is_admin {
                        let list = players.borrow().clone();
                        batch.push(players_event(&list, &state));
                    }
                    batch
                }
                changed = player.changed(), if !is_admin => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = player.borrow_and_update().clone();
                    vec![player_event(snapshot.as_ref())]
                }
                changed = players.changed(), if is_admin => {
                    if changed.is_err() {
                        break;
                    }
                    let list = players.borrow_and_update().clone();
                    let state = *game_state.borrow();
                    vec![players_event(&list, &state)]
                }
                changed = degraded.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let flag = *degraded.borrow_and_update();
                    vec![json_event(events::SYSTEM_STATUS, &SystemStatus { degraded: flag })]
                }
            };

            for event in event.into_iter().flatten() {
                if tx.send(event).await.is_err() {
                    debug!(session = %session_id, "SSE receiver dropped");
                    return;
                }
            }
        }

        info!(session = %session_id, stream = kind.as_str(), "SSE stream ended");
    });

    rx
}

/// Convert a session event receiver into an SSE response.
pub fn to_sse_stream(
    receiver: mpsc::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = ReceiverStream::new(receiver).map(|payload| {
        let mut event = Event::default().data(payload.data);
        if let Some(name) = payload.event {
            event = event.event(name);
        }
        Ok::<_, Infallible>(event)
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn json_event<T: Serialize>(name: &str, payload: &T) -> Option<ServerEvent> {
    match ServerEvent::json(Some(name.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event = name, error = %err, "failed to serialise SSE payload");
            None
        }
    }
}

fn player_event(player: Option<&Player>) -> Option<ServerEvent> {
    json_event(events::PLAYER, &player.map(PlayerView::from))
}

fn game_state_event(state: &GameState) -> Option<ServerEvent> {
    let level = levels::level_or_placeholder(state.current_level);
    json_event(events::GAME_STATE, &GameStateView::new(*state, level))
}

fn players_event(players: &[Player], state: &GameState) -> Option<ServerEvent> {
    let level = levels::level_or_placeholder(state.current_level);
    json_event(events::PLAYERS, &PlayersResponse::new(players, level))
}
