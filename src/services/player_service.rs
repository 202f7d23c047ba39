use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::{
    dto::{
        game::GameStateView,
        player::{AnswerRequest, LoginRequest, LoginResponse, PlayerView},
    },
    error::ServiceError,
    state::{Session, SharedState},
};

/// Open a session and claim the requested room code.
///
/// Unknown codes and hidden store failures both yield an unsuccessful response
/// rather than an error; nothing is registered in that case.
pub async fn login(
    state: &SharedState,
    request: LoginRequest,
) -> Result<LoginResponse, ServiceError> {
    let session = state.open_session().await?;
    if !session.login(&request.name, &request.code).await {
        return Ok(LoginResponse::rejected());
    }
    let token = state.register_session(session).await;
    Ok(LoginResponse::accepted(token))
}

/// Projection of the logged-in player.
pub fn me(session: &Session) -> Result<PlayerView, ServiceError> {
    session
        .player()
        .map(|player| PlayerView::from(&player))
        .ok_or_else(|| ServiceError::NotFound("no player is logged in on this session".into()))
}

/// Record an answer for the session's player.
///
/// Eliminated players and locked levels are refused before reaching the store.
pub async fn submit_answer(session: &Session, request: AnswerRequest) -> Result<(), ServiceError> {
    let player = session
        .player()
        .ok_or_else(|| ServiceError::Unauthorized("no player is logged in".into()))?;
    if !player.is_alive() {
        return Err(ServiceError::InvalidState(
            "eliminated players cannot answer".into(),
        ));
    }
    if session.game_state().is_level_locked {
        return Err(ServiceError::InvalidState("the level is locked".into()));
    }

    session
        .submit_answer(request.level, request.answer.trim())
        .await?;
    Ok(())
}

/// Current game state and question as seen by `session`.
pub fn game_state(session: &Session) -> GameStateView {
    GameStateView::new(session.game_state(), session.current_level_data())
}

/// Close and forget the session bound to `token`.
pub async fn logout(state: &SharedState, token: Uuid) -> Result<(), ServiceError> {
    if state.remove_session(&token).await {
        info!(session = %token, "session closed by client");
        Ok(())
    } else {
        Err(ServiceError::NotFound(format!("session {token}")))
    }
}

/// Resolve a session token.
pub fn resolve_session(state: &SharedState, token: Uuid) -> Result<Arc<Session>, ServiceError> {
    state
        .session(&token)
        .ok_or_else(|| ServiceError::Unauthorized("unknown or expired session token".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            document_store::{DocumentStore, memory::MemoryDocumentStore},
            models::{GameStatePatch, PlayerStatus, PlayerUpdate},
        },
        state::AppState,
    };

    async fn state_with(store: MemoryDocumentStore) -> SharedState {
        let state = AppState::new(AppConfig::default());
        state.install_store(Arc::new(store)).await;
        state
    }

    fn login_request(code: &str) -> LoginRequest {
        LoginRequest {
            name: "Sae-byeok".into(),
            code: code.into(),
        }
    }

    #[tokio::test]
    async fn login_registers_only_successful_sessions() {
        let state = state_with(MemoryDocumentStore::with_codes(["K7P2QX"])).await;

        let rejected = login(&state, login_request("ZZZZZZ")).await.unwrap();
        assert!(!rejected.success);
        assert_eq!(state.session_count(), 0);

        let accepted = login(&state, login_request("k7p2qx")).await.unwrap();
        let token = accepted.token.unwrap();
        let session = resolve_session(&state, token).unwrap();
        assert_eq!(me(&session).unwrap().id, "K7P2QX");

        logout(&state, token).await.unwrap();
        assert!(matches!(
            logout(&state, token).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn login_while_degraded_is_unavailable() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            login(&state, login_request("K7P2QX")).await,
            Err(ServiceError::Degraded)
        ));
    }

    #[tokio::test]
    async fn locked_level_refuses_answers() {
        let store = MemoryDocumentStore::with_codes(["K7P2QX"]);
        store
            .merge_game_state(GameStatePatch::enter_level(2))
            .await
            .unwrap();
        store.update_game_state(GameStatePatch::lock(true)).await.unwrap();
        let state = state_with(store.clone()).await;

        let token = login(&state, login_request("K7P2QX"))
            .await
            .unwrap()
            .token
            .unwrap();
        let session = resolve_session(&state, token).unwrap();
        let mut game = session.watch_game_state();
        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            game.wait_for(|state| state.is_level_locked),
        )
        .await
        .unwrap()
        .unwrap();

        let request = AnswerRequest {
            level: 2,
            answer: "triangulo".into(),
        };
        assert!(matches!(
            submit_answer(&session, request).await,
            Err(ServiceError::InvalidState(_))
        ));
        let stored = store.find_player("K7P2QX".into()).await.unwrap().unwrap();
        assert!(stored.answers.is_empty());
    }

    #[tokio::test]
    async fn eliminated_player_cannot_answer() {
        let store = MemoryDocumentStore::with_codes(["K7P2QX"]);
        let state = state_with(store.clone()).await;
        let token = login(&state, login_request("K7P2QX"))
            .await
            .unwrap()
            .token
            .unwrap();
        let session = resolve_session(&state, token).unwrap();

        store
            .update_player("K7P2QX".into(), PlayerUpdate::Status(PlayerStatus::Eliminated))
            .await
            .unwrap();
        let mut player = session.watch_player();
        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            player.wait_for(|p| p.as_ref().is_some_and(|p| !p.is_alive())),
        )
        .await
        .unwrap()
        .unwrap();

        let request = AnswerRequest {
            level: 1,
            answer: "luz roja luz verde".into(),
        };
        assert!(submit_answer(&session, request).await.is_err());
    }

    #[tokio::test]
    async fn game_state_view_uses_catalog_question() {
        let state = state_with(MemoryDocumentStore::with_codes(["K7P2QX"])).await;
        let token = login(&state, login_request("K7P2QX"))
            .await
            .unwrap()
            .token
            .unwrap();
        let view = game_state(&resolve_session(&state, token).unwrap());
        assert_eq!(view.current_level, 1);
        assert_eq!(view.level.id, 1);
    }
}
