//! Business logic powering the admin REST routes. Mutations go through the
//! admin's [`Session`] so failures are handled the same way as in the session
//! actions; reads and setup talk to the store directly.

use rand::{Rng, rng};
use tracing::{info, warn};

use crate::{
    dto::{
        admin::{
            ActionResponse, AdminLoginRequest, LevelLockRequest, PlayersResponse, SetLevelRequest,
            SetupRequest, SetupResponse,
        },
        game::LevelDefinition,
        player::LoginResponse,
    },
    error::ServiceError,
    state::{
        Session, SharedState,
        game::{GameState, Player},
        levels,
    },
};

/// Room code characters. Look-alikes (0/O, 1/I) are left out.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Give up after this many collisions per requested code.
const MAX_ATTEMPTS_PER_CODE: u32 = 8;

/// Open an admin session when the credentials are accepted.
pub async fn login(
    state: &SharedState,
    request: AdminLoginRequest,
) -> Result<LoginResponse, ServiceError> {
    let session = state.open_session().await?;
    if !session.admin_login(&request.email, &request.password).await {
        return Ok(LoginResponse::rejected());
    }
    let token = state.register_session(session).await;
    Ok(LoginResponse::accepted(token))
}

/// Every player with its answer for the current level.
pub async fn list_players(state: &SharedState) -> Result<PlayersResponse, ServiceError> {
    let store = state.require_store().await?;
    let game_state: GameState = store
        .find_game_state()
        .await?
        .map(Into::into)
        .unwrap_or_default();
    let players: Vec<Player> = store
        .list_players()
        .await?
        .into_iter()
        .map(Player::from)
        .collect();

    Ok(PlayersResponse::new(
        &players,
        levels::level_or_placeholder(game_state.current_level),
    ))
}

/// Full level catalog with answers.
pub fn list_levels() -> Vec<LevelDefinition> {
    levels::all().iter().map(LevelDefinition::from).collect()
}

pub async fn set_level(session: &Session, request: SetLevelRequest) -> ActionResponse {
    if levels::level(request.level).is_none() {
        warn!(level = request.level, "moving to a level missing from the catalog");
    }
    session.set_level(request.level).await;
    ActionResponse::new(format!("level {} requested", request.level))
}

pub async fn set_level_lock(session: &Session, request: LevelLockRequest) -> ActionResponse {
    session.toggle_level_lock(request.locked).await;
    let verb = if request.locked { "lock" } else { "unlock" };
    ActionResponse::new(format!("{verb} requested"))
}

pub async fn eliminate_player(session: &Session, player_id: &str) -> ActionResponse {
    let player_id = normalize_code(player_id);
    session.eliminate_player(&player_id).await;
    ActionResponse::new(format!("elimination of {player_id} requested"))
}

pub async fn revive_player(session: &Session, player_id: &str) -> ActionResponse {
    let player_id = normalize_code(player_id);
    session.revive_player(&player_id).await;
    ActionResponse::new(format!("revival of {player_id} requested"))
}

/// Create `count` unclaimed room codes, retrying on collisions with existing codes.
pub async fn seed_players(
    state: &SharedState,
    request: SetupRequest,
) -> Result<SetupResponse, ServiceError> {
    let store = state.require_store().await?;
    let length = state.config().code_length();
    let wanted = request.count as usize;
    let mut created = Vec::with_capacity(wanted);
    let mut budget = request.count.saturating_mul(MAX_ATTEMPTS_PER_CODE);

    while created.len() < wanted && budget > 0 {
        let batch = generate_codes(wanted - created.len(), length);
        for code in batch {
            budget = budget.saturating_sub(1);
            if store.create_player(code.clone()).await? {
                created.push(code);
            }
        }
    }

    if created.len() < wanted {
        warn!(
            requested = wanted,
            created = created.len(),
            "gave up generating room codes after repeated collisions"
        );
    }
    info!(count = created.len(), "room codes created");
    Ok(SetupResponse { created })
}

fn generate_codes(count: usize, length: usize) -> Vec<String> {
    let mut rng = rng();
    (0..count)
        .map(|_| {
            (0..length)
                .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
                .collect()
        })
        .collect()
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::{AdminCredentials, AppConfig},
        dao::document_store::{DocumentStore, memory::MemoryDocumentStore},
        state::AppState,
    };

    async fn state_with(store: MemoryDocumentStore, code_length: usize) -> SharedState {
        let config = AppConfig::new(
            vec![AdminCredentials {
                email: "host@squid.test".into(),
                password: "456".into(),
            }],
            code_length,
        );
        let state = AppState::new(config);
        state.install_store(Arc::new(store)).await;
        state
    }

    #[test]
    fn generated_codes_use_the_unambiguous_alphabet() {
        let codes = generate_codes(50, 6);
        assert_eq!(codes.len(), 50);
        for code in codes {
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn seeding_creates_unclaimed_codes() {
        let store = MemoryDocumentStore::with_codes(["EXIST1"]);
        let state = state_with(store.clone(), 8).await;

        let response = seed_players(&state, SetupRequest { count: 5 }).await.unwrap();
        assert_eq!(response.created.len(), 5);
        assert!(response.created.iter().all(|code| code.len() == 8));

        let players = store.list_players().await.unwrap();
        assert_eq!(players.len(), 6);
        assert!(
            players
                .iter()
                .filter(|p| p.code != "EXIST1")
                .all(|p| p.status.is_none() && p.name.is_none())
        );
    }

    #[tokio::test]
    async fn admin_login_and_level_flow() {
        let store = MemoryDocumentStore::with_codes(["K7P2QX"]);
        let state = state_with(store.clone(), 6).await;

        let denied = login(
            &state,
            AdminLoginRequest {
                email: "host@squid.test".into(),
                password: "nope".into(),
            },
        )
        .await
        .unwrap();
        assert!(!denied.success);

        let token = login(
            &state,
            AdminLoginRequest {
                email: "host@squid.test".into(),
                password: "456".into(),
            },
        )
        .await
        .unwrap()
        .token
        .unwrap();
        let admin = state.admin_session(&token).unwrap();

        set_level(&admin, SetLevelRequest { level: 6 }).await;
        set_level_lock(&admin, LevelLockRequest { locked: true }).await;
        eliminate_player(&admin, "k7p2qx").await;

        let game = store.find_game_state().await.unwrap().unwrap();
        assert_eq!(game.current_level, 6);
        assert!(game.is_level_locked);

        let listed = list_players(&state).await.unwrap();
        assert_eq!(listed.counts.eliminated, 1);
        assert_eq!(listed.players[0].player.id, "K7P2QX");

        revive_player(&admin, "K7P2QX").await;
        assert_eq!(list_players(&state).await.unwrap().counts.alive, 1);
    }

    #[test]
    fn catalog_listing_includes_answers() {
        let levels = list_levels();
        assert_eq!(levels[2].answer, "familia primero");
    }
}
