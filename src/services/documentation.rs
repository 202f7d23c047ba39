use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the trivia backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::player::login,
        crate::routes::player::me,
        crate::routes::player::submit_answer,
        crate::routes::game::game_state,
        crate::routes::admin::login,
        crate::routes::admin::list_players,
        crate::routes::admin::list_levels,
        crate::routes::admin::set_level,
        crate::routes::admin::set_level_lock,
        crate::routes::admin::eliminate_player,
        crate::routes::admin::revive_player,
        crate::routes::admin::setup,
        crate::routes::session::logout,
        crate::routes::sse::player_stream,
        crate::routes::sse::admin_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::player::LoginRequest,
            crate::dto::player::LoginResponse,
            crate::dto::player::AnswerRequest,
            crate::dto::player::AnswerView,
            crate::dto::player::PlayerView,
            crate::dto::game::GameStateView,
            crate::dto::game::LevelView,
            crate::dto::game::LevelDefinition,
            crate::dto::admin::AdminLoginRequest,
            crate::dto::admin::SetLevelRequest,
            crate::dto::admin::LevelLockRequest,
            crate::dto::admin::SetupRequest,
            crate::dto::admin::SetupResponse,
            crate::dto::admin::ActionResponse,
            crate::dto::admin::AdminPlayerView,
            crate::dto::admin::PlayerCounts,
            crate::dto::admin::PlayersResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dao::models::PlayerStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "player", description = "Player login and answers"),
        (name = "game", description = "Shared game state"),
        (name = "admin", description = "Game host controls"),
        (name = "session", description = "Session lifecycle"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/player/login",
            "/player/answer",
            "/game/state",
            "/admin/level/lock",
            "/admin/players/{id}/eliminate",
            "/session",
            "/sse/admin",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
