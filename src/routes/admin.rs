use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        admin::{
            ActionResponse, AdminLoginRequest, LevelLockRequest, PlayersResponse,
            SetLevelRequest, SetupRequest, SetupResponse,
        },
        game::LevelDefinition,
        player::LoginResponse,
    },
    error::AppError,
    routes::session::require_admin_session,
    services::admin_service,
    state::{Session, SharedState},
};

/// Admin sign-in plus the admin-only management endpoints.
pub fn router(state: SharedState) -> Router<SharedState> {
    let protected = Router::new()
        .route("/admin/players", get(list_players))
        .route("/admin/levels", get(list_levels))
        .route("/admin/level", post(set_level))
        .route("/admin/level/lock", post(set_level_lock))
        .route("/admin/players/{id}/eliminate", post(eliminate_player))
        .route("/admin/players/{id}/revive", post(revive_player))
        .route("/admin/setup", post(setup))
        .route_layer(middleware::from_fn_with_state(state, require_admin_session));

    Router::new()
        .route("/admin/login", post(login))
        .merge(protected)
}

/// Check admin credentials and open an admin session.
#[utoipa::path(
    post,
    path = "/admin/login",
    tag = "admin",
    request_body = AdminLoginRequest,
    responses((status = 200, description = "Login outcome; `token` is set on success", body = LoginResponse))
)]
pub async fn login(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<AdminLoginRequest>>,
) -> Result<Json<LoginResponse>, AppError> {
    Ok(Json(admin_service::login(&state, payload).await?))
}

/// Every player with its answer to the current level.
#[utoipa::path(
    get,
    path = "/admin/players",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Token returned by /admin/login")),
    responses((status = 200, description = "Players and totals", body = PlayersResponse))
)]
pub async fn list_players(
    State(state): State<SharedState>,
) -> Result<Json<PlayersResponse>, AppError> {
    Ok(Json(admin_service::list_players(&state).await?))
}

/// Level catalog including the expected answers.
#[utoipa::path(
    get,
    path = "/admin/levels",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Token returned by /admin/login")),
    responses((status = 200, description = "Level catalog", body = [LevelDefinition]))
)]
pub async fn list_levels() -> Json<Vec<LevelDefinition>> {
    Json(admin_service::list_levels())
}

/// Move the game to a level, reopening and unlocking it.
#[utoipa::path(
    post,
    path = "/admin/level",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Token returned by /admin/login")),
    request_body = SetLevelRequest,
    responses((status = 200, description = "Level change requested", body = ActionResponse))
)]
pub async fn set_level(
    Extension(session): Extension<Arc<Session>>,
    Valid(Json(payload)): Valid<Json<SetLevelRequest>>,
) -> Json<ActionResponse> {
    Json(admin_service::set_level(&session, payload).await)
}

/// Lock or unlock submissions.
#[utoipa::path(
    post,
    path = "/admin/level/lock",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Token returned by /admin/login")),
    request_body = LevelLockRequest,
    responses((status = 200, description = "Lock change requested", body = ActionResponse))
)]
pub async fn set_level_lock(
    Extension(session): Extension<Arc<Session>>,
    Json(payload): Json<LevelLockRequest>,
) -> Json<ActionResponse> {
    Json(admin_service::set_level_lock(&session, payload).await)
}

/// Mark a player as eliminated.
#[utoipa::path(
    post,
    path = "/admin/players/{id}/eliminate",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Token returned by /admin/login"),
        ("id" = String, Path, description = "Room code of the player"),
    ),
    responses((status = 200, description = "Elimination requested", body = ActionResponse))
)]
pub async fn eliminate_player(
    Extension(session): Extension<Arc<Session>>,
    Path(id): Path<String>,
) -> Json<ActionResponse> {
    Json(admin_service::eliminate_player(&session, &id).await)
}

/// Bring an eliminated player back.
#[utoipa::path(
    post,
    path = "/admin/players/{id}/revive",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Token returned by /admin/login"),
        ("id" = String, Path, description = "Room code of the player"),
    ),
    responses((status = 200, description = "Revival requested", body = ActionResponse))
)]
pub async fn revive_player(
    Extension(session): Extension<Arc<Session>>,
    Path(id): Path<String>,
) -> Json<ActionResponse> {
    Json(admin_service::revive_player(&session, &id).await)
}

/// Create unclaimed room codes.
#[utoipa::path(
    post,
    path = "/admin/setup",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Token returned by /admin/login")),
    request_body = SetupRequest,
    responses(
        (status = 200, description = "Codes created", body = SetupResponse),
        (status = 503, description = "Storage unavailable"),
    )
)]
pub async fn setup(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SetupRequest>>,
) -> Result<Json<SetupResponse>, AppError> {
    Ok(Json(admin_service::seed_players(&state, payload).await?))
}
