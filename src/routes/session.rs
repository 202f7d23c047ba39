use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
    routing::delete,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    services::player_service,
    state::{Session, SharedState},
};

pub const SESSION_TOKEN_HEADER: &str = "x-session-token";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Session teardown shared by players and admins.
pub fn router() -> Router<SharedState> {
    Router::new().route("/session", delete(logout))
}

/// Close the session identified by either token header.
#[utoipa::path(
    delete,
    path = "/session",
    tag = "session",
    params(
        ("X-Session-Token" = Option<String>, Header, description = "Player session token"),
        ("X-Admin-Token" = Option<String>, Header, description = "Admin session token"),
    ),
    responses(
        (status = 204, description = "Session closed"),
        (status = 404, description = "Unknown session"),
    )
)]
pub async fn logout(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let token = match header_token(&headers, SESSION_TOKEN_HEADER)? {
        Some(token) => token,
        None => header_token(&headers, ADMIN_TOKEN_HEADER)?.ok_or_else(|| {
            AppError::Unauthorized("missing session token header `X-Session-Token`".into())
        })?,
    };
    player_service::logout(&state, token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Parse a UUID token from `name`, `None` when the header is absent.
pub fn header_token(headers: &HeaderMap, name: &str) -> Result<Option<Uuid>, AppError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .map(Some)
        .ok_or_else(|| AppError::Unauthorized(format!("malformed `{name}` header")))
}

/// Resolve `X-Session-Token` and expose the session to handlers as an extension.
pub async fn require_session(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = header_token(req.headers(), SESSION_TOKEN_HEADER)?.ok_or_else(|| {
        AppError::Unauthorized("missing session token header `X-Session-Token`".into())
    })?;
    let session: Arc<Session> = player_service::resolve_session(&state, token)?;
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Resolve `X-Admin-Token` to a signed-in admin session.
pub async fn require_admin_session(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = header_token(req.headers(), ADMIN_TOKEN_HEADER)?.ok_or_else(|| {
        AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
    })?;
    let session = state
        .admin_session(&token)
        .ok_or_else(|| AppError::Unauthorized("invalid admin token".into()))?;
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}
