use axum::{
    Router,
    body::Body,
    http::{Request, Uri},
};
use tracing::{Span, debug_span};

use crate::state::SharedState;

pub mod admin;
pub mod docs;
pub mod game;
pub mod health;
pub mod player;
pub mod session;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(player::router(state.clone()))
        .merge(game::router(state.clone()))
        .merge(admin::router(state.clone()))
        .merge(session::router())
        .merge(sse::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}

/// Request span for the HTTP trace layer.
///
/// SSE session tokens travel in the query string, so only the path is recorded.
pub fn request_span(request: &Request<Body>) -> Span {
    debug_span!(
        "request",
        method = %request.method(),
        uri = %loggable_uri(request.uri()),
        version = ?request.version(),
    )
}

fn loggable_uri(uri: &Uri) -> String {
    match uri.query() {
        Some(_) => format!("{}?<redacted>", uri.path()),
        None => uri.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_strings_are_not_logged() {
        let uri: Uri = "/sse/player?token=6f1c2a9e-3b7d-4c1e-9a51-2d8f0e4b7c30"
            .parse()
            .unwrap();
        let logged = loggable_uri(&uri);
        assert_eq!(logged, "/sse/player?<redacted>");
        assert!(!logged.contains("6f1c2a9e"));

        let plain: Uri = "/game/state".parse().unwrap();
        assert_eq!(loggable_uri(&plain), "/game/state");
    }
}
