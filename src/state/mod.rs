pub mod game;
pub mod levels;
pub mod session;
mod subscription;

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    auth::{AdminAuthenticator, ConfigAuthenticator},
    config::AppConfig,
    dao::document_store::DocumentStore,
    error::ServiceError,
};

pub use self::session::Session;

pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, live sessions and configuration.
pub struct AppState {
    store: RwLock<Option<Arc<dyn DocumentStore>>>,
    degraded: watch::Sender<bool>,
    sessions: DashMap<Uuid, Arc<Session>>,
    authenticator: Arc<dyn AdminAuthenticator>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let authenticator = Arc::new(ConfigAuthenticator::new(&config));
        Self::with_authenticator(config, authenticator)
    }

    /// Same as [`AppState::new`] with a custom admin authenticator.
    pub fn with_authenticator(
        config: AppConfig,
        authenticator: Arc<dyn AdminAuthenticator>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            degraded: degraded_tx,
            sessions: DashMap::new(),
            authenticator,
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn DocumentStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store or [`ServiceError::Degraded`].
    pub async fn require_store(&self) -> Result<Arc<dyn DocumentStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn DocumentStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Create a session bound to the current store. It is not registered yet.
    pub async fn open_session(&self) -> Result<Arc<Session>, ServiceError> {
        let store = self.require_store().await?;
        Ok(Arc::new(Session::new(store, Arc::clone(&self.authenticator))))
    }

    /// Make `session` reachable through its token.
    ///
    /// A room code is held by one session at a time: earlier sessions of the
    /// same player are closed.
    pub async fn register_session(&self, session: Arc<Session>) -> Uuid {
        let token = session.id();
        if let Some(code) = session.player().map(|player| player.id) {
            let replaced: Vec<Uuid> = self
                .sessions
                .iter()
                .filter(|entry| {
                    entry
                        .value()
                        .player()
                        .is_some_and(|player| player.id == code)
                })
                .map(|entry| *entry.key())
                .collect();
            for old in replaced {
                if self.remove_session(&old).await {
                    info!(session = %old, code = %code, "previous session replaced by a new login");
                }
            }
        }

        self.sessions.insert(token, session);
        debug!(session = %token, total = self.sessions.len(), "session registered");
        token
    }

    /// Session bound to `token`, if any. Resolving a session counts as activity.
    pub fn session(&self, token: &Uuid) -> Option<Arc<Session>> {
        let session = self
            .sessions
            .get(token)
            .map(|entry| Arc::clone(entry.value()))?;
        session.touch();
        Some(session)
    }

    /// Session bound to `token` that has signed in as admin.
    pub fn admin_session(&self, token: &Uuid) -> Option<Arc<Session>> {
        self.session(token).filter(|session| session.is_admin())
    }

    /// Unregister and close the session bound to `token`.
    pub async fn remove_session(&self, token: &Uuid) -> bool {
        let Some((_, session)) = self.sessions.remove(token) else {
            return false;
        };
        session.close().await;
        debug!(session = %token, total = self.sessions.len(), "session removed");
        true
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Close sessions without an open event stream that have been idle for at
    /// least `max_idle`. Returns how many were removed.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let expired: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .idle_for()
                    .is_some_and(|idle| idle >= max_idle)
            })
            .map(|entry| *entry.key())
            .collect();

        let mut removed = 0;
        for token in expired {
            if self.remove_session(&token).await {
                removed += 1;
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::document_store::memory::MemoryDocumentStore;

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        let mut degraded = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(matches!(
            state.open_session().await,
            Err(ServiceError::Degraded)
        ));

        state
            .install_store(Arc::new(MemoryDocumentStore::new()))
            .await;
        assert!(!state.is_degraded());
        assert!(degraded.has_changed().unwrap());
        assert!(!*degraded.borrow_and_update());

        state.clear_store().await;
        assert!(state.is_degraded());
    }

    #[tokio::test]
    async fn registry_resolves_and_removes_sessions() {
        let state = AppState::new(AppConfig::default());
        state
            .install_store(Arc::new(MemoryDocumentStore::new()))
            .await;

        let session = state.open_session().await.unwrap();
        let token = state.register_session(session).await;
        assert!(state.session(&token).is_some());
        assert!(state.admin_session(&token).is_none());

        assert!(state.remove_session(&token).await);
        assert!(state.session(&token).is_none());
        assert!(!state.remove_session(&token).await);
        assert_eq!(state.session_count(), 0);
    }

    #[tokio::test]
    async fn new_login_replaces_the_previous_session_for_a_code() {
        let state = AppState::new(AppConfig::default());
        state
            .install_store(Arc::new(MemoryDocumentStore::with_codes(["K7P2QX", "AAA111"])))
            .await;

        let mut tokens = Vec::new();
        for _ in 0..50 {
            let session = state.open_session().await.unwrap();
            assert!(session.login("Gi-hun", "K7P2QX").await);
            tokens.push(state.register_session(session).await);
        }
        let other = state.open_session().await.unwrap();
        assert!(other.login("Ali", "AAA111").await);
        let other = state.register_session(other).await;

        assert_eq!(state.session_count(), 2);
        assert!(state.session(&tokens[0]).is_none());
        assert!(state.session(&tokens[49]).is_some());
        assert!(state.session(&other).is_some());
    }

    #[tokio::test]
    async fn sweep_spares_sessions_with_open_streams() {
        let state = AppState::new(AppConfig::default());
        state
            .install_store(Arc::new(MemoryDocumentStore::new()))
            .await;

        let watched = state.open_session().await.unwrap();
        let stream = watched.open_stream();
        let watched = state.register_session(watched).await;
        let idle = state.open_session().await.unwrap();
        let idle = state.register_session(idle).await;

        assert_eq!(state.sweep_idle(Duration::from_secs(3600)).await, 0);
        assert_eq!(state.sweep_idle(Duration::ZERO).await, 1);
        assert!(state.session(&idle).is_none());
        assert!(state.session(&watched).is_some());

        drop(stream);
        assert_eq!(state.sweep_idle(Duration::ZERO).await, 1);
        assert_eq!(state.session_count(), 0);
    }
}
