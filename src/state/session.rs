//! Per-client session: reactive projections of the store plus the actions a
//! player or admin can trigger.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    auth::AdminAuthenticator,
    dao::{
        document_store::DocumentStore,
        models::{GameStatePatch, PlayerStatus, PlayerUpdate},
        storage::StorageResult,
    },
    state::{
        game::{GameState, Player},
        levels::{self, Level},
        subscription::Subscription,
    },
};

const GAME_STATE_KEY: &str = "game_state/global";
const PLAYERS_KEY: &str = "players";

fn player_key(code: &str) -> String {
    format!("players/{code}")
}

/// Client activity used to expire abandoned sessions.
#[derive(Debug)]
struct Activity {
    started: Instant,
    /// Milliseconds after `started` of the last request.
    last_seen_ms: AtomicU64,
    open_streams: AtomicUsize,
}

impl Activity {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            last_seen_ms: AtomicU64::new(0),
            open_streams: AtomicUsize::new(0),
        }
    }

    fn touch(&self) {
        let now = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_seen_ms.fetch_max(now, Ordering::Relaxed);
    }

    fn idle_for(&self) -> Option<Duration> {
        if self.open_streams.load(Ordering::Acquire) > 0 {
            return None;
        }
        let last_seen = Duration::from_millis(self.last_seen_ms.load(Ordering::Relaxed));
        Some(self.started.elapsed().saturating_sub(last_seen))
    }
}

/// Marks an event stream as open on its session until dropped.
#[derive(Debug)]
pub struct StreamGuard {
    activity: Arc<Activity>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.activity.touch();
        self.activity.open_streams.fetch_sub(1, Ordering::AcqRel);
    }
}

/// State of one connected client.
///
/// Projections are `watch` channels fed by standing store subscriptions. Each
/// subscription slot holds at most one live subscription per watched document,
/// and all of them are cancelled by [`Session::close`] or when the session is dropped.
pub struct Session {
    id: Uuid,
    store: Arc<dyn DocumentStore>,
    authenticator: Arc<dyn AdminAuthenticator>,
    player: Arc<watch::Sender<Option<Player>>>,
    players: Arc<watch::Sender<Vec<Player>>>,
    is_admin: watch::Sender<bool>,
    game_state: Arc<watch::Sender<GameState>>,
    player_subscription: Mutex<Option<Subscription>>,
    players_subscription: Mutex<Option<Subscription>>,
    game_subscription: Mutex<Option<Subscription>>,
    activity: Arc<Activity>,
}

impl Session {
    pub fn new(store: Arc<dyn DocumentStore>, authenticator: Arc<dyn AdminAuthenticator>) -> Self {
        Self {
            id: Uuid::new_v4(),
            store,
            authenticator,
            player: Arc::new(watch::channel(None).0),
            players: Arc::new(watch::channel(Vec::new()).0),
            is_admin: watch::channel(false).0,
            game_state: Arc::new(watch::channel(GameState::default()).0),
            player_subscription: Mutex::new(None),
            players_subscription: Mutex::new(None),
            game_subscription: Mutex::new(None),
            activity: Arc::new(Activity::new()),
        }
    }

    /// Opaque token identifying the session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Record client activity.
    pub fn touch(&self) {
        self.activity.touch();
    }

    /// Time since the last request, `None` while an event stream is open.
    pub fn idle_for(&self) -> Option<Duration> {
        self.activity.idle_for()
    }

    /// Keep the session alive for as long as the returned guard lives.
    pub fn open_stream(&self) -> StreamGuard {
        self.activity.open_streams.fetch_add(1, Ordering::AcqRel);
        self.activity.touch();
        StreamGuard {
            activity: Arc::clone(&self.activity),
        }
    }

    /// Claim a seeded room code.
    ///
    /// Returns `false` without writing when the code does not exist. Store
    /// failures are logged and also reported as `false`.
    pub async fn login(&self, name: &str, code: &str) -> bool {
        let code = code.trim().to_uppercase();
        match self.claim(name.trim(), &code).await {
            Ok(claimed) => claimed,
            Err(err) => {
                warn!(session = %self.id, code = %code, error = %err, "player login failed");
                false
            }
        }
    }

    async fn claim(&self, name: &str, code: &str) -> StorageResult<bool> {
        let Some(existing) = self.store.find_player(code.to_string()).await? else {
            info!(session = %self.id, code = %code, "login with unknown room code");
            return Ok(false);
        };

        self.store
            .update_player(
                code.to_string(),
                PlayerUpdate::Claim {
                    name: name.to_string(),
                },
            )
            .await?;
        self.player
            .send_replace(Some(Player::claimed(existing, name.to_string())));
        info!(session = %self.id, code = %code, player_name = %name, "player joined");

        self.ensure_player_subscription(code).await;
        self.ensure_game_subscription().await;
        Ok(true)
    }

    /// Sign in as admin through the configured authenticator.
    pub async fn admin_login(&self, email: &str, password: &str) -> bool {
        match self
            .authenticator
            .sign_in(email.to_string(), password.to_string())
            .await
        {
            Ok(()) => {
                self.is_admin.send_replace(true);
                info!(session = %self.id, email = %email, "admin signed in");
                self.ensure_game_subscription().await;
                self.ensure_players_subscription().await;
                true
            }
            Err(err) => {
                warn!(session = %self.id, email = %email, error = %err, "admin login failed");
                false
            }
        }
    }

    /// Record the logged-in player's answer for `level`.
    ///
    /// Does nothing when no player is logged in. Store errors are returned.
    pub async fn submit_answer(&self, level: u32, answer: &str) -> StorageResult<()> {
        let Some(code) = self.player_code() else {
            debug!(session = %self.id, level, "answer ignored: no player logged in");
            return Ok(());
        };

        self.store
            .update_player(
                code.clone(),
                PlayerUpdate::Answer {
                    level,
                    value: answer.to_string(),
                },
            )
            .await
            .inspect_err(|err| {
                warn!(session = %self.id, code = %code, level, error = %err, "answer not saved");
            })
    }

    /// Move the game to `level`, reopening and unlocking submissions.
    pub async fn set_level(&self, level: u32) {
        match self
            .store
            .merge_game_state(GameStatePatch::enter_level(level))
            .await
        {
            Ok(()) => info!(session = %self.id, level, "level changed"),
            Err(err) => warn!(session = %self.id, level, error = %err, "failed to set level"),
        }
    }

    /// Lock or unlock submissions for the current level.
    pub async fn toggle_level_lock(&self, locked: bool) {
        match self
            .store
            .update_game_state(GameStatePatch::lock(locked))
            .await
        {
            Ok(()) => info!(session = %self.id, locked, "level lock changed"),
            Err(err) => warn!(session = %self.id, locked, error = %err, "failed to toggle level lock"),
        }
    }

    pub async fn eliminate_player(&self, player_id: &str) {
        self.set_player_status(player_id, PlayerStatus::Eliminated)
            .await;
    }

    pub async fn revive_player(&self, player_id: &str) {
        self.set_player_status(player_id, PlayerStatus::Alive).await;
    }

    async fn set_player_status(&self, player_id: &str, status: PlayerStatus) {
        match self
            .store
            .update_player(player_id.to_string(), PlayerUpdate::Status(status))
            .await
        {
            Ok(()) => info!(session = %self.id, player = %player_id, ?status, "player status changed"),
            Err(err) => warn!(
                session = %self.id,
                player = %player_id,
                ?status,
                error = %err,
                "failed to change player status"
            ),
        }
    }

    /// Cancel every standing subscription. Projections keep their last value.
    pub async fn close(&self) {
        let subscriptions = [
            self.player_subscription.lock().await.take(),
            self.players_subscription.lock().await.take(),
            self.game_subscription.lock().await.take(),
        ];
        let cancelled = subscriptions.into_iter().flatten().count();
        debug!(session = %self.id, cancelled, "session closed");
    }

    /// Player projection, `None` until a login succeeds.
    pub fn player(&self) -> Option<Player> {
        self.player.borrow().clone()
    }

    /// Every player; only populated for admin sessions.
    pub fn players(&self) -> Vec<Player> {
        self.players.borrow().clone()
    }

    pub fn is_admin(&self) -> bool {
        *self.is_admin.borrow()
    }

    pub fn game_state(&self) -> GameState {
        *self.game_state.borrow()
    }

    /// Catalog entry for the current level, or the placeholder.
    pub fn current_level_data(&self) -> &'static Level {
        levels::level_or_placeholder(self.game_state().current_level)
    }

    pub fn watch_player(&self) -> watch::Receiver<Option<Player>> {
        self.player.subscribe()
    }

    pub fn watch_players(&self) -> watch::Receiver<Vec<Player>> {
        self.players.subscribe()
    }

    pub fn watch_admin(&self) -> watch::Receiver<bool> {
        self.is_admin.subscribe()
    }

    pub fn watch_game_state(&self) -> watch::Receiver<GameState> {
        self.game_state.subscribe()
    }

    /// Keys of the subscriptions currently running.
    pub async fn active_subscriptions(&self) -> Vec<String> {
        let slots = [
            &self.player_subscription,
            &self.players_subscription,
            &self.game_subscription,
        ];
        let mut keys = Vec::new();
        for slot in slots {
            if let Some(subscription) = slot.lock().await.as_ref().filter(|s| s.is_active()) {
                keys.push(subscription.key().to_string());
            }
        }
        keys
    }

    fn player_code(&self) -> Option<String> {
        self.player.borrow().as_ref().map(|player| player.id.clone())
    }

    async fn ensure_player_subscription(&self, code: &str) {
        let key = player_key(code);
        let mut slot = self.player_subscription.lock().await;
        if slot.as_ref().is_some_and(|existing| existing.covers(&key)) {
            return;
        }

        let sender = Arc::clone(&self.player);
        let changes = self.store.watch_player(code.to_string());
        *slot = Some(Subscription::spawn(key, changes, move |entity| {
            sender.send_replace(entity.map(Player::from));
        }));
        debug!(session = %self.id, code = %code, "player subscription started");
    }

    async fn ensure_players_subscription(&self) {
        let mut slot = self.players_subscription.lock().await;
        if slot.as_ref().is_some_and(|existing| existing.covers(PLAYERS_KEY)) {
            return;
        }

        let sender = Arc::clone(&self.players);
        let changes = self.store.watch_players();
        *slot = Some(Subscription::spawn(PLAYERS_KEY, changes, move |entities| {
            sender.send_replace(entities.into_iter().map(Player::from).collect());
        }));
        debug!(session = %self.id, "players subscription started");
    }

    async fn ensure_game_subscription(&self) {
        let mut slot = self.game_subscription.lock().await;
        if slot.as_ref().is_some_and(|existing| existing.covers(GAME_STATE_KEY)) {
            return;
        }

        let sender = Arc::clone(&self.game_state);
        let changes = self.store.watch_game_state();
        *slot = Some(Subscription::spawn(GAME_STATE_KEY, changes, move |entity| {
            // A missing document leaves the defaults in place.
            if let Some(entity) = entity {
                let next = GameState::from(entity);
                sender.send_if_modified(|current| {
                    if *current == next {
                        return false;
                    }
                    *current = next;
                    true
                });
            }
        }));
        debug!(session = %self.id, "game state subscription started");
    }
}
