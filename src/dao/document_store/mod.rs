#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(test)]
pub mod testing;

use futures::{future::BoxFuture, stream::BoxStream};

use crate::dao::{
    models::{GameStateEntity, GameStatePatch, PlayerEntity, PlayerUpdate},
    storage::StorageResult,
};

/// Stream of document snapshots. The first item is the state at subscription
/// time; every later item reflects a committed change, in commit order.
pub type ChangeStream<T> = BoxStream<'static, StorageResult<T>>;

/// Abstraction over the realtime document store holding players and the game state.
pub trait DocumentStore: Send + Sync {
    /// Fetch a player document by room code.
    fn find_player(&self, code: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Fetch every player document.
    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    /// Create an unclaimed player document; `false` when the code is taken.
    fn create_player(&self, code: String) -> BoxFuture<'static, StorageResult<bool>>;
    /// Update an existing player, failing with `NotFound` when it does not exist.
    fn update_player(
        &self,
        code: String,
        update: PlayerUpdate,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch the singleton game state document.
    fn find_game_state(&self) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>>;
    /// Merge the patch into the game state, creating the document from defaults if missing.
    fn merge_game_state(&self, patch: GameStatePatch) -> BoxFuture<'static, StorageResult<()>>;
    /// Update the game state, failing with `NotFound` when it does not exist yet.
    fn update_game_state(&self, patch: GameStatePatch) -> BoxFuture<'static, StorageResult<()>>;
    /// Watch one player document.
    fn watch_player(&self, code: String) -> ChangeStream<Option<PlayerEntity>>;
    /// Watch the whole player collection.
    fn watch_players(&self) -> ChangeStream<Vec<PlayerEntity>>;
    /// Watch the game state document.
    fn watch_game_state(&self) -> ChangeStream<Option<GameStateEntity>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
