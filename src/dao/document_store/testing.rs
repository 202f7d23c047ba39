//! Store wrapper for tests: counts writes and can be switched to fail them.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use futures::future::{self, BoxFuture};

use super::{ChangeStream, DocumentStore, memory::MemoryDocumentStore};
use crate::dao::{
    models::{GameStateEntity, GameStatePatch, PlayerEntity, PlayerUpdate},
    storage::{StorageError, StorageResult},
};

#[derive(Clone, Default)]
pub struct RecordingStore {
    inner: MemoryDocumentStore,
    writes: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl RecordingStore {
    pub fn with_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: MemoryDocumentStore::with_codes(codes),
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &MemoryDocumentStore {
        &self.inner
    }

    /// Number of write attempts, failed ones included.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn write<T: Send + 'static>(
        &self,
        run: impl FnOnce(&MemoryDocumentStore) -> BoxFuture<'static, StorageResult<T>>,
    ) -> BoxFuture<'static, StorageResult<T>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            let source = io::Error::new(io::ErrorKind::ConnectionRefused, "offline");
            return Box::pin(future::ready(Err(StorageError::unavailable(
                "simulated outage".into(),
                source,
            ))));
        }
        run(&self.inner)
    }
}

impl DocumentStore for RecordingStore {
    fn find_player(&self, code: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        self.inner.find_player(code)
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        self.inner.list_players()
    }

    fn create_player(&self, code: String) -> BoxFuture<'static, StorageResult<bool>> {
        self.write(|inner| inner.create_player(code))
    }

    fn update_player(
        &self,
        code: String,
        update: PlayerUpdate,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.write(|inner| inner.update_player(code, update))
    }

    fn find_game_state(&self) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>> {
        self.inner.find_game_state()
    }

    fn merge_game_state(&self, patch: GameStatePatch) -> BoxFuture<'static, StorageResult<()>> {
        self.write(|inner| inner.merge_game_state(patch))
    }

    fn update_game_state(&self, patch: GameStatePatch) -> BoxFuture<'static, StorageResult<()>> {
        self.write(|inner| inner.update_game_state(patch))
    }

    fn watch_player(&self, code: String) -> ChangeStream<Option<PlayerEntity>> {
        self.inner.watch_player(code)
    }

    fn watch_players(&self) -> ChangeStream<Vec<PlayerEntity>> {
        self.inner.watch_players()
    }

    fn watch_game_state(&self) -> ChangeStream<Option<GameStateEntity>> {
        self.inner.watch_game_state()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}
