//! In-process [`DocumentStore`] keeping every document behind a `watch` channel
//! so subscribers observe each committed write.

use std::{sync::Arc, time::SystemTime};

use async_stream::stream;
use futures::future::{self, BoxFuture};
use indexmap::IndexMap;
use tokio::sync::watch;

use super::{ChangeStream, DocumentStore};
use crate::dao::{
    models::{
        GAME_STATE_COLLECTION, GAME_STATE_DOC_ID, GameStateEntity, GameStatePatch,
        PLAYERS_COLLECTION, PlayerEntity, PlayerUpdate,
    },
    storage::{StorageError, StorageResult},
};

#[derive(Debug, Clone, Default, PartialEq)]
struct Documents {
    players: IndexMap<String, PlayerEntity>,
    game_state: Option<GameStateEntity>,
}

/// Volatile store used when no database is configured and by the test suite.
#[derive(Clone)]
pub struct MemoryDocumentStore {
    documents: Arc<watch::Sender<Documents>>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(Documents::default());
        Self {
            documents: Arc::new(sender),
        }
    }

    /// Build a store pre-seeded with unclaimed room codes.
    pub fn with_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        store.documents.send_modify(|docs| {
            for code in codes {
                let code = code.into();
                docs.players
                    .insert(code.clone(), PlayerEntity::unclaimed(code));
            }
        });
        store
    }

    fn read<T>(&self, f: impl FnOnce(&Documents) -> T) -> T {
        f(&self.documents.borrow())
    }

    /// Stream the projection `f` of the documents, skipping unchanged values.
    fn project<T, F>(&self, f: F) -> ChangeStream<T>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        F: Fn(&Documents) -> T + Send + 'static,
    {
        let mut receiver = self.documents.subscribe();
        Box::pin(stream! {
            let mut last: Option<T> = None;
            loop {
                let current = f(&receiver.borrow_and_update());
                if last.as_ref() != Some(&current) {
                    last = Some(current.clone());
                    let item: StorageResult<T> = Ok(current);
                    yield item;
                }
                if receiver.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn find_player_now(&self, code: &str) -> Option<PlayerEntity> {
        self.read(|docs| docs.players.get(code).cloned())
    }

    fn create_player_now(&self, code: String) -> bool {
        self.documents.send_if_modified(|docs| {
            if docs.players.contains_key(&code) {
                return false;
            }
            docs.players
                .insert(code.clone(), PlayerEntity::unclaimed(code));
            true
        })
    }

    fn update_player_now(&self, code: String, update: PlayerUpdate) -> StorageResult<()> {
        let now = SystemTime::now();
        let updated = self
            .documents
            .send_if_modified(|docs| match docs.players.get_mut(&code) {
                Some(player) => {
                    player.apply(update, now);
                    true
                }
                None => false,
            });

        if updated {
            Ok(())
        } else {
            Err(StorageError::not_found(PLAYERS_COLLECTION, code))
        }
    }

    fn patch_game_state_now(&self, patch: GameStatePatch, upsert: bool) -> StorageResult<()> {
        let applied = self.documents.send_if_modified(|docs| {
            if docs.game_state.is_none() {
                if !upsert {
                    return false;
                }
                docs.game_state = Some(GameStateEntity::default());
            }
            if let Some(state) = docs.game_state.as_mut() {
                patch.apply(state);
            }
            true
        });

        if applied {
            Ok(())
        } else {
            Err(StorageError::not_found(
                GAME_STATE_COLLECTION,
                GAME_STATE_DOC_ID,
            ))
        }
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn find_player(&self, code: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        Box::pin(future::ready(Ok(self.find_player_now(&code))))
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let players = self.read(|docs| docs.players.values().cloned().collect());
        Box::pin(future::ready(Ok(players)))
    }

    fn create_player(&self, code: String) -> BoxFuture<'static, StorageResult<bool>> {
        Box::pin(future::ready(Ok(self.create_player_now(code))))
    }

    fn update_player(
        &self,
        code: String,
        update: PlayerUpdate,
    ) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(self.update_player_now(code, update)))
    }

    fn find_game_state(&self) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>> {
        Box::pin(future::ready(Ok(self.read(|docs| docs.game_state))))
    }

    fn merge_game_state(&self, patch: GameStatePatch) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(self.patch_game_state_now(patch, true)))
    }

    fn update_game_state(&self, patch: GameStatePatch) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(self.patch_game_state_now(patch, false)))
    }

    fn watch_player(&self, code: String) -> ChangeStream<Option<PlayerEntity>> {
        self.project(move |docs| docs.players.get(&code).cloned())
    }

    fn watch_players(&self) -> ChangeStream<Vec<PlayerEntity>> {
        self.project(|docs| docs.players.values().cloned().collect())
    }

    fn watch_game_state(&self) -> ChangeStream<Option<GameStateEntity>> {
        self.project(|docs| docs.game_state)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(Ok(())))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(Ok(())))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::dao::models::PlayerStatus;

    #[tokio::test]
    async fn update_of_unknown_player_is_not_found() {
        let store = MemoryDocumentStore::new();
        let err = store
            .update_player("NOPE".into(), PlayerUpdate::Status(PlayerStatus::Alive))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn create_player_refuses_existing_code() {
        let store = MemoryDocumentStore::with_codes(["AAA111"]);
        assert!(!store.create_player("AAA111".into()).await.unwrap());
        assert!(store.create_player("BBB222".into()).await.unwrap());
        assert_eq!(store.list_players().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn merge_creates_game_state_but_update_does_not() {
        let store = MemoryDocumentStore::new();
        assert!(
            store
                .update_game_state(GameStatePatch::lock(true))
                .await
                .is_err()
        );

        store
            .merge_game_state(GameStatePatch::enter_level(3))
            .await
            .unwrap();
        let state = store.find_game_state().await.unwrap().unwrap();
        assert_eq!(state.current_level, 3);
        assert!(state.is_level_active);
        assert!(!state.is_level_locked);
    }

    #[tokio::test]
    async fn watch_yields_current_value_then_changes() {
        let store = MemoryDocumentStore::with_codes(["CODE01"]);
        let mut changes = store.watch_player("CODE01".into());

        let initial = changes.next().await.unwrap().unwrap().unwrap();
        assert_eq!(initial.status, None);

        store
            .update_player(
                "CODE01".into(),
                PlayerUpdate::Claim {
                    name: "Sae-byeok".into(),
                },
            )
            .await
            .unwrap();

        let claimed = changes.next().await.unwrap().unwrap().unwrap();
        assert_eq!(claimed.status, Some(PlayerStatus::Alive));
    }

    #[tokio::test]
    async fn watch_skips_unrelated_writes() {
        let store = MemoryDocumentStore::with_codes(["CODE01", "CODE02"]);
        let mut changes = store.watch_player("CODE01".into());
        changes.next().await.unwrap().unwrap();

        store
            .update_player("CODE02".into(), PlayerUpdate::Status(PlayerStatus::Alive))
            .await
            .unwrap();
        store
            .update_player(
                "CODE01".into(),
                PlayerUpdate::Status(PlayerStatus::Eliminated),
            )
            .await
            .unwrap();

        let next = changes.next().await.unwrap().unwrap().unwrap();
        assert_eq!(next.status, Some(PlayerStatus::Eliminated));
    }
}
