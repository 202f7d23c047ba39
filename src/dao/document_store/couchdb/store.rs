use std::{future::Future, sync::Arc, time::Duration, time::SystemTime};

use async_stream::stream;
use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use tokio::time::sleep;
use tracing::debug;

use crate::dao::{
    document_store::{ChangeStream, DocumentStore},
    models::{
        GAME_STATE_COLLECTION, GAME_STATE_DOC_ID, GameStateEntity, GameStatePatch,
        PLAYERS_COLLECTION, PlayerEntity, PlayerUpdate,
    },
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, ChangesResponse, CouchGameStateDocument, CouchPlayerDocument,
        DatabaseInfo, END_SUFFIX, GAME_STATE_ID, PLAYER_PREFIX, is_player_doc, player_doc_id,
        seq_to_string,
    },
};

const MAX_CONFLICT_RETRIES: u32 = 5;
/// How long CouchDB holds a long-poll `_changes` request open.
const CHANGES_POLL_TIMEOUT_MS: u64 = 25_000;
const CHANGES_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct CouchDocumentStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchDocumentStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.database_url(), path);
        self.with_auth(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .with_auth(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .with_auth(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// PUT a document; `Ok(false)` signals a revision conflict.
    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<bool>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(false),
            status if status.is_success() => Ok(true),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    async fn find_player_entity(&self, code: &str) -> CouchResult<Option<PlayerEntity>> {
        let doc = self
            .get_document::<CouchPlayerDocument>(&player_doc_id(code))
            .await?;
        Ok(doc.map(CouchPlayerDocument::into_entity))
    }

    async fn list_player_entities(&self) -> CouchResult<Vec<PlayerEntity>> {
        let docs = self
            .list_documents::<CouchPlayerDocument>(PLAYER_PREFIX)
            .await?;
        Ok(docs
            .into_iter()
            .map(CouchPlayerDocument::into_entity)
            .collect())
    }

    async fn find_game_state_entity(&self) -> CouchResult<Option<GameStateEntity>> {
        let doc = self
            .get_document::<CouchGameStateDocument>(GAME_STATE_ID)
            .await?;
        Ok(doc.map(|doc| doc.state))
    }

    async fn create_player_document(&self, code: String) -> CouchResult<bool> {
        let doc_id = player_doc_id(&code);
        let doc = CouchPlayerDocument::from_entity(PlayerEntity::unclaimed(code), None);
        self.put_document(&doc_id, &doc).await
    }

    /// Read-modify-write a player, retrying on revision conflicts.
    async fn update_player_document(&self, code: String, update: PlayerUpdate) -> CouchResult<()> {
        let doc_id = player_doc_id(&code);
        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let Some(doc) = self.get_document::<CouchPlayerDocument>(&doc_id).await? else {
                return Err(CouchDaoError::MissingDocument {
                    collection: PLAYERS_COLLECTION,
                    id: code,
                });
            };

            let rev = doc.rev.clone();
            let mut entity = doc.into_entity();
            entity.apply(update.clone(), SystemTime::now());

            let updated = CouchPlayerDocument::from_entity(entity, rev);
            if self.put_document(&doc_id, &updated).await? {
                return Ok(());
            }
            debug!(doc_id, attempt, "player update hit a revision conflict; retrying");
        }

        Err(CouchDaoError::ConflictRetriesExhausted {
            path: doc_id,
            attempts: MAX_CONFLICT_RETRIES,
        })
    }

    async fn patch_game_state_document(
        &self,
        patch: GameStatePatch,
        upsert: bool,
    ) -> CouchResult<()> {
        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let existing = self
                .get_document::<CouchGameStateDocument>(GAME_STATE_ID)
                .await?;
            let (mut state, rev) = match existing {
                Some(doc) => (doc.state, doc.rev),
                None if upsert => (GameStateEntity::default(), None),
                None => {
                    return Err(CouchDaoError::MissingDocument {
                        collection: GAME_STATE_COLLECTION,
                        id: GAME_STATE_DOC_ID.to_string(),
                    });
                }
            };
            patch.apply(&mut state);

            let doc = CouchGameStateDocument::new(state, rev);
            if self.put_document(GAME_STATE_ID, &doc).await? {
                return Ok(());
            }
            debug!(attempt, "game state update hit a revision conflict; retrying");
        }

        Err(CouchDaoError::ConflictRetriesExhausted {
            path: GAME_STATE_ID.to_string(),
            attempts: MAX_CONFLICT_RETRIES,
        })
    }

    async fn update_seq(&self) -> CouchResult<String> {
        let url = self.database_url();
        let response = self
            .with_auth(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: url,
                status: response.status(),
            });
        }

        let info = response
            .json::<DatabaseInfo>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse { path: url, source })?;
        Ok(seq_to_string(&info.update_seq))
    }

    /// Long-poll `_changes` until at least one change after `since` is committed
    /// or the poll times out (empty result set).
    async fn changes_since(&self, since: &str) -> CouchResult<ChangesResponse> {
        const CHANGES: &str = "_changes";
        let query = [
            ("feed", "longpoll".to_string()),
            ("since", since.to_string()),
            ("timeout", CHANGES_POLL_TIMEOUT_MS.to_string()),
        ];

        let response = self
            .request(Method::GET, CHANGES)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: CHANGES.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: CHANGES.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<ChangesResponse>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: CHANGES.to_string(),
                source,
            })
    }

    /// Build a snapshot stream over the `_changes` feed: `fetch` is re-run
    /// whenever a change touches a document accepted by `matches`.
    ///
    /// Transport errors are yielded and the feed resumes after a delay.
    fn watch<T, M, F, Fut>(&self, matches: M, fetch: F) -> ChangeStream<T>
    where
        T: Clone + PartialEq + Send + 'static,
        M: Fn(&str) -> bool + Send + 'static,
        F: Fn(CouchDocumentStore) -> Fut + Send + 'static,
        Fut: Future<Output = CouchResult<T>> + Send,
    {
        let store = self.clone();
        Box::pin(stream! {
            let mut since: Option<String> = None;
            let mut last: Option<T> = None;
            let mut stale = true;

            loop {
                let seq = match since.clone() {
                    Some(seq) => seq,
                    None => match store.update_seq().await {
                        Ok(seq) => seq,
                        Err(err) => {
                            yield Err(StorageError::from(err));
                            sleep(CHANGES_RETRY_DELAY).await;
                            continue;
                        }
                    },
                };
                since = Some(seq.clone());

                if stale {
                    match fetch(store.clone()).await {
                        Ok(current) => {
                            stale = false;
                            if last.as_ref() != Some(&current) {
                                last = Some(current.clone());
                                yield Ok(current);
                            }
                        }
                        Err(err) => {
                            yield Err(StorageError::from(err));
                            sleep(CHANGES_RETRY_DELAY).await;
                            continue;
                        }
                    }
                }

                match store.changes_since(&seq).await {
                    Ok(batch) => {
                        stale = batch.results.iter().any(|change| matches(&change.id));
                        since = Some(seq_to_string(&batch.last_seq));
                    }
                    Err(err) => {
                        yield Err(StorageError::from(err));
                        sleep(CHANGES_RETRY_DELAY).await;
                    }
                }
            }
        })
    }
}

impl DocumentStore for CouchDocumentStore {
    fn find_player(&self, code: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_player_entity(&code).await.map_err(Into::into) })
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_player_entities().await.map_err(Into::into) })
    }

    fn create_player(&self, code: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.create_player_document(code).await.map_err(Into::into) })
    }

    fn update_player(
        &self,
        code: String,
        update: PlayerUpdate,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_player_document(code, update)
                .await
                .map_err(Into::into)
        })
    }

    fn find_game_state(&self) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game_state_entity().await.map_err(Into::into) })
    }

    fn merge_game_state(&self, patch: GameStatePatch) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .patch_game_state_document(patch, true)
                .await
                .map_err(Into::into)
        })
    }

    fn update_game_state(&self, patch: GameStatePatch) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .patch_game_state_document(patch, false)
                .await
                .map_err(Into::into)
        })
    }

    fn watch_player(&self, code: String) -> ChangeStream<Option<PlayerEntity>> {
        let doc_id = player_doc_id(&code);
        self.watch(
            move |id| id == doc_id,
            move |store| {
                let code = code.clone();
                async move { store.find_player_entity(&code).await }
            },
        )
    }

    fn watch_players(&self) -> ChangeStream<Vec<PlayerEntity>> {
        self.watch(is_player_doc, |store| async move {
            store.list_player_entities().await
        })
    }

    fn watch_game_state(&self) -> ChangeStream<Option<GameStateEntity>> {
        self.watch(
            |id| id == GAME_STATE_ID,
            |store| async move { store.find_game_state_entity().await },
        )
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .with_auth(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
