use futures::StreamExt;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::warn;

use crate::dao::document_store::ChangeStream;

/// Standing subscription to a store change stream.
///
/// The forwarding task is aborted when the handle is dropped, so whoever owns
/// the handle owns the subscription.
#[derive(Debug)]
pub struct Subscription {
    key: String,
    handle: AbortHandle,
}

impl Subscription {
    /// Forward every snapshot of `changes` to `on_change` on a background task.
    ///
    /// Stream errors are logged and skipped; the task ends when the stream does.
    pub fn spawn<T, F>(key: impl Into<String>, mut changes: ChangeStream<T>, mut on_change: F) -> Self
    where
        T: Send + 'static,
        F: FnMut(T) + Send + 'static,
    {
        let key = key.into();
        let task_key = key.clone();
        let task: JoinHandle<()> = tokio::spawn(async move {
            while let Some(item) = changes.next().await {
                match item {
                    Ok(value) => on_change(value),
                    Err(err) => warn!(subscription = %task_key, error = %err, "change stream error"),
                }
            }
        });

        Self {
            key,
            handle: task.abort_handle(),
        }
    }

    /// Identifier of the watched document (or collection).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the forwarding task is still running.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Whether this subscription already covers `key` and is still running.
    pub fn covers(&self, key: &str) -> bool {
        self.key == key && self.is_active()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::watch;

    use super::*;
    use crate::dao::document_store::{DocumentStore, memory::MemoryDocumentStore};

    #[tokio::test]
    async fn forwards_snapshots_until_dropped() {
        let store = MemoryDocumentStore::new();
        let (tx, mut rx) = watch::channel(None);
        let subscription = Subscription::spawn("game_state", store.watch_game_state(), move |state| {
            tx.send_replace(state);
        });
        assert!(subscription.covers("game_state"));
        assert!(!subscription.covers("players"));

        store
            .merge_game_state(crate::dao::models::GameStatePatch::enter_level(2))
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|state| state.is_some()))
            .await
            .unwrap()
            .unwrap();

        drop(subscription);
        // The aborted task drops the sender, closing the channel.
        tokio::time::timeout(Duration::from_secs(1), async {
            while rx.changed().await.is_ok() {}
        })
        .await
        .unwrap();
    }
}
