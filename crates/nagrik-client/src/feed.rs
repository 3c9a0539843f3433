//! Realtime message feed synchronizer.
//!
//! Maintains an ordered, deduplicated view of chat messages by merging a
//! one-shot fetch with the live insert subscription. The subscription is
//! opened before the fetch so a message created during the initialization
//! window is seen by at least one side; seeing it on both is harmless
//! because entries are deduplicated by identifier.
//!
//! Ordering is `(created_at, id)` ascending regardless of arrival order.
//! Sending never appends locally: the server-confirmed echo is the only
//! write path into the feed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use futures::StreamExt;
use nagrik_backend::{BackendError, MessageStore, MessageSubscription};
use nagrik_core::models::{ChatMessage, NewMessage};
use nagrik_core::{normalize_message_body, ValidationError};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A feed entry with ownership resolved once at insertion time.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub message: ChatMessage,
    pub mine: bool,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Feed already initialized")]
    AlreadyInitialized,

    #[error("Feed disposed")]
    Disposed,

    #[error("Backend failure: {0}")]
    Backend(#[from] BackendError),
}

struct FeedInner {
    entries: Vec<FeedEntry>,
    seen: HashSet<Uuid>,
    disposed: bool,
}

impl FeedInner {
    /// Insert at the ordering position unless already present or disposed.
    /// Returns whether the feed changed.
    fn apply(&mut self, viewer: Option<Uuid>, message: ChatMessage) -> bool {
        if self.disposed || !self.seen.insert(message.id) {
            return false;
        }
        let key = message.ordering_key();
        let position = self
            .entries
            .partition_point(|e| e.message.ordering_key() < key);
        let mine = viewer == Some(message.sender_id);
        self.entries.insert(position, FeedEntry { message, mine });
        true
    }
}

pub struct MessageFeed {
    store: Arc<dyn MessageStore>,
    viewer: Option<Uuid>,
    inner: Arc<Mutex<FeedInner>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    updates_tx: watch::Sender<u64>,
}

impl MessageFeed {
    /// `viewer` is the session identity captured once; each entry's `mine`
    /// flag is resolved against it at insertion.
    pub fn new(store: Arc<dyn MessageStore>, viewer: Option<Uuid>) -> Self {
        let (updates_tx, _) = watch::channel(0);
        Self {
            store,
            viewer,
            inner: Arc::new(Mutex::new(FeedInner {
                entries: Vec::new(),
                seen: HashSet::new(),
                disposed: false,
            })),
            consumer: Mutex::new(None),
            updates_tx,
        }
    }

    /// Open the live subscription, seed local state from the one-shot
    /// fetch, and start draining the subscription into local state.
    pub async fn initialize(&self) -> Result<(), FeedError> {
        {
            let consumer = self.consumer.lock().expect("feed consumer lock");
            if consumer.is_some() {
                return Err(FeedError::AlreadyInitialized);
            }
        }
        if self.inner.lock().expect("feed lock").disposed {
            return Err(FeedError::Disposed);
        }

        let subscription = self.store.subscribe().await?;
        let snapshot = self.store.fetch_ordered().await?;
        self.apply_all(snapshot);

        let handle = tokio::spawn(consumer_loop(
            self.store.clone(),
            self.viewer,
            self.inner.clone(),
            self.updates_tx.clone(),
            subscription,
        ));
        *self.consumer.lock().expect("feed consumer lock") = Some(handle);
        Ok(())
    }

    /// Current entries in rendering order.
    pub fn snapshot(&self) -> Vec<FeedEntry> {
        self.inner.lock().expect("feed lock").entries.clone()
    }

    /// Receiver that ticks whenever the feed changes; for render loops.
    pub fn watch_updates(&self) -> watch::Receiver<u64> {
        self.updates_tx.subscribe()
    }

    /// Submit a message. The body must be non-empty after trimming; the
    /// new row reaches the feed only through the subscription echo.
    pub async fn send(&self, body: &str) -> Result<(), FeedError> {
        if self.inner.lock().expect("feed lock").disposed {
            return Err(FeedError::Disposed);
        }
        let sender_id = self.viewer.ok_or(FeedError::NotSignedIn)?;
        let body = normalize_message_body(body)?;

        self.store
            .insert(NewMessage { sender_id, body })
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Message insert failed");
                FeedError::Backend(e)
            })
    }

    /// Release the live subscription and bar any further state mutation,
    /// including events already in flight.
    pub fn dispose(&self) {
        self.inner.lock().expect("feed lock").disposed = true;
        if let Some(handle) = self.consumer.lock().expect("feed consumer lock").take() {
            handle.abort();
        }
        tracing::debug!("Message feed disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().expect("feed lock").disposed
    }

    fn apply_all(&self, messages: Vec<ChatMessage>) {
        let mut changed = false;
        {
            let mut inner = self.inner.lock().expect("feed lock");
            for message in messages {
                changed |= inner.apply(self.viewer, message);
            }
        }
        if changed {
            self.updates_tx.send_modify(|v| *v += 1);
        }
    }

    /// Test seam mirroring what the consumer task does for one event.
    #[cfg(test)]
    fn apply_incoming(&self, message: ChatMessage) -> bool {
        let changed = self
            .inner
            .lock()
            .expect("feed lock")
            .apply(self.viewer, message);
        if changed {
            self.updates_tx.send_modify(|v| *v += 1);
        }
        changed
    }
}

impl Drop for MessageFeed {
    fn drop(&mut self) {
        // The consumer task must not outlive the feed.
        if let Ok(mut consumer) = self.consumer.lock() {
            if let Some(handle) = consumer.take() {
                handle.abort();
            }
        }
    }
}

/// Drain the subscription into the shared state. On a dropped stream,
/// resubscribe with doubling backoff (guarded by the disposed flag) and
/// re-fetch to close the gap the outage opened.
async fn consumer_loop(
    store: Arc<dyn MessageStore>,
    viewer: Option<Uuid>,
    inner: Arc<Mutex<FeedInner>>,
    updates_tx: watch::Sender<u64>,
    mut subscription: MessageSubscription,
) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match subscription.next().await {
            Some(Ok(message)) => {
                backoff = INITIAL_BACKOFF;
                let changed = inner.lock().expect("feed lock").apply(viewer, message);
                if changed {
                    updates_tx.send_modify(|v| *v += 1);
                }
            }
            dropped => {
                if inner.lock().expect("feed lock").disposed {
                    return;
                }
                if let Some(Err(e)) = dropped {
                    tracing::warn!(error = %e, "Message subscription dropped");
                } else {
                    tracing::warn!("Message subscription ended");
                }

                subscription = match resubscribe(&store, &inner, &mut backoff).await {
                    Some(subscription) => subscription,
                    None => return,
                };

                match store.fetch_ordered().await {
                    Ok(snapshot) => {
                        let mut changed = false;
                        {
                            let mut inner = inner.lock().expect("feed lock");
                            for message in snapshot {
                                changed |= inner.apply(viewer, message);
                            }
                        }
                        if changed {
                            updates_tx.send_modify(|v| *v += 1);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Gap re-fetch failed after resubscribe");
                    }
                }
            }
        }
    }
}

/// Retry `subscribe` until it succeeds or the feed is disposed.
async fn resubscribe(
    store: &Arc<dyn MessageStore>,
    inner: &Arc<Mutex<FeedInner>>,
    backoff: &mut Duration,
) -> Option<MessageSubscription> {
    loop {
        tokio::time::sleep(*backoff).await;
        if inner.lock().expect("feed lock").disposed {
            return None;
        }
        match store.subscribe().await {
            Ok(subscription) => {
                tracing::info!("Message subscription re-established");
                return Some(subscription);
            }
            Err(e) => {
                tracing::warn!(error = %e, backoff_ms = backoff.as_millis() as u64, "Resubscribe failed");
                *backoff = (*backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use nagrik_backend::MemoryBackend;

    fn msg_at(id: Uuid, secs: i64, body: &str) -> ChatMessage {
        ChatMessage {
            id,
            sender_id: Uuid::new_v4(),
            body: body.to_string(),
            created_at: DateTime::from_timestamp(secs, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_suppressed() {
        let backend = MemoryBackend::new();
        let feed = MessageFeed::new(backend, None);

        let m1 = msg_at(Uuid::new_v4(), 1, "hi");
        assert!(feed.apply_incoming(m1.clone()));
        assert!(!feed.apply_incoming(m1));
        assert_eq!(feed.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_entries_sort_by_timestamp_then_id() {
        let backend = MemoryBackend::new();
        let feed = MessageFeed::new(backend, None);

        let m2 = msg_at(Uuid::from_u128(9), 5, "second");
        let m1 = msg_at(Uuid::from_u128(1), 2, "first");
        feed.apply_incoming(m2.clone());
        feed.apply_incoming(m1.clone());

        let bodies: Vec<String> = feed
            .snapshot()
            .iter()
            .map(|e| e.message.body.clone())
            .collect();
        assert_eq!(bodies, vec!["first", "second"]);

        // Equal timestamps: identifier decides.
        let tie_low = msg_at(Uuid::from_u128(2), 5, "tie-low");
        feed.apply_incoming(tie_low);
        let ids: Vec<Uuid> = feed.snapshot().iter().map(|e| e.message.id).collect();
        assert_eq!(
            ids,
            vec![Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(9)]
        );
    }

    #[tokio::test]
    async fn test_empty_and_whitespace_sends_issue_no_insert() {
        let backend = MemoryBackend::new();
        let feed = MessageFeed::new(backend.clone(), Some(Uuid::new_v4()));

        assert!(matches!(
            feed.send("").await,
            Err(FeedError::Validation(ValidationError::EmptyMessage))
        ));
        assert!(matches!(
            feed.send("   ").await,
            Err(FeedError::Validation(ValidationError::EmptyMessage))
        ));
        assert!(backend.fetch_ordered().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_requires_identity() {
        let backend = MemoryBackend::new();
        let feed = MessageFeed::new(backend, None);
        assert!(matches!(
            feed.send("hello").await,
            Err(FeedError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn test_send_does_not_append_locally() {
        let backend = MemoryBackend::new();
        let feed = MessageFeed::new(backend.clone(), Some(Uuid::new_v4()));
        // Not initialized: no subscription, so no echo can arrive.
        feed.send("namaste").await.unwrap();
        assert!(feed.snapshot().is_empty());
        assert_eq!(backend.fetch_ordered().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_late_event_after_dispose_mutates_nothing() {
        let backend = MemoryBackend::new();
        let feed = MessageFeed::new(backend, None);
        feed.apply_incoming(msg_at(Uuid::new_v4(), 1, "kept"));

        feed.dispose();
        assert!(feed.is_disposed());

        let late = msg_at(Uuid::new_v4(), 2, "late");
        assert!(!feed.apply_incoming(late));
        assert_eq!(feed.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_send_after_dispose_is_rejected() {
        let backend = MemoryBackend::new();
        let feed = MessageFeed::new(backend, Some(Uuid::new_v4()));
        feed.dispose();
        assert!(matches!(feed.send("hi").await, Err(FeedError::Disposed)));
    }

    #[tokio::test]
    async fn test_ownership_resolved_at_insert() {
        let me = Uuid::new_v4();
        let backend = MemoryBackend::new();
        let feed = MessageFeed::new(backend, Some(me));

        let mut mine = msg_at(Uuid::new_v4(), 1, "mine");
        mine.sender_id = me;
        let theirs = msg_at(Uuid::new_v4(), 2, "theirs");

        feed.apply_incoming(mine);
        feed.apply_incoming(theirs);

        let snapshot = feed.snapshot();
        assert!(snapshot[0].mine);
        assert!(!snapshot[1].mine);
    }

    #[tokio::test]
    async fn test_initialize_twice_is_rejected() {
        let backend = MemoryBackend::new();
        let feed = MessageFeed::new(backend, None);
        feed.initialize().await.unwrap();
        assert!(matches!(
            feed.initialize().await,
            Err(FeedError::AlreadyInitialized)
        ));
        feed.dispose();
    }
}
