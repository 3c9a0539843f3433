//! Backend capability traits
//!
//! This module defines the capability set the client components consume.
//! Every implementation (in-memory, Postgres) must implement these traits;
//! components receive them as `Arc<dyn …>` at construction so tests can
//! substitute doubles.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use nagrik_core::models::{
    AuthUser, ChatMessage, Document, DocumentStatusEvent, NewDocument, NewMessage, Profile,
    ProfileUpdate, SessionState,
};

/// Backend operation errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Database failure: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Subscription failure: {0}")]
    Subscription(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// A live event stream. Dropping the stream releases the underlying
/// channel or listener; there is no separate unsubscribe call.
pub type EventStream<T> = Pin<Box<dyn Stream<Item = BackendResult<T>> + Send>>;

/// Live feed of message inserts, in server-insertion order.
pub type MessageSubscription = EventStream<ChatMessage>;

/// Live feed of document status changes from the processing collaborator.
pub type StatusSubscription = EventStream<DocumentStatusEvent>;

/// File storage capability (bucket + path addressed blobs).
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store `data` at `bucket`/`path`. Paths are write-once per upload
    /// attempt; callers derive a fresh path for every attempt.
    async fn store(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> BackendResult<()>;

    async fn load(&self, bucket: &str, path: &str) -> BackendResult<Bytes>;

    async fn exists(&self, bucket: &str, path: &str) -> BackendResult<bool>;

    async fn delete(&self, bucket: &str, path: &str) -> BackendResult<()>;
}

/// Document record capability.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a record with status `pending`. The backend assigns the id.
    async fn create(&self, new: NewDocument) -> BackendResult<Document>;

    /// All documents for an owner, newest first.
    async fn list_for_owner(&self, owner_id: Uuid) -> BackendResult<Vec<Document>>;

    /// Subscribe to status changes made by the processing collaborator.
    async fn subscribe_status(&self) -> BackendResult<StatusSubscription>;
}

/// Chat message capability.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// One-shot fetch of all messages, ascending by creation time.
    async fn fetch_ordered(&self) -> BackendResult<Vec<ChatMessage>>;

    /// Insert a message. The created row reaches clients only through the
    /// insert subscription echo.
    async fn insert(&self, new: NewMessage) -> BackendResult<()>;

    /// Open a live subscription to message inserts.
    async fn subscribe(&self) -> BackendResult<MessageSubscription>;
}

/// Citizen profile capability.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, user_id: Uuid) -> BackendResult<Option<Profile>>;

    async fn update(&self, user_id: Uuid, update: ProfileUpdate) -> BackendResult<Profile>;
}

/// Authentication capability. Session changes are published over a watch
/// channel so the session gate can react to sign-in/sign-out.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> BackendResult<AuthUser>;

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthUser>;

    async fn sign_out(&self) -> BackendResult<()>;

    /// Request a password reset for `email`. Delivery is the provider's
    /// concern; this only validates the account exists.
    async fn reset_password(&self, email: &str) -> BackendResult<()>;

    fn current_user(&self) -> Option<AuthUser>;

    fn watch_session(&self) -> watch::Receiver<SessionState>;
}
