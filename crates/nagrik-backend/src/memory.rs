//! In-process backend.
//!
//! Implements the full capability set against process-local state: tables
//! behind `RwLock`, insert fan-out over `tokio::sync::broadcast`, session
//! over a watch channel. This is the substitutable test double the
//! injected-capability design exists for, and it also powers the demo mode
//! of the CLI.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use nagrik_core::models::{
    AuthUser, ChatMessage, Document, DocumentStatusEvent, NewDocument, NewMessage,
    PreferredLanguage, ProcessingStatus, Profile, ProfileUpdate, SessionState,
};

use crate::traits::{
    AuthApi, BackendError, BackendResult, DocumentStore, FileStore, MessageStore,
    MessageSubscription, ProfileStore, StatusSubscription,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct Account {
    user_id: Uuid,
    // Plaintext is fine here: this backend never outlives the process and
    // exists to stand in for a hosted auth provider in tests and demos.
    password: String,
}

/// In-process implementation of every backend capability.
pub struct MemoryBackend {
    documents: RwLock<Vec<Document>>,
    messages: RwLock<Vec<ChatMessage>>,
    profiles: RwLock<HashMap<Uuid, Profile>>,
    accounts: RwLock<HashMap<String, Account>>,
    files: RwLock<HashMap<String, Bytes>>,
    message_tx: broadcast::Sender<ChatMessage>,
    status_tx: broadcast::Sender<DocumentStatusEvent>,
    session_tx: watch::Sender<SessionState>,
}

impl MemoryBackend {
    /// Create a backend whose session starts unresolved (`loading`), the
    /// way a hosted auth client reports before its stored-session check
    /// completes. Call [`resolve_session`](Self::resolve_session) or sign in
    /// to resolve it.
    pub fn new() -> Arc<Self> {
        let (message_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (status_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (session_tx, _) = watch::channel(SessionState::loading());

        Arc::new(Self {
            documents: RwLock::new(Vec::new()),
            messages: RwLock::new(Vec::new()),
            profiles: RwLock::new(HashMap::new()),
            accounts: RwLock::new(HashMap::new()),
            files: RwLock::new(HashMap::new()),
            message_tx,
            status_tx,
            session_tx,
        })
    }

    /// Resolve the initial session check with "no stored session".
    pub fn resolve_session(&self) {
        self.session_tx.send_replace(SessionState::signed_out());
    }

    /// Stand-in for the out-of-process OCR collaborator: advance a
    /// document's status and publish the change to status subscribers.
    pub async fn set_document_status(
        &self,
        document_id: Uuid,
        status: ProcessingStatus,
    ) -> BackendResult<()> {
        let mut documents = self.documents.write().await;
        let doc = documents
            .iter_mut()
            .find(|d| d.id == document_id)
            .ok_or_else(|| BackendError::NotFound(format!("document {}", document_id)))?;
        doc.status = status;
        drop(documents);

        let _ = self.status_tx.send(DocumentStatusEvent {
            document_id,
            status,
        });
        Ok(())
    }

    fn file_key(bucket: &str, path: &str) -> String {
        format!("{}/{}", bucket, path)
    }
}

#[async_trait]
impl FileStore for MemoryBackend {
    async fn store(
        &self,
        bucket: &str,
        path: &str,
        _content_type: &str,
        data: Bytes,
    ) -> BackendResult<()> {
        self.files
            .write()
            .await
            .insert(Self::file_key(bucket, path), data);
        Ok(())
    }

    async fn load(&self, bucket: &str, path: &str) -> BackendResult<Bytes> {
        self.files
            .read()
            .await
            .get(&Self::file_key(bucket, path))
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("{}/{}", bucket, path)))
    }

    async fn exists(&self, bucket: &str, path: &str) -> BackendResult<bool> {
        Ok(self
            .files
            .read()
            .await
            .contains_key(&Self::file_key(bucket, path)))
    }

    async fn delete(&self, bucket: &str, path: &str) -> BackendResult<()> {
        self.files
            .write()
            .await
            .remove(&Self::file_key(bucket, path))
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(format!("{}/{}", bucket, path)))
    }
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    async fn create(&self, new: NewDocument) -> BackendResult<Document> {
        let document = Document {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            document_type: new.document_type,
            storage_bucket: new.storage_bucket,
            storage_path: new.storage_path,
            status: ProcessingStatus::Pending,
            created_at: Utc::now(),
        };
        self.documents.write().await.push(document.clone());
        Ok(document)
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> BackendResult<Vec<Document>> {
        let mut docs: Vec<Document> = self
            .documents
            .read()
            .await
            .iter()
            .filter(|d| d.owner_id == owner_id)
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(docs)
    }

    async fn subscribe_status(&self) -> BackendResult<StatusSubscription> {
        let rx = self.status_tx.subscribe();
        let stream = BroadcastStream::new(rx)
            .map(|item| item.map_err(|e| BackendError::Subscription(e.to_string())));
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl MessageStore for MemoryBackend {
    async fn fetch_ordered(&self) -> BackendResult<Vec<ChatMessage>> {
        let mut messages = self.messages.read().await.clone();
        messages.sort_by_key(|m| m.ordering_key());
        Ok(messages)
    }

    async fn insert(&self, new: NewMessage) -> BackendResult<()> {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            sender_id: new.sender_id,
            body: new.body,
            created_at: Utc::now(),
        };
        self.messages.write().await.push(message.clone());
        // Subscribers may not exist yet; that is not an error.
        let _ = self.message_tx.send(message);
        Ok(())
    }

    async fn subscribe(&self) -> BackendResult<MessageSubscription> {
        let rx = self.message_tx.subscribe();
        let stream = BroadcastStream::new(rx)
            .map(|item| item.map_err(|e| BackendError::Subscription(e.to_string())));
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl ProfileStore for MemoryBackend {
    async fn get(&self, user_id: Uuid) -> BackendResult<Option<Profile>> {
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }

    async fn update(&self, user_id: Uuid, update: ProfileUpdate) -> BackendResult<Profile> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(&user_id)
            .ok_or_else(|| BackendError::NotFound(format!("profile {}", user_id)))?;
        profile.full_name = update.full_name;
        profile.phone_number = update.phone_number;
        profile.preferred_language = update.preferred_language;
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }
}

#[async_trait]
impl AuthApi for MemoryBackend {
    async fn sign_up(&self, email: &str, password: &str) -> BackendResult<AuthUser> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(BackendError::InvalidInput(format!(
                "Invalid email: {}",
                email
            )));
        }

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email) {
            return Err(BackendError::InvalidInput(format!(
                "Account already exists: {}",
                email
            )));
        }

        let user_id = Uuid::new_v4();
        accounts.insert(
            email.clone(),
            Account {
                user_id,
                password: password.to_string(),
            },
        );
        drop(accounts);

        // A fresh account gets an empty profile row, the way the hosted
        // platform provisions one on signup.
        self.profiles.write().await.insert(
            user_id,
            Profile {
                user_id,
                full_name: None,
                phone_number: None,
                preferred_language: PreferredLanguage::default(),
                updated_at: Utc::now(),
            },
        );

        Ok(AuthUser { id: user_id, email })
    }

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthUser> {
        let email = email.trim().to_lowercase();
        let accounts = self.accounts.read().await;
        let account = accounts
            .get(&email)
            .filter(|a| a.password == password)
            .ok_or_else(|| BackendError::Unauthorized("Invalid email or password".to_string()))?;

        let user = AuthUser {
            id: account.user_id,
            email,
        };
        drop(accounts);

        self.session_tx
            .send_replace(SessionState::signed_in(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        self.session_tx.send_replace(SessionState::signed_out());
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> BackendResult<()> {
        let email = email.trim().to_lowercase();
        if !self.accounts.read().await.contains_key(&email) {
            return Err(BackendError::NotFound(format!("account {}", email)));
        }
        tracing::info!(email = %email, "Password reset requested");
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.session_tx.borrow().user.clone()
    }

    fn watch_session(&self) -> watch::Receiver<SessionState> {
        self.session_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let backend = MemoryBackend::new();
        assert!(backend.watch_session().borrow().loading);

        let user = backend.sign_up("Asha@Example.org", "secret").await.unwrap();
        assert_eq!(user.email, "asha@example.org");
        assert!(backend.current_user().is_none());

        let signed_in = backend
            .sign_in("asha@example.org", "secret")
            .await
            .unwrap();
        assert_eq!(signed_in.id, user.id);
        assert_eq!(backend.current_user(), Some(signed_in));

        backend.sign_out().await.unwrap();
        assert!(backend.current_user().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password() {
        let backend = MemoryBackend::new();
        backend.sign_up("a@b.c", "secret").await.unwrap();
        let err = backend.sign_in("a@b.c", "wrong").await;
        assert!(matches!(err, Err(BackendError::Unauthorized(_))));
        assert!(backend.current_user().is_none());
    }

    #[tokio::test]
    async fn test_signup_provisions_profile() {
        let backend = MemoryBackend::new();
        let user = backend.sign_up("a@b.c", "secret").await.unwrap();
        let profile = backend.get(user.id).await.unwrap().unwrap();
        assert_eq!(profile.full_name, None);
        assert_eq!(profile.preferred_language, PreferredLanguage::En);
    }

    #[tokio::test]
    async fn test_message_insert_reaches_subscriber() {
        let backend = MemoryBackend::new();
        let mut sub = backend.subscribe().await.unwrap();

        backend
            .insert(NewMessage {
                sender_id: Uuid::new_v4(),
                body: "namaste".to_string(),
            })
            .await
            .unwrap();

        let echoed = sub.next().await.unwrap().unwrap();
        assert_eq!(echoed.body, "namaste");

        let fetched = backend.fetch_ordered().await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, echoed.id);
    }

    #[tokio::test]
    async fn test_document_status_event_reaches_subscriber() {
        let backend = MemoryBackend::new();
        let doc = backend
            .create(NewDocument {
                owner_id: Uuid::new_v4(),
                document_type: "identity".to_string(),
                storage_bucket: "documents".to_string(),
                storage_path: "identity/x.pdf".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(doc.status, ProcessingStatus::Pending);

        let mut sub = backend.subscribe_status().await.unwrap();
        backend
            .set_document_status(doc.id, ProcessingStatus::Processing)
            .await
            .unwrap();

        let event = sub.next().await.unwrap().unwrap();
        assert_eq!(event.document_id, doc.id);
        assert_eq!(event.status, ProcessingStatus::Processing);
    }

    #[tokio::test]
    async fn test_list_for_owner_filters_and_orders() {
        let backend = MemoryBackend::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        for (who, ty) in [(owner, "identity"), (other, "identity"), (owner, "income")] {
            backend
                .create(NewDocument {
                    owner_id: who,
                    document_type: ty.to_string(),
                    storage_bucket: "documents".to_string(),
                    storage_path: format!("{}/{}.pdf", ty, Uuid::new_v4()),
                })
                .await
                .unwrap();
        }

        let docs = backend.list_for_owner(owner).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.owner_id == owner));
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let backend = MemoryBackend::new();
        backend
            .store("documents", "identity/a.pdf", "application/pdf", Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert!(backend.exists("documents", "identity/a.pdf").await.unwrap());
        assert_eq!(
            backend.load("documents", "identity/a.pdf").await.unwrap(),
            Bytes::from_static(b"x")
        );
    }
}
