//! Postgres-backed stores.
//!
//! Records live in Postgres via sqlx; the realtime change feeds are
//! LISTEN/NOTIFY channels fed by triggers (see `migrations/`). Each
//! subscription holds its own `PgListener` connection; dropping the stream
//! closes it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgListener, PgPoolOptions};
use sqlx::PgPool;
use tokio::sync::watch;
use uuid::Uuid;

use nagrik_core::models::{
    AuthUser, ChatMessage, Document, DocumentStatusEvent, NewDocument, NewMessage,
    ProcessingStatus, Profile, ProfileUpdate, SessionState,
};

use crate::traits::{
    AuthApi, BackendError, BackendResult, DocumentStore, MessageStore, MessageSubscription,
    ProfileStore, StatusSubscription,
};

const MESSAGE_CHANNEL: &str = "nagrik_chat_messages";
const STATUS_CHANNEL: &str = "nagrik_document_status";
const MAX_CONNECTIONS: u32 = 10;

fn db_err(e: sqlx::Error) -> BackendError {
    BackendError::Database(e.to_string())
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    owner_id: Uuid,
    document_type: String,
    storage_bucket: String,
    storage_path: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for Document {
    type Error = BackendError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let status: ProcessingStatus = row
            .status
            .parse()
            .map_err(|e| BackendError::Database(format!("{}", e)))?;
        Ok(Document {
            id: row.id,
            owner_id: row.owner_id,
            document_type: row.document_type,
            storage_bucket: row.storage_bucket,
            storage_path: row.storage_path,
            status,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    sender_id: Uuid,
    body: String,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for ChatMessage {
    fn from(row: MessageRow) -> Self {
        ChatMessage {
            id: row.id,
            sender_id: row.sender_id,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: Uuid,
    full_name: Option<String>,
    phone_number: Option<String>,
    preferred_language: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = BackendError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(Profile {
            user_id: row.user_id,
            full_name: row.full_name,
            phone_number: row.phone_number,
            preferred_language: row
                .preferred_language
                .parse()
                .map_err(|e| BackendError::Database(format!("{}", e)))?,
            updated_at: row.updated_at,
        })
    }
}

/// Record stores over a shared connection pool.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub async fn connect(database_url: &str) -> BackendResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(db_err)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> BackendResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| BackendError::Database(e.to_string()))?;
        Ok(())
    }

    /// Open a LISTEN stream on `channel`, decoding each NOTIFY payload as
    /// JSON. A decode or connection error is surfaced as a stream item so
    /// the consumer can tear down and resubscribe.
    async fn listen<T>(&self, channel: &str) -> BackendResult<crate::traits::EventStream<T>>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| BackendError::Subscription(e.to_string()))?;
        listener
            .listen(channel)
            .await
            .map_err(|e| BackendError::Subscription(e.to_string()))?;

        let stream = futures::stream::unfold(listener, |mut listener| async move {
            let item = match listener.recv().await {
                Ok(notification) => serde_json::from_str::<T>(notification.payload())
                    .map_err(|e| BackendError::Subscription(format!("Bad payload: {}", e))),
                Err(e) => Err(BackendError::Subscription(e.to_string())),
            };
            Some((item, listener))
        });
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl DocumentStore for PgBackend {
    async fn create(&self, new: NewDocument) -> BackendResult<Document> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO documents (owner_id, document_type, storage_bucket, storage_path)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_id, document_type, storage_bucket, storage_path, status, created_at
            "#,
        )
        .bind(new.owner_id)
        .bind(&new.document_type)
        .bind(&new.storage_bucket)
        .bind(&new.storage_path)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        row.try_into()
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> BackendResult<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, owner_id, document_type, storage_bucket, storage_path, status, created_at
            FROM documents
            WHERE owner_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(Document::try_from).collect()
    }

    async fn subscribe_status(&self) -> BackendResult<StatusSubscription> {
        self.listen::<DocumentStatusEvent>(STATUS_CHANNEL).await
    }
}

#[async_trait]
impl MessageStore for PgBackend {
    async fn fetch_ordered(&self) -> BackendResult<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, sender_id, body, created_at
            FROM chat_messages
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }

    async fn insert(&self, new: NewMessage) -> BackendResult<()> {
        sqlx::query("INSERT INTO chat_messages (sender_id, body) VALUES ($1, $2)")
            .bind(new.sender_id)
            .bind(&new.body)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn subscribe(&self) -> BackendResult<MessageSubscription> {
        self.listen::<ChatMessage>(MESSAGE_CHANNEL).await
    }
}

#[async_trait]
impl ProfileStore for PgBackend {
    async fn get(&self, user_id: Uuid) -> BackendResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT user_id, full_name, phone_number, preferred_language, updated_at
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Profile::try_from).transpose()
    }

    async fn update(&self, user_id: Uuid, update: ProfileUpdate) -> BackendResult<Profile> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            UPDATE profiles
            SET full_name = $2, phone_number = $3, preferred_language = $4, updated_at = now()
            WHERE user_id = $1
            RETURNING user_id, full_name, phone_number, preferred_language, updated_at
            "#,
        )
        .bind(user_id)
        .bind(&update.full_name)
        .bind(&update.phone_number)
        .bind(update.preferred_language.code())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| BackendError::NotFound(format!("profile {}", user_id)))?;

        row.try_into()
    }
}

/// Auth against the `users` table with bcrypt password hashes. The session
/// watch channel is process-local; a CLI process starts signed out.
pub struct PgAuth {
    pool: PgPool,
    session_tx: watch::Sender<SessionState>,
}

impl PgAuth {
    pub fn new(pool: PgPool) -> Self {
        let (session_tx, _) = watch::channel(SessionState::signed_out());
        Self { pool, session_tx }
    }
}

#[async_trait]
impl AuthApi for PgAuth {
    async fn sign_up(&self, email: &str, password: &str) -> BackendResult<AuthUser> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(BackendError::InvalidInput(format!(
                "Invalid email: {}",
                email
            )));
        }

        let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| BackendError::Config(format!("Password hashing failed: {}", e)))?;

        let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING id",
        )
        .bind(&email)
        .bind(&hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                BackendError::InvalidInput(format!("Account already exists: {}", email))
            }
            _ => db_err(e),
        })?;

        sqlx::query("INSERT INTO profiles (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(AuthUser { id: user_id, email })
    }

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthUser> {
        let email = email.trim().to_lowercase();
        let row: Option<(Uuid, String)> =
            sqlx::query_as("SELECT id, password_hash FROM users WHERE email = $1")
                .bind(&email)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        let (user_id, hash) = row
            .ok_or_else(|| BackendError::Unauthorized("Invalid email or password".to_string()))?;

        let valid = bcrypt::verify(password, &hash)
            .map_err(|e| BackendError::Config(format!("Password verification failed: {}", e)))?;
        if !valid {
            return Err(BackendError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        }

        let user = AuthUser { id: user_id, email };
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
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        if exists.is_none() {
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
