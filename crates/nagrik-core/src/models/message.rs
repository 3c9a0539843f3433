use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat message as stored by the backend. Messages are append-only:
/// never mutated or deleted once inserted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Total ordering key for feed rendering: ascending creation time,
    /// identifier as the tie-break.
    pub fn ordering_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.created_at, self.id)
    }
}

/// Fields the client supplies when inserting a message. The backend assigns
/// id and timestamp, and echoes the row over the insert subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub body: String,
}
