use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Server-side processing status of an uploaded document.
///
/// Transitions are monotonic: `Pending` → `Processing` → `Complete` or
/// `Error`. A retry uploads a fresh file and creates a fresh record rather
/// than rewinding an existing one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Complete,
    Error,
}

impl ProcessingStatus {
    /// Terminal statuses never transition again without a new upload attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Complete | ProcessingStatus::Error)
    }
}

impl Display for ProcessingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProcessingStatus::Pending => write!(f, "pending"),
            ProcessingStatus::Processing => write!(f, "processing"),
            ProcessingStatus::Complete => write!(f, "complete"),
            ProcessingStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for ProcessingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "complete" => Ok(ProcessingStatus::Complete),
            "error" => Ok(ProcessingStatus::Error),
            _ => Err(anyhow::anyhow!("Invalid processing status: {}", s)),
        }
    }
}

/// A document record as stored by the backend.
///
/// The storage path is write-once per upload attempt; the status field is
/// owned by the out-of-process OCR collaborator after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub document_type: String,
    pub storage_bucket: String,
    pub storage_path: String,
    pub status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields the client supplies when creating a document record.
/// The backend assigns id, status (`pending`) and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub owner_id: Uuid,
    pub document_type: String,
    pub storage_bucket: String,
    pub storage_path: String,
}

/// A status change reported by the processing collaborator, delivered over
/// the document status subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStatusEvent {
    pub document_id: Uuid,
    pub status: ProcessingStatus,
}
