//! Document upload tracker.
//!
//! Drives one document from file selection through upload, record creation
//! and server-side processing into a terminal state. The tracker owns its
//! state exclusively; the backend is injected as capabilities so tests can
//! substitute failing doubles.
//!
//! State machine: idle → uploading → {complete | error}. `Processing` is
//! entered only when the out-of-process OCR collaborator reports an
//! intermediate status through the document status subscription.

use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use nagrik_backend::{keys, BackendError, DocumentStore, FileStore};
use nagrik_core::models::{DocumentStatusEvent, NewDocument, ProcessingStatus};
use nagrik_core::{validate_document_type, ValidationError};

/// Local, ephemeral upload state. Destroyed with the tracker; choosing a
/// new file resets it to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Uploading,
    Processing,
    Complete,
    Error,
}

/// A file picked by the user, not yet uploaded.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Upload failures. `Storage` and `Record` both collapse to
/// [`UploadState::Error`] publicly, but stay distinct here and in the logs.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file selected")]
    NoFileSelected,

    #[error("An upload is already in flight")]
    UploadInFlight,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("File storage failed: {0}")]
    Storage(#[source] BackendError),

    #[error("Record creation failed: {0}")]
    Record(#[source] BackendError),
}

pub struct UploadTracker {
    owner_id: Uuid,
    document_type: String,
    bucket: String,
    files: Arc<dyn FileStore>,
    documents: Arc<dyn DocumentStore>,
    selected: Option<SelectedFile>,
    state: UploadState,
    uploaded_document: Option<Uuid>,
}

impl UploadTracker {
    pub fn new(
        owner_id: Uuid,
        document_type: impl Into<String>,
        bucket: impl Into<String>,
        files: Arc<dyn FileStore>,
        documents: Arc<dyn DocumentStore>,
    ) -> Result<Self, UploadError> {
        let document_type = document_type.into();
        validate_document_type(&document_type)?;
        Ok(Self {
            owner_id,
            document_type,
            bucket: bucket.into(),
            files,
            documents,
            selected: None,
            state: UploadState::Idle,
            uploaded_document: None,
        })
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    /// Identifier of the record created by the last successful upload.
    pub fn document_id(&self) -> Option<Uuid> {
        self.uploaded_document
    }

    /// Store a pending file reference and reset to `Idle`. A dismissed
    /// picker hands over nothing; that leaves the tracker untouched.
    pub fn select_file(&mut self, file: Option<SelectedFile>) {
        if let Some(file) = file {
            self.selected = Some(file);
            self.state = UploadState::Idle;
            self.uploaded_document = None;
        }
    }

    /// Upload the selected file and create its document record.
    ///
    /// Returns the new record's identifier on success. Rejected without
    /// side effects while an earlier call is still in flight.
    pub async fn upload(&mut self) -> Result<Uuid, UploadError> {
        if self.state == UploadState::Uploading {
            return Err(UploadError::UploadInFlight);
        }
        let file = self.selected.clone().ok_or(UploadError::NoFileSelected)?;

        self.state = UploadState::Uploading;
        self.uploaded_document = None;

        // Fresh path per attempt; a retry never reuses an earlier one.
        let storage_path = keys::document_storage_path(&self.document_type, &file.file_name);

        if let Err(e) = self
            .files
            .store(&self.bucket, &storage_path, &file.content_type, file.data)
            .await
        {
            tracing::error!(
                stage = "storage",
                document_type = %self.document_type,
                storage_path = %storage_path,
                error = %e,
                "Upload failed"
            );
            self.state = UploadState::Error;
            return Err(UploadError::Storage(e));
        }

        let created = self
            .documents
            .create(NewDocument {
                owner_id: self.owner_id,
                document_type: self.document_type.clone(),
                storage_bucket: self.bucket.clone(),
                storage_path: storage_path.clone(),
            })
            .await;

        let document = match created {
            Ok(document) => document,
            Err(e) => {
                tracing::error!(
                    stage = "record",
                    document_type = %self.document_type,
                    storage_path = %storage_path,
                    error = %e,
                    "Upload failed"
                );
                // The blob alone must not outlive a failed attempt.
                if let Err(cleanup) = self.files.delete(&self.bucket, &storage_path).await {
                    tracing::warn!(
                        storage_path = %storage_path,
                        error = %cleanup,
                        "Orphaned blob cleanup failed"
                    );
                }
                self.state = UploadState::Error;
                return Err(UploadError::Record(e));
            }
        };

        tracing::info!(
            document_id = %document.id,
            document_type = %self.document_type,
            "Document uploaded"
        );
        self.state = UploadState::Complete;
        self.uploaded_document = Some(document.id);
        Ok(document.id)
    }

    /// Fold a status change reported by the processing collaborator into
    /// the tracker. Events for other documents are ignored, and a terminal
    /// `Error` is never left.
    pub fn note_remote_status(&mut self, event: &DocumentStatusEvent) {
        let Some(document_id) = self.uploaded_document else {
            return;
        };
        if event.document_id != document_id || self.state == UploadState::Error {
            return;
        }
        match event.status {
            ProcessingStatus::Pending => {}
            ProcessingStatus::Processing => self.state = UploadState::Processing,
            ProcessingStatus::Complete => self.state = UploadState::Complete,
            ProcessingStatus::Error => self.state = UploadState::Error,
        }
    }
}
