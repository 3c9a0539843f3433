//! Upload tracker integration tests over the in-process backend.
//!
//! Run with: `cargo test -p nagrik-client --test upload_flow_test`

mod helpers;

use bytes::Bytes;
use futures::StreamExt;

use helpers::signed_in_user;
use nagrik_backend::{DocumentStore, FileStore, MemoryBackend};
use nagrik_client::{SelectedFile, UploadState, UploadTracker};
use nagrik_core::models::ProcessingStatus;

fn ration_card() -> SelectedFile {
    SelectedFile {
        file_name: "ration-card.jpg".to_string(),
        content_type: "image/jpeg".to_string(),
        data: Bytes::from_static(b"\xff\xd8\xff"),
    }
}

#[tokio::test]
async fn test_upload_end_to_end() {
    let backend = MemoryBackend::new();
    let user = signed_in_user(&backend, "asha@example.org").await;

    let mut tracker = UploadTracker::new(
        user.id,
        "ration",
        "documents",
        backend.clone(),
        backend.clone(),
    )
    .unwrap();

    tracker.select_file(Some(ration_card()));
    let document_id = tracker.upload().await.unwrap();
    assert_eq!(tracker.state(), UploadState::Complete);

    // The record exists, references the stored blob, and starts pending.
    let documents = backend.list_for_owner(user.id).await.unwrap();
    assert_eq!(documents.len(), 1);
    let document = &documents[0];
    assert_eq!(document.id, document_id);
    assert_eq!(document.status, ProcessingStatus::Pending);
    assert!(document.storage_path.starts_with("ration/"));
    assert!(document.storage_path.ends_with(".jpg"));
    assert!(backend
        .exists(&document.storage_bucket, &document.storage_path)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_processing_status_flows_into_tracker() {
    let backend = MemoryBackend::new();
    let user = signed_in_user(&backend, "asha@example.org").await;

    let mut tracker = UploadTracker::new(
        user.id,
        "identity",
        "documents",
        backend.clone(),
        backend.clone(),
    )
    .unwrap();
    tracker.select_file(Some(ration_card()));
    let document_id = tracker.upload().await.unwrap();

    let mut status_events = backend.subscribe_status().await.unwrap();

    // The OCR collaborator reports progress; the tracker follows it.
    backend
        .set_document_status(document_id, ProcessingStatus::Processing)
        .await
        .unwrap();
    let event = status_events.next().await.unwrap().unwrap();
    tracker.note_remote_status(&event);
    assert_eq!(tracker.state(), UploadState::Processing);

    backend
        .set_document_status(document_id, ProcessingStatus::Complete)
        .await
        .unwrap();
    let event = status_events.next().await.unwrap().unwrap();
    tracker.note_remote_status(&event);
    assert_eq!(tracker.state(), UploadState::Complete);

    let documents = backend.list_for_owner(user.id).await.unwrap();
    assert_eq!(documents[0].status, ProcessingStatus::Complete);
}

#[tokio::test]
async fn test_two_trackers_do_not_interfere() {
    let backend = MemoryBackend::new();
    let user = signed_in_user(&backend, "asha@example.org").await;

    let mut identity = UploadTracker::new(
        user.id,
        "identity",
        "documents",
        backend.clone(),
        backend.clone(),
    )
    .unwrap();
    let mut income = UploadTracker::new(
        user.id,
        "income",
        "documents",
        backend.clone(),
        backend.clone(),
    )
    .unwrap();

    identity.select_file(Some(ration_card()));
    let identity_id = identity.upload().await.unwrap();
    assert_eq!(income.state(), UploadState::Idle);

    income.select_file(Some(ration_card()));
    let income_id = income.upload().await.unwrap();
    assert_ne!(identity_id, income_id);

    let documents = backend.list_for_owner(user.id).await.unwrap();
    assert_eq!(documents.len(), 2);
}
