//! Nagrik Backend Library
//!
//! This crate renders the hosted backend-as-a-service the application
//! depends on as a set of capability traits, plus two implementations:
//! an in-process one (tests, demos) and a Postgres one behind the
//! `postgres` feature (sqlx pool for records, LISTEN/NOTIFY for the
//! realtime change feeds, local filesystem for file bytes).
//!
//! # Storage path format
//!
//! Document uploads derive a fresh `{document_type}/{uuid}.{ext}` path per
//! attempt. Paths must not contain `..` or a leading `/`. Derivation is
//! centralized in the `keys` module so every caller stays consistent.

pub mod factory;
pub mod keys;
pub mod local;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_backend, Backend};
pub use keys::document_storage_path;
pub use local::LocalFileStore;
pub use memory::MemoryBackend;
#[cfg(feature = "postgres")]
pub use postgres::{PgAuth, PgBackend};
pub use traits::{
    AuthApi, BackendError, BackendResult, DocumentStore, EventStream, FileStore, MessageStore,
    MessageSubscription, ProfileStore, StatusSubscription,
};
