use std::sync::Arc;

use nagrik_core::{AppConfig, BackendKind};

use crate::memory::MemoryBackend;
use crate::traits::{AuthApi, BackendError, BackendResult, DocumentStore, FileStore, MessageStore, ProfileStore};

/// The assembled capability set handed to the shell. Components take the
/// individual `Arc<dyn …>` capabilities, never this bundle, so any one of
/// them can be swapped for a double.
#[derive(Clone)]
pub struct Backend {
    pub files: Arc<dyn FileStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub messages: Arc<dyn MessageStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub auth: Arc<dyn AuthApi>,
}

/// Build a backend from configuration.
pub async fn create_backend(config: &AppConfig) -> BackendResult<Backend> {
    match config.backend {
        BackendKind::Memory => {
            let backend = MemoryBackend::new();
            // No stored session to recover in a fresh in-process backend.
            backend.resolve_session();
            Ok(Backend {
                files: backend.clone(),
                documents: backend.clone(),
                messages: backend.clone(),
                profiles: backend.clone(),
                auth: backend,
            })
        }

        #[cfg(feature = "postgres")]
        BackendKind::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                BackendError::Config("DATABASE_URL not configured".to_string())
            })?;
            let pg = crate::postgres::PgBackend::connect(url).await?;
            pg.run_migrations().await?;

            let files = crate::local::LocalFileStore::new(config.storage_root.clone()).await?;
            let auth = crate::postgres::PgAuth::new(pg.pool().clone());

            Ok(Backend {
                files: Arc::new(files),
                documents: Arc::new(pg.clone()),
                messages: Arc::new(pg.clone()),
                profiles: Arc::new(pg),
                auth: Arc::new(auth),
            })
        }

        #[cfg(not(feature = "postgres"))]
        BackendKind::Postgres => Err(BackendError::Config(
            "Postgres backend not available (postgres feature not enabled)".to_string(),
        )),
    }
}
