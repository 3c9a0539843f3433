//! Configuration module
//!
//! Environment-driven configuration for the backend capability set and the
//! CLI shell. Everything has a default suitable for the in-memory demo
//! backend; the Postgres backend additionally requires `DATABASE_URL`.

use std::env;
use std::str::FromStr;

const DEFAULT_DOCUMENTS_BUCKET: &str = "documents";
const DEFAULT_STORAGE_ROOT: &str = "./data/files";

/// Which backend implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Postgres,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "postgres" | "postgresql" => Ok(BackendKind::Postgres),
            _ => Err(anyhow::anyhow!("Invalid backend kind: {}", s)),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendKind,
    /// Required when `backend` is `Postgres`.
    pub database_url: Option<String>,
    /// Root directory for the local file store.
    pub storage_root: String,
    /// Bucket documents are uploaded into.
    pub documents_bucket: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let backend = match env::var("NAGRIK_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => BackendKind::Memory,
        };

        let database_url = env::var("DATABASE_URL").ok();
        if backend == BackendKind::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when NAGRIK_BACKEND=postgres");
        }

        Ok(Self {
            backend,
            database_url,
            storage_root: env::var("NAGRIK_STORAGE_ROOT")
                .unwrap_or_else(|_| DEFAULT_STORAGE_ROOT.to_string()),
            documents_bucket: env::var("NAGRIK_DOCUMENTS_BUCKET")
                .unwrap_or_else(|_| DEFAULT_DOCUMENTS_BUCKET.to_string()),
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            database_url: None,
            storage_root: DEFAULT_STORAGE_ROOT.to_string(),
            documents_bucket: DEFAULT_DOCUMENTS_BUCKET.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("memory".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert_eq!(
            "postgres".parse::<BackendKind>().unwrap(),
            BackendKind::Postgres
        );
        assert_eq!(
            "PostgreSQL".parse::<BackendKind>().unwrap(),
            BackendKind::Postgres
        );
        assert!("sqlite".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.documents_bucket, "documents");
        assert!(config.database_url.is_none());
    }
}
