use async_trait::async_trait;
use nt_core::{ArticleStore, Error, Result};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

pub mod backends;
pub mod ingest;

pub use backends::*;
pub use ingest::{IngestReport, Ingestor};

pub const DEFAULT_URL: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE: &str = "newsApp";
pub const DEFAULT_COLLECTION: &str = "news";

#[async_trait]
pub trait StorageBackend: ArticleStore + Sized {
    fn get_error_message() -> &'static str;
    async fn connect(config: &BackendConfig) -> Result<Self>;
}

/// Where stored articles live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
    pub database: String,
    pub collection: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

impl BackendConfig {
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    MongoDb,
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "mongodb" | "mongo" => Ok(Self::MongoDb),
            other => Err(Error::Config(format!(
                "Unknown storage backend: {} (expected memory or mongodb)",
                other
            ))),
        }
    }
}

/// Connects the requested backend and checks it answers before handing it out.
pub async fn create_storage(kind: StorageKind, config: &BackendConfig) -> Result<Arc<dyn ArticleStore>> {
    let storage: Arc<dyn ArticleStore> = match kind {
        StorageKind::Memory => Arc::new(open::<MemoryStorage>(config).await?),
        #[cfg(feature = "mongodb")]
        StorageKind::MongoDb => Arc::new(open::<MongoStorage>(config).await?),
        #[cfg(not(feature = "mongodb"))]
        StorageKind::MongoDb => {
            return Err(Error::Config(
                "MongoDB support not compiled in (enable the `mongodb` feature)".to_string(),
            ))
        }
    };
    Ok(storage)
}

async fn open<T: StorageBackend>(config: &BackendConfig) -> Result<T> {
    let storage = T::connect(config).await?;
    storage
        .ping()
        .await
        .map_err(|e| Error::Store(format!("{} ({})", e.detail(), T::get_error_message())))?;
    info!(
        backend = std::any::type_name::<T>().rsplit("::").next().unwrap_or("unknown"),
        database = %config.database,
        collection = %config.collection,
        "Storage backend ready"
    );
    Ok(storage)
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, BackendConfig, Ingestor, StorageBackend, StorageKind};
}
