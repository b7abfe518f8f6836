use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::StoreConfig;

pub mod memory;
pub mod spanner;

pub use memory::MemoryStore;
pub use spanner::SpannerStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stored value for '{key}' is malformed: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value backend holding codes, the claimed counter and claim records
///
/// Point reads, blind writes and key listing by prefix. There is no
/// compare-and-swap and no multi-key transaction.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Last write wins.
    async fn put(&self, key: &str, value: String) -> StoreResult<()>;

    /// Keys starting with `prefix`, in ascending key order.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

pub type SharedStore = Arc<dyn KvStore>;

/// Build the backend selected by configuration
pub async fn connect(config: &StoreConfig) -> anyhow::Result<SharedStore> {
    match config {
        StoreConfig::Memory => {
            tracing::warn!("Using in-memory store; codes and claims are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreConfig::Spanner(spanner) => Ok(Arc::new(SpannerStore::from_config(spanner).await?)),
    }
}
