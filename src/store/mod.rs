//! Key-value store backends.
//!
//! The registry treats its directory as an external collaborator behind
//! the [`KeyValueStore`] trait:
//! - `etcd`: the production backend, one key per advertised service
//! - `memory`: in-process map for local development and tests

pub mod etcd;
pub mod memory;

use async_trait::async_trait;

pub use etcd::EtcdStore;
pub use memory::MemoryStore;

/// 存储层错误类型
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The request did not complete within its deadline. Transient: the
    /// retrying client will back off and try again.
    #[error("Store request timed out")]
    Timeout,
    /// The key does not exist. Deletes of absent keys surface this so the
    /// caller can decide whether it matters.
    #[error("Key not found: {0}")]
    NotFound(String),
    /// Any other backend failure. Terminal: retrying would not help.
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Timeout)
    }
}

/// A remote hierarchical key-value directory.
///
/// Every call maps to one network request; the per-attempt deadline and
/// the retry policy live in the [`RegistryClient`](crate::RegistryClient),
/// not here.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Create or overwrite a key.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Remove a key. Returns [`StoreError::NotFound`] when it was absent.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// All keys under a prefix with their values, ordered by key.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError>;
}
