//! Persistent key-value storage boundary.
//!
//! Keys follow a namespaced convention: `auth:credentials`,
//! `invoice:{invoice_id}`, `ledger:event:{invoice_id}`.

use thiserror::Error;

mod in_memory;

pub use in_memory::InMemoryKvStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KvError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Minimal key-value contract the durable stores are built on.
///
/// Implementations must be `Send + Sync`; the orchestrators share one store
/// across the credential, invoice and ledger namespaces.
pub trait KeyValueStore: Send + Sync {
    /// Get the value for a key. Returns `None` if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;

    /// Set a key-value pair, replacing any existing value.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), KvError>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), KvError>;

    /// Scan all keys matching a prefix. Returns pairs sorted by key.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KvError>;
}
