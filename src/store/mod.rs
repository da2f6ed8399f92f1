//! Blob store abstraction for durable artifact and snapshot storage.
//!
//! The pipeline treats object storage as an opaque collaborator with
//! `put`/`get`/`delete`/`list_prefix` over flat string keys. Backends are
//! constructor-injected wherever they are used, so tests substitute
//! [`MemoryBlobStore`] for the filesystem-backed [`FsBlobStore`].
//!
//! # Atomicity contract
//!
//! `put` must be all-or-nothing: a crash mid-put must never leave a partial
//! object visible under the key. The filesystem backend honors this by
//! writing to a temporary path in the target directory and renaming into
//! place; the in-memory backend is trivially atomic.

mod fs;

pub use fs::FsBlobStore;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// Errors surfaced by blob store operations.
///
/// All backend failures collapse into this single kind; callers only ever
/// distinguish "the key does not exist" from "the operation failed".
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested key does not exist in the store.
    #[error("blob not found: {key}")]
    NotFound {
        /// The missing key.
        key: String,
    },

    /// Filesystem-level failure.
    #[error("storage IO error for {key}: {source}")]
    Io {
        /// The key being accessed when the error occurred.
        key: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Any other backend failure.
    #[error("storage backend error for {key}: {message}")]
    Backend {
        /// The key being accessed when the error occurred.
        key: String,
        /// Human-readable backend error text.
        message: String,
    },
}

impl StorageError {
    /// Creates a not-found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates an IO error.
    pub fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }

    /// Creates a backend error.
    pub fn backend(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Returns true when this error means the key does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Object-safe contract for durable blob storage.
///
/// Keys are flat strings; `/` separators are allowed and the filesystem
/// backend maps them to directories.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `key`, replacing any existing object.
    ///
    /// Must be atomic: either the full object becomes visible under `key`
    /// or the previous state is preserved.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the write fails.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Retrieves the object stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] when the key does not exist, or
    /// another [`StorageError`] when the read fails.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Deletes the object stored under `key`. Deleting a missing key is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the delete fails.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Lists all keys starting with `prefix`, in ascending key order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the listing fails.
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// In-memory blob store for tests and dry runs.
///
/// Trivially atomic; safe to share across tasks via `Arc`.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: DashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true when the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Returns true when an object exists under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.objects.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.remove(key);
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
