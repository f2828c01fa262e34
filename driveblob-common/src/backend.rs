use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::error::StorageError;

/// Trait implemented by all name-keyed blob storage backends.
///
/// A ref is an opaque caller-chosen name that identifies exactly one logical
/// object. Backends map refs onto whatever addressing scheme they use
/// natively; callers see only the ref.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Return the full contents stored under `reference`.
    async fn download(&self, reference: &str) -> Result<Bytes, StorageError>;

    /// Store `contents` under `reference`, replacing any existing object.
    async fn put(&self, reference: &str, contents: Bytes) -> Result<(), StorageError>;

    /// Remove the object stored under `reference`. Deleting a ref that does
    /// not exist succeeds.
    async fn delete(&self, reference: &str) -> Result<(), StorageError>;

    /// Base URL that, followed by a ref, serves the object directly.
    fn link_base(&self) -> Result<String, StorageError>;
}

/// Compute the content-derived ref for `data`: lowercase hex SHA-256.
pub fn content_ref(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
