use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub name: String,
}

pub type ObjectNames<'a> = BoxStream<'a, Result<String, StorageError>>;

/// Primitive operations against the object-storage backend.
///
/// Implementations perform no validation and no retries; any failure is
/// returned as [`StorageError::BackendUnavailable`].
#[async_trait]
pub trait StorageGateway: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<Bucket>, StorageError>;
    async fn create_bucket(&self, name: &str) -> Result<(), StorageError>;
    async fn delete_bucket(&self, name: &str) -> Result<(), StorageError>;

    /// Lazily lists object names. Without `recursive`, keys below a `/` are
    /// folded into their first-level prefix (`"dir/"`).
    fn list_objects<'a>(&'a self, bucket: &'a str, recursive: bool) -> ObjectNames<'a>;

    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        payload: Bytes,
        length: u64,
        content_type: &str,
    ) -> Result<(), StorageError>;
}
