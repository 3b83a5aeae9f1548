//! Existence checks in front of every bucket-scoped operation.
//!
//! Each guarded call re-reads the bucket list from the backend and only then
//! invokes the primitive. Nothing is held between the read and the call, so a
//! concurrent client can still create or remove the bucket in that window;
//! the backend remains the authority on conflicts.

use bytes::Bytes;
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::storage::StorageGateway;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(String),
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(String),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOutcome {
    Listed(Vec<String>),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded(String),
    NotFound,
}

#[derive(Clone)]
pub struct BucketService {
    gateway: Arc<dyn StorageGateway>,
}

impl BucketService {
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Self {
        Self { gateway }
    }

    pub async fn bucket_names(&self) -> Result<Vec<String>, StorageError> {
        let buckets = self.gateway.list_buckets().await?;
        Ok(buckets.into_iter().map(|b| b.name).collect())
    }

    async fn bucket_exists(&self, name: &str) -> Result<bool, StorageError> {
        let exists = self.bucket_names().await?.iter().any(|n| n == name);
        debug!("Bucket {} exists: {}", name, exists);
        Ok(exists)
    }

    pub async fn create_bucket(&self, name: &str) -> Result<CreateOutcome, StorageError> {
        if self.bucket_exists(name).await? {
            return Ok(CreateOutcome::AlreadyExists);
        }
        self.gateway.create_bucket(name).await?;
        info!("Created bucket {}", name);
        Ok(CreateOutcome::Created(name.to_string()))
    }

    pub async fn delete_bucket(&self, name: &str) -> Result<DeleteOutcome, StorageError> {
        if !self.bucket_exists(name).await? {
            return Ok(DeleteOutcome::NotFound);
        }
        self.gateway.delete_bucket(name).await?;
        info!("Deleted bucket {}", name);
        Ok(DeleteOutcome::Deleted(name.to_string()))
    }

    pub async fn list_objects(
        &self,
        bucket: &str,
        recursive: bool,
    ) -> Result<ListOutcome, StorageError> {
        if !self.bucket_exists(bucket).await? {
            return Ok(ListOutcome::NotFound);
        }
        let names: Vec<String> = self
            .gateway
            .list_objects(bucket, recursive)
            .try_collect()
            .await?;
        Ok(ListOutcome::Listed(names))
    }

    pub async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        payload: Bytes,
        length: u64,
        content_type: &str,
    ) -> Result<UploadOutcome, StorageError> {
        if !self.bucket_exists(bucket).await? {
            return Ok(UploadOutcome::NotFound);
        }
        self.gateway
            .upload_object(bucket, key, payload, length, content_type)
            .await?;
        info!("Uploaded {}/{} ({} bytes, {})", bucket, key, length, content_type);
        Ok(UploadOutcome::Uploaded(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryGateway;
    use std::sync::atomic::Ordering;

    fn service(gateway: &Arc<MemoryGateway>) -> BucketService {
        BucketService::new(gateway.clone())
    }

    #[tokio::test]
    async fn test_create_missing_bucket() {
        let gateway = Arc::new(MemoryGateway::default());
        let svc = service(&gateway);

        let outcome = svc.create_bucket("photos").await.unwrap();
        assert_eq!(outcome, CreateOutcome::Created("photos".to_string()));
        assert!(svc.bucket_names().await.unwrap().contains(&"photos".to_string()));
    }

    #[tokio::test]
    async fn test_create_existing_bucket_skips_backend() {
        let gateway = Arc::new(MemoryGateway::with_buckets(&["photos"]));
        let svc = service(&gateway);

        let outcome = svc.create_bucket("photos").await.unwrap();
        assert_eq!(outcome, CreateOutcome::AlreadyExists);
        assert_eq!(gateway.creates.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.mutations(), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_bucket_skips_backend() {
        let gateway = Arc::new(MemoryGateway::with_buckets(&["other"]));
        let svc = service(&gateway);

        let outcome = svc.delete_bucket("photos").await.unwrap();
        assert_eq!(outcome, DeleteOutcome::NotFound);
        assert_eq!(gateway.deletes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let gateway = Arc::new(MemoryGateway::with_buckets(&["photos"]));
        let svc = service(&gateway);

        assert_eq!(
            svc.delete_bucket("photos").await.unwrap(),
            DeleteOutcome::Deleted("photos".to_string())
        );
        assert_eq!(svc.delete_bucket("photos").await.unwrap(), DeleteOutcome::NotFound);
        assert_eq!(gateway.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upload_then_list() {
        let gateway = Arc::new(MemoryGateway::with_buckets(&["b"]));
        let svc = service(&gateway);
        let payload = Bytes::from_static(b"hello");

        let outcome = svc
            .upload_object("b", "k", payload.clone(), payload.len() as u64, "text/plain")
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::Uploaded("k".to_string()));

        match svc.list_objects("b", false).await.unwrap() {
            ListOutcome::Listed(names) => assert!(names.contains(&"k".to_string())),
            other => panic!("unexpected outcome: {:?}", other),
        }
        let stored = gateway.object("b", "k").unwrap();
        assert_eq!(stored.data, payload);
        assert_eq!(stored.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_upload_to_missing_bucket() {
        let gateway = Arc::new(MemoryGateway::default());
        let svc = service(&gateway);

        let outcome = svc
            .upload_object("b", "k", Bytes::from_static(b"x"), 1, "text/plain")
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::NotFound);
        assert_eq!(gateway.uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_list_missing_bucket() {
        let gateway = Arc::new(MemoryGateway::default());
        let svc = service(&gateway);

        assert_eq!(svc.list_objects("b", true).await.unwrap(), ListOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_recursive_and_flat_listing() {
        let gateway = Arc::new(MemoryGateway::with_buckets(&["b"]));
        gateway.put("b", "dir/a", b"1");
        gateway.put("b", "dir/b", b"2");
        gateway.put("b", "c", b"3");
        let svc = service(&gateway);

        let flat = svc.list_objects("b", false).await.unwrap();
        assert_eq!(
            flat,
            ListOutcome::Listed(vec!["dir/".to_string(), "c".to_string()])
        );

        let ListOutcome::Listed(mut all) = svc.list_objects("b", true).await.unwrap() else {
            panic!("bucket should exist");
        };
        all.sort();
        assert_eq!(all, vec!["c", "dir/a", "dir/b"]);
    }

    #[tokio::test]
    async fn test_empty_bucket_lists_nothing() {
        let gateway = Arc::new(MemoryGateway::with_buckets(&["b"]));
        let svc = service(&gateway);

        assert_eq!(
            svc.list_objects("b", false).await.unwrap(),
            ListOutcome::Listed(Vec::new())
        );
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let gateway = Arc::new(MemoryGateway::with_buckets(&["b"]));
        gateway.offline.store(true, Ordering::SeqCst);
        let svc = service(&gateway);

        let err = svc.create_bucket("fresh").await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::BackendUnavailable { operation: "list_buckets", .. }
        ));
        assert_eq!(gateway.mutations(), 0);
    }
}
