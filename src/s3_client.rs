use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
    Client as S3Client,
};
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, error};

use crate::config::{StorageConfig, DEFAULT_REGION};
use crate::error::StorageError;
use crate::storage::{Bucket, ObjectNames, StorageGateway};

const DELIMITER: &str = "/";

/// [`StorageGateway`] backed by an S3-compatible service such as MinIO.
pub struct S3Storage {
    client: S3Client,
    region: String,
}

impl S3Storage {
    pub async fn new(config: StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key,
            config.secret_key,
            None,
            None,
            "bucket-gateway",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.endpoint)
            .credentials_provider(credentials)
            .load()
            .await;

        // MinIO serves buckets on the path, not as virtual hosts.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            client: S3Client::from_conf(s3_config),
            region: config.region,
        }
    }
}

fn backend_error<E>(operation: &'static str, err: E) -> StorageError
where
    E: std::error::Error,
{
    let message = DisplayErrorContext(err).to_string();
    error!("S3 {} failed: {}", operation, message);
    StorageError::backend(operation, message)
}

#[async_trait]
impl StorageGateway for S3Storage {
    async fn list_buckets(&self) -> Result<Vec<Bucket>, StorageError> {
        debug!("Listing buckets");

        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| backend_error("list_buckets", e))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name())
            .map(|name| Bucket {
                name: name.to_string(),
            })
            .collect())
    }

    async fn create_bucket(&self, name: &str) -> Result<(), StorageError> {
        debug!("Creating bucket: {}", name);

        let mut request = self.client.create_bucket().bucket(name);
        if self.region != DEFAULT_REGION {
            let constraint = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build();
            request = request.create_bucket_configuration(constraint);
        }

        request
            .send()
            .await
            .map_err(|e| backend_error("create_bucket", e))?;
        Ok(())
    }

    async fn delete_bucket(&self, name: &str) -> Result<(), StorageError> {
        debug!("Deleting bucket: {}", name);

        self.client
            .delete_bucket()
            .bucket(name)
            .send()
            .await
            .map_err(|e| backend_error("delete_bucket", e))?;
        Ok(())
    }

    fn list_objects<'a>(&'a self, bucket: &'a str, recursive: bool) -> ObjectNames<'a> {
        debug!("Listing objects in {} (recursive: {})", bucket, recursive);

        // State is the next page to fetch: `Some(None)` is the first page,
        // `None` means the listing is exhausted.
        let pages = stream::try_unfold(Some(None::<String>), move |state| async move {
            let Some(continuation_token) = state else {
                return Ok(None);
            };

            let mut request = self.client.list_objects_v2().bucket(bucket);
            if !recursive {
                request = request.delimiter(DELIMITER);
            }
            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let output = request
                .send()
                .await
                .map_err(|e| backend_error("list_objects", e))?;

            let mut names: Vec<String> = output
                .common_prefixes()
                .iter()
                .filter_map(|p| p.prefix())
                .map(str::to_string)
                .collect();
            names.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|o| o.key())
                    .map(str::to_string),
            );

            let next = output.next_continuation_token().map(|t| Some(t.to_string()));
            Ok::<_, StorageError>(Some((names, next)))
        });

        pages
            .map_ok(|names| stream::iter(names.into_iter().map(Ok::<_, StorageError>)))
            .try_flatten()
            .boxed()
    }

    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        payload: Bytes,
        length: u64,
        content_type: &str,
    ) -> Result<(), StorageError> {
        debug!("Putting object: {}/{} ({} bytes)", bucket, key, length);

        let content_length = i64::try_from(length)
            .map_err(|_| StorageError::backend("upload_object", "payload too large"))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(content_length)
            .content_type(content_type)
            .body(ByteStream::from(payload))
            .send()
            .await
            .map_err(|e| backend_error("upload_object", e))?;
        Ok(())
    }
}
