//! HTTP surface: routing, input validation and outcome-to-status mapping.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::json;
use std::sync::OnceLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;

use crate::config::parse_bool;
use crate::error::ApiError;
use crate::guard::{BucketService, CreateOutcome, DeleteOutcome, ListOutcome, UploadOutcome};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const UPLOAD_FIELD: &str = "file";

/// A bucket name that satisfies `^[a-z][a-z0-9-]*$` and is 3 to 63 bytes long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketName(String);

impl BucketName {
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^[a-z][a-z0-9-]*$").expect("bucket name pattern is valid")
        });

        if raw.len() < 3 {
            return Err(ApiError::Validation(
                "bucket_name: must be at least 3 characters".to_string(),
            ));
        }
        if raw.len() > 63 {
            return Err(ApiError::Validation(
                "bucket_name: must be at most 63 characters".to_string(),
            ));
        }
        if !pattern.is_match(raw) {
            return Err(ApiError::Validation(
                "bucket_name: must match ^[a-z][a-z0-9-]*$".to_string(),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBucketRequest {
    #[serde(alias = "bucketName")]
    pub bucket_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListObjectsQuery {
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub recursive: bool,
}

/// Accepts `true`/`false` along with `1`/`0`, `yes`/`no` and `on`/`off`.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_bool("recursive", &raw).map_err(serde::de::Error::custom)
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::Validation(e.body_text())
    }
}

pub fn create_router(service: BucketService, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/buckets", get(list_buckets).post(create_bucket))
        .route("/buckets/:bucket_name", delete(delete_bucket))
        .route(
            "/buckets/:bucket_name/objects",
            get(list_objects).post(upload_object),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(service)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_buckets(State(service): State<BucketService>) -> Result<Response, ApiError> {
    let buckets = service.bucket_names().await?;
    Ok((StatusCode::OK, Json(json!({ "buckets": buckets }))).into_response())
}

async fn create_bucket(
    State(service): State<BucketService>,
    body: Result<Json<CreateBucketRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    let name = BucketName::parse(&request.bucket_name)?;

    match service.create_bucket(name.as_str()).await? {
        CreateOutcome::Created(_) => Ok((
            StatusCode::CREATED,
            Json(json!({ "message": "Bucket created" })),
        )
            .into_response()),
        CreateOutcome::AlreadyExists => Err(ApiError::Conflict),
    }
}

async fn delete_bucket(
    State(service): State<BucketService>,
    Path(bucket_name): Path<String>,
) -> Result<Response, ApiError> {
    let name = BucketName::parse(&bucket_name)?;

    match service.delete_bucket(name.as_str()).await? {
        DeleteOutcome::Deleted(_) => Ok((
            StatusCode::OK,
            Json(json!({ "message": "Bucket deleted" })),
        )
            .into_response()),
        DeleteOutcome::NotFound => Err(ApiError::NotFound),
    }
}

async fn list_objects(
    State(service): State<BucketService>,
    Path(bucket_name): Path<String>,
    query: Result<Query<ListObjectsQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let name = BucketName::parse(&bucket_name)?;
    let Query(query) = query.map_err(|e| ApiError::Validation(e.body_text()))?;

    match service.list_objects(name.as_str(), query.recursive).await? {
        ListOutcome::Listed(objects) => {
            Ok((StatusCode::OK, Json(json!({ "objects": objects }))).into_response())
        }
        ListOutcome::NotFound => Err(ApiError::NotFound),
    }
}

async fn upload_object(
    State(service): State<BucketService>,
    Path(bucket_name): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let name = BucketName::parse(&bucket_name)?;
    let mut multipart = multipart.map_err(|e| ApiError::Validation(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }

        let object_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::Validation("file: missing filename".to_string()))?;
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        let length = data.len() as u64;

        return match service
            .upload_object(name.as_str(), &object_name, data, length, &content_type)
            .await?
        {
            UploadOutcome::Uploaded(_) => Ok((
                StatusCode::CREATED,
                Json(json!({ "message": "Object uploaded successfully" })),
            )
                .into_response()),
            UploadOutcome::NotFound => Err(ApiError::NotFound),
        };
    }

    Err(ApiError::Validation("file: field required".to_string()))
}
