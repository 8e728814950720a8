//! S3-compatible storage backend.
//!
//! This module provides a storage backend implementation for AWS S3 and
//! S3-compatible services. Object metadata is persisted as `x-amz-meta-*`
//! user metadata, which is where provenance tags live.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via [`S3Credentials`] (normally taken
//! from the runtime settings, which read the standard `AWS_*` variables).
//!
//! # Errors
//!
//! SDK errors are classified once, here, by HTTP status: 404 is
//! [`NotFound`](ErrorKind::NotFound), 409/412 is
//! [`Conflict`](ErrorKind::Conflict), 429 and 5xx (and connection failures)
//! are [`Network`](ErrorKind::Network), everything else is fatal.

use crate::models::{Metadata, Object};
use crate::{
    FileInfo, StorageBackend,
    backend::FileInfoStream,
    error::{ErrorKind, Result},
    path_to_key, validate_path,
};
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, http::HttpResponse, retry::RetryConfig},
    error::{DisplayErrorContext, SdkError},
    primitives::{ByteStream, DateTime},
};
use exn::ResultExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// Static credentials for an S3 backend.
#[derive(Debug, Clone)]
pub struct S3Credentials {
    pub key_id: String,
    pub key_secret: String,
    /// Present for temporary (STS / Lambda role) credentials.
    pub session_token: Option<String>,
}

/// S3-compatible storage backend.
///
/// Stores files in an S3 bucket, optionally under a key prefix. All paths are
/// relative to the configured prefix (if any).
///
/// # Examples
///
/// ```no_run
/// use confsync_storage::backend::{S3Backend, S3Credentials};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "s3",
///     "config-bucket",
///     None,
///     "ap-southeast-2",
///     None::<String>,
///     S3Credentials {
///         key_id: "access_key_id".to_string(),
///         key_secret: "secret_access_key".to_string(),
///         session_token: None,
///     },
/// ).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in display/logging)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `credentials` - Access key, secret and optional session token
    pub async fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        credentials: S3Credentials,
    ) -> Result<Self> {
        let prefix = prefix.map(path_to_key).transpose()?;
        let name = name.into();
        let bucket = bucket.into();
        let region = Region::new(region.into());
        let credentials = Credentials::new(
            credentials.key_id,
            credentials.key_secret,
            credentials.session_token,
            None,
            "confsync-config",
        );
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(region)
            // Configure retry policy with exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4));
        // Path-style addressing for S3-compatible services (MinIO, LocalStack)
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url).force_path_style(true);
        }
        let client = Client::from_conf(config_builder.build());
        let rate_limiter = Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS));
        Ok(Self {
            name,
            client,
            bucket,
            prefix,
            rate_limiter,
        })
    }

    /// Construct the full S3 key from a relative path.
    fn full_key(&self, path: &Path) -> Result<String> {
        join_key(self.prefix.as_deref(), path)
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::BackendError("S3 rate limiter closed".to_string()))
    }

    /// Convert AWS DateTime to OffsetDateTime.
    fn parse_datetime(dt: Option<&DateTime>) -> Result<OffsetDateTime> {
        match dt {
            Some(dt) => OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos())
                .or_raise(|| ErrorKind::BackendError("S3 datetime out of range".to_string())),
            None => Ok(OffsetDateTime::now_utc()),
        }
    }

    fn metadata(raw: Option<&HashMap<String, String>>) -> Metadata {
        raw.map(|m| m.iter().map(|(k, v)| (k.to_ascii_lowercase(), v.clone())).collect()).unwrap_or_default()
    }

    /// Translate an SDK error into the storage taxonomy, keeping the SDK
    /// error as the source frame.
    fn raise<T, E>(result: std::result::Result<T, SdkError<E, HttpResponse>>, path: &Path) -> Result<T>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        result.or_else(|err| {
            let kind = match &err {
                SdkError::ServiceError(service) => classify_status(service.raw().status().as_u16(), path, &err),
                SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
                    ErrorKind::Network(DisplayErrorContext(&err).to_string())
                },
                _ => ErrorKind::BackendError(DisplayErrorContext(&err).to_string()),
            };
            Err(err).or_raise(|| kind)
        })
    }

    async fn head(&self, path: &Path) -> Result<FileInfo> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        let output =
            Self::raise(self.client.head_object().bucket(&self.bucket).key(&key).send().await, path)?;
        let size = output.content_length().unwrap_or_default().max(0) as u64;
        let modified = Self::parse_datetime(output.last_modified())?;
        Ok(FileInfo::new(validate_path(path)?, size, modified).with_metadata(Self::metadata(output.metadata())))
    }
}

/// Join an optional key prefix and a relative path into an object key.
fn join_key(prefix: Option<&str>, path: &Path) -> Result<String> {
    let key = path_to_key(path)?;
    Ok(match prefix {
        Some(prefix) => format!("{}/{key}", prefix.trim_end_matches('/')),
        None => key,
    })
}

/// Strip an optional key prefix from an object key to get the relative path.
fn strip_key(prefix: Option<&str>, key: &str) -> Result<PathBuf> {
    let relative = match prefix {
        Some(prefix) => {
            let prefix_normalized = prefix.trim_end_matches('/');
            key.strip_prefix(prefix_normalized).and_then(|s| s.strip_prefix('/')).unwrap_or(key)
        },
        None => key,
    };
    validate_path(relative)
}

fn classify_status(status: u16, path: &Path, err: &dyn std::error::Error) -> ErrorKind {
    match status {
        404 => ErrorKind::NotFound(path.to_path_buf()),
        401 | 403 => ErrorKind::PermissionDenied(path.to_path_buf()),
        409 | 412 => ErrorKind::Conflict(path.to_path_buf()),
        429 | 500..=599 => ErrorKind::Network(format!("HTTP {status}: {}", DisplayErrorContext(err))),
        _ => ErrorKind::BackendError(format!("HTTP {status}: {}", DisplayErrorContext(err))),
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let (validated_prefix, key_prefix) = match prefix {
            Some(p) => match (validate_path(p), self.full_key(p)) {
                (Ok(validated), Ok(key)) => (Some(validated), Some(key)),
                (Err(e), _) | (_, Err(e)) => return Box::pin(futures::stream::once(async { Err(e) })),
            },
            None => (None, self.prefix.clone()),
        };

        Box::pin(stream! {
            let mut continuation: Option<String> = None;
            loop {
                let page = {
                    let _permit = match self.acquire_permit().await {
                        Ok(permit) => permit,
                        Err(e) => { yield Err(e); return; },
                    };
                    let request = self
                        .client
                        .list_objects_v2()
                        .bucket(&self.bucket)
                        .set_prefix(key_prefix.clone())
                        .set_continuation_token(continuation.take());
                    Self::raise(request.send().await, Path::new(key_prefix.as_deref().unwrap_or("/")))
                };
                let page = match page {
                    Ok(page) => page,
                    Err(e) => { yield Err(e); return; },
                };

                for object in page.contents() {
                    let Some(key) = object.key() else { continue };
                    let relative = match strip_key(self.prefix.as_deref(), key) {
                        Ok(relative) => relative,
                        Err(e) => { yield Err(e); continue; },
                    };
                    if let Some(pfx) = &validated_prefix
                        && !relative.starts_with(pfx)
                    {
                        continue;
                    }
                    let size = object.size().unwrap_or_default().max(0) as u64;
                    match Self::parse_datetime(object.last_modified()) {
                        Ok(modified) => yield Ok(FileInfo::new(relative, size, modified)),
                        Err(e) => yield Err(e),
                    }
                }

                match (page.is_truncated(), page.next_continuation_token()) {
                    (Some(true), Some(token)) => continuation = Some(token.to_string()),
                    _ => break,
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        match self.head(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get(&self, path: &Path) -> Result<Object> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        let output = Self::raise(self.client.get_object().bucket(&self.bucket).key(&key).send().await, path)?;
        let modified = Self::parse_datetime(output.last_modified())?;
        let metadata = Self::metadata(output.metadata());
        let data = output
            .body
            .collect()
            .await
            .or_raise(|| ErrorKind::Network(format!("reading body of {key}")))?
            .into_bytes()
            .to_vec();
        let info = FileInfo::new(validate_path(path)?, data.len() as u64, modified).with_metadata(metadata);
        Ok(Object { info, data })
    }

    async fn write(&self, path: &Path, data: &[u8], metadata: &Metadata) -> Result<()> {
        let key = self.full_key(path)?;
        let content_type = match key.to_ascii_lowercase().ends_with(".json") {
            true => "application/json",
            false => "application/octet-stream",
        };
        let _permit = self.acquire_permit().await?;
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .set_metadata(Some(metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect()))
            .body(ByteStream::from(data.to_vec()));
        Self::raise(request.send().await, path)?;
        tracing::debug!(bucket = %self.bucket, key = %key, bytes = data.len(), "Put object");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        // S3 deletes succeed for missing keys; keep the trait's NotFound contract.
        self.head(path).await?;
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        Self::raise(self.client.delete_object().bucket(&self.bucket).key(&key).send().await, path)?;
        tracing::debug!(bucket = %self.bucket, key = %key, "Deleted object");
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let object = self.get(from).await?;
        self.write(to, &object.data, &object.info.metadata).await?;
        if let Err(e) = self.delete(from).await {
            tracing::warn!(from = %from.display(), to = %to.display(), error = ?e, "Copied object but could not remove the original");
        }
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        self.head(path).await
    }
}
