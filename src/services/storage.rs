use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Maximum presigned URL lifetime accepted by S3 (7 days).
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Storage request for '{key}' failed: {reason}")]
    Transport { key: String, reason: String },

    #[error("Failed to sign URL for '{key}': {reason}")]
    Signing { key: String, reason: String },

    #[error("Local file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// The blob store as seen by the pipeline: get, put, sign.
#[async_trait]
pub trait StorageService: Send + Sync {
    fn bucket(&self) -> &str;

    /// Streams an object into a local file. Returns the number of bytes written.
    ///
    /// Returns `StorageError::NotFound` if the object doesn't exist. On any
    /// failure the destination file must not be treated as complete.
    async fn download_to_file(&self, key: &str, destination: &Path) -> StorageResult<u64>;

    /// Uploads a local file, replacing any object already stored under `key`.
    async fn upload_from_file(
        &self,
        key: &str,
        source: &Path,
        content_type: Option<&str>,
    ) -> StorageResult<()>;

    /// Read-only URL for `key`, valid for `expires_in`.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    async fn file_exists(&self, key: &str) -> StorageResult<bool>;
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn download_to_file(&self, key: &str, destination: &Path) -> StorageResult<u64> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        let output = match res {
            Ok(output) => output,
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    return Err(StorageError::NotFound {
                        key: key.to_string(),
                    });
                }
                return Err(StorageError::Transport {
                    key: key.to_string(),
                    reason: service_error.to_string(),
                });
            }
        };

        let mut file = tokio::fs::File::create(destination).await?;
        let mut body = output.body.into_async_read();
        let written = match tokio::io::copy(&mut body, &mut file).await {
            Ok(n) => n,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(destination).await;
                return Err(StorageError::Transport {
                    key: key.to_string(),
                    reason: format!("body stream interrupted: {}", e),
                });
            }
        };
        file.flush().await?;
        file.sync_all().await?;

        Ok(written)
    }

    async fn upload_from_file(
        &self,
        key: &str,
        source: &Path,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| StorageError::Transport {
                key: key.to_string(),
                reason: format!("failed to open {}: {}", source.display(), e),
            })?;

        let res = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .body(body)
            .send()
            .await;

        if let Err(e) = res {
            tracing::error!(
                "S3 put_object failed: bucket={}, key={}, error={:?}",
                self.bucket,
                key,
                e
            );
            return Err(StorageError::Transport {
                key: key.to_string(),
                reason: e.into_service_error().to_string(),
            });
        }
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        validate_expiry(expires_in).map_err(|reason| StorageError::Signing {
            key: key.to_string(),
            reason,
        })?;

        let presigning_config =
            PresigningConfig::expires_in(expires_in).map_err(|e| StorageError::Signing {
                key: key.to_string(),
                reason: format!("Failed to create presigning config: {}", e),
            })?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| StorageError::Signing {
                key: key.to_string(),
                reason: format!("Failed to generate presigned GET URL: {}", e),
            })?;

        Ok(presigned.uri().to_string())
    }

    async fn file_exists(&self, key: &str) -> StorageResult<bool> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::Transport {
                        key: key.to_string(),
                        reason: service_error.to_string(),
                    })
                }
            }
        }
    }
}

/// Validate presigned URL expiry duration.
pub fn validate_expiry(expires_in: Duration) -> Result<(), String> {
    if expires_in > MAX_PRESIGN_EXPIRY {
        Err(format!(
            "Expiry duration {:?} exceeds maximum allowed {:?}",
            expires_in, MAX_PRESIGN_EXPIRY
        ))
    } else if expires_in.is_zero() {
        Err("Expiry duration must be greater than zero".to_string())
    } else {
        Ok(())
    }
}

/// Best-effort content type from the object's extension.
pub fn content_type_for(name: &str) -> Option<String> {
    mime_guess::from_path(name).first().map(|m| m.to_string())
}
