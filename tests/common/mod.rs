#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use derivative_service::config::ServiceConfig;
use derivative_service::services::storage::{StorageError, StorageResult, StorageService};
use derivative_service::services::transformer::{TransformError, TransformOutput, Transformer};
use derivative_service::{AppState, create_app};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Default)]
pub struct MockStorageService {
    files: Mutex<HashMap<String, StoredObject>>,
    uploads: Mutex<Vec<String>>,
    pub fail_uploads: bool,
    pub fail_signing: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_uploads() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    pub fn failing_signing() -> Self {
        Self {
            fail_signing: true,
            ..Self::default()
        }
    }

    pub fn with_object(self, key: &str, data: &[u8]) -> Self {
        self.files.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: None,
            },
        );
        self
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(key).map(|o| o.data.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(key)
            .and_then(|o| o.content_type.clone())
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    fn bucket(&self) -> &str {
        "test-bucket"
    }

    async fn download_to_file(&self, key: &str, destination: &Path) -> StorageResult<u64> {
        let data = self
            .object(key)
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })?;
        tokio::fs::write(destination, &data).await?;
        Ok(data.len() as u64)
    }

    async fn upload_from_file(
        &self,
        key: &str,
        source: &Path,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        if self.fail_uploads {
            return Err(StorageError::Transport {
                key: key.to_string(),
                reason: "connection reset by peer".to_string(),
            });
        }
        let data = tokio::fs::read(source).await?;
        self.files.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.map(str::to_string),
            },
        );
        self.uploads.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        if self.fail_signing {
            return Err(StorageError::Signing {
                key: key.to_string(),
                reason: "no signing credentials".to_string(),
            });
        }
        Ok(format!(
            "https://storage.test/test-bucket/{}?X-Amz-Expires={}",
            key,
            expires_in.as_secs()
        ))
    }

    async fn file_exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.files.lock().unwrap().contains_key(key))
    }
}

/// Writes `<input bytes> + "-derived"` to the output path and records every
/// argument list it was given.
#[derive(Default)]
pub struct RecordingTransformer {
    calls: Mutex<Vec<Vec<String>>>,
    pub delay: Option<Duration>,
}

impl RecordingTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transformer for RecordingTransformer {
    async fn run(&self, args: &[OsString]) -> Result<TransformOutput, TransformError> {
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        self.calls.lock().unwrap().push(args.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let input = &args[0];
        let output = &args[args.len() - 1];
        match tokio::fs::read(input).await {
            Ok(mut data) => {
                data.extend_from_slice(b"-derived");
                tokio::fs::write(output, data).await.unwrap();
                Ok(TransformOutput {
                    exit_code: Some(0),
                    stderr: String::new(),
                })
            }
            Err(e) => Ok(TransformOutput {
                exit_code: Some(1),
                stderr: e.to_string(),
            }),
        }
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Always exits non-zero, after writing a partial output file.
pub struct FailingTransformer;

#[async_trait]
impl Transformer for FailingTransformer {
    async fn run(&self, args: &[OsString]) -> Result<TransformOutput, TransformError> {
        if let Some(output) = args.last() {
            tokio::fs::write(output, b"partial").await.unwrap();
        }
        Ok(TransformOutput {
            exit_code: Some(1),
            stderr: "convert: no decode delegate for this image format".to_string(),
        })
    }

    async fn health_check(&self) -> bool {
        false
    }
}

pub fn test_config(scratch_root: &Path) -> ServiceConfig {
    ServiceConfig {
        scratch_dir: scratch_root.to_path_buf(),
        ..ServiceConfig::default()
    }
}

pub fn build_app(
    storage: Arc<MockStorageService>,
    transformer: Arc<dyn Transformer>,
    config: ServiceConfig,
) -> Router {
    create_app(AppState::new(storage, transformer, config))
}

/// Number of entries left under the scratch root (0 when it was never created).
pub fn scratch_entries(root: &Path) -> usize {
    std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0)
}
