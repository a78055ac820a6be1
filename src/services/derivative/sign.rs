use super::DerivativeService;
use crate::models::{ObjectLocator, SignedUrl};
use crate::services::storage::{StorageError, StorageResult};
use chrono::Utc;
use std::time::Duration;

impl DerivativeService {
    /// Issues a read-only URL for `locator` that expires after `expiry`.
    pub(super) async fn sign(
        &self,
        locator: &ObjectLocator,
        expiry: Duration,
    ) -> StorageResult<SignedUrl> {
        let key = locator.key();
        let issued_at = Utc::now();
        let lifetime = chrono::Duration::from_std(expiry).map_err(|e| StorageError::Signing {
            key: key.clone(),
            reason: format!("expiry out of range: {}", e),
        })?;

        let url = self.storage.presign_get(&key, expiry).await?;

        let expires_at = issued_at + lifetime;
        if expires_at <= Utc::now() {
            return Err(StorageError::Signing {
                key,
                reason: "signed URL would already be expired".to_string(),
            });
        }

        Ok(SignedUrl { url, expires_at })
    }
}
