use super::DerivativeService;
use crate::models::ObjectLocator;
use crate::services::storage::StorageResult;
use std::path::Path;
use tracing::debug;

impl DerivativeService {
    /// Downloads the source object into `destination`.
    pub(super) async fn fetch_source(
        &self,
        locator: &ObjectLocator,
        destination: &Path,
    ) -> StorageResult<()> {
        let bytes = self
            .storage
            .download_to_file(&locator.key(), destination)
            .await?;
        debug!("Fetched {} ({} bytes)", locator, bytes);
        Ok(())
    }
}
