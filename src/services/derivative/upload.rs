use super::DerivativeService;
use crate::models::{DerivativePath, ObjectLocator};
use crate::services::storage::{StorageResult, content_type_for};
use std::path::Path;

impl DerivativeService {
    /// Uploads the staged derivative, overwriting any previous one at the same path.
    ///
    /// The derivative's own name carries the suffix after the extension, so the
    /// content type is taken from the source name.
    pub(super) async fn upload_derivative(
        &self,
        local_derivative: &Path,
        source: &ObjectLocator,
        derivative: &DerivativePath,
    ) -> StorageResult<()> {
        let content_type = content_type_for(&source.name);
        self.storage
            .upload_from_file(&derivative.key(), local_derivative, content_type.as_deref())
            .await
    }
}
