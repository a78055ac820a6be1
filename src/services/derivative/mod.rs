use crate::config::ServiceConfig;
use crate::models::{DerivativeOutcome, DerivativePath, ObjectLocator, PipelineStage, TransformRequest};
use crate::services::paths;
use crate::services::scratch::{ScratchSet, ScratchSpace};
use crate::services::storage::{StorageError, StorageService};
use crate::services::transformer::{self, TransformError, Transformer};
use std::sync::Arc;
use thiserror::Error;
use tracing::{Instrument, info, info_span, warn};

pub mod fetch;
pub mod sign;
pub mod upload;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Source object not found: {key}")]
    SourceNotFound { key: String },

    #[error("Storage failure while {stage}: {source}")]
    Storage {
        stage: PipelineStage,
        #[source]
        source: StorageError,
    },

    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Scratch space unavailable: {0}")]
    Scratch(#[source] std::io::Error),
}

impl PipelineError {
    fn storage(stage: PipelineStage, source: StorageError) -> Self {
        match source {
            StorageError::NotFound { key } => PipelineError::SourceNotFound { key },
            source => PipelineError::Storage { stage, source },
        }
    }
}

/// Runs fetch → transform → upload → sign for one request, with the scratch
/// directory released on every exit path.
pub struct DerivativeService {
    storage: Arc<dyn StorageService>,
    transformer: Arc<dyn Transformer>,
    scratch: ScratchSpace,
    config: ServiceConfig,
}

impl DerivativeService {
    pub fn new(
        storage: Arc<dyn StorageService>,
        transformer: Arc<dyn Transformer>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            storage,
            transformer,
            scratch: ScratchSpace::new(config.scratch_dir.clone()),
            config,
        }
    }

    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    pub async fn create_derivative(
        &self,
        request: &TransformRequest,
        request_id: &str,
    ) -> Result<DerivativeOutcome, PipelineError> {
        let span = info_span!(
            "derivative",
            request_id = %request_id,
            source = %request.source_path,
            quality = request.quality,
            scale = request.scale,
        );
        self.run(request, request_id).instrument(span).await
    }

    async fn run(
        &self,
        request: &TransformRequest,
        request_id: &str,
    ) -> Result<DerivativeOutcome, PipelineError> {
        info!(stage = %PipelineStage::Resolving, "Resolving derivative path");
        let (source, derivative) = paths::resolve(
            self.storage.bucket(),
            &request.source_path,
            &self.config.derivative_suffix,
        );

        let scratch = self
            .scratch
            .acquire(request_id, &source, &derivative)
            .await
            .map_err(PipelineError::Scratch)?;

        let result = self
            .run_stages(request, request_id, &source, &derivative, &scratch)
            .await;

        info!(stage = %PipelineStage::CleaningUp, "Releasing scratch space");
        if let Err(e) = scratch.release().await {
            // The outcome stands; a leftover directory is only logged
            warn!("Failed to release scratch directory: {}", e);
        }

        match &result {
            Ok(outcome) => info!("Derivative ready at {}", outcome.derivative_key),
            Err(e) => warn!("Derivative pipeline failed: {}", e),
        }
        result
    }

    async fn run_stages(
        &self,
        request: &TransformRequest,
        request_id: &str,
        source: &ObjectLocator,
        derivative: &DerivativePath,
        scratch: &ScratchSet,
    ) -> Result<DerivativeOutcome, PipelineError> {
        info!(stage = %PipelineStage::Fetching, "Fetching {}", source);
        self.fetch_source(source, scratch.local_source_file())
            .await
            .map_err(|e| PipelineError::storage(PipelineStage::Fetching, e))?;

        info!(stage = %PipelineStage::Transforming, "Transforming {}", source.name);
        transformer::transform(
            self.transformer.as_ref(),
            scratch.local_source_file(),
            scratch.local_derivative_file(),
            request.quality,
            request.scale,
        )
        .await?;

        info!(stage = %PipelineStage::Uploading, "Uploading {}", derivative);
        self.upload_derivative(scratch.local_derivative_file(), source, derivative)
            .await
            .map_err(|e| PipelineError::storage(PipelineStage::Uploading, e))?;

        info!(stage = %PipelineStage::Signing, "Signing {}", derivative);
        let derivative_url = self
            .sign(derivative, self.config.signing_expiry)
            .await
            .map_err(|e| PipelineError::storage(PipelineStage::Signing, e))?;

        let source_url = if self.config.sign_source_url {
            Some(
                self.sign(source, self.config.signing_expiry)
                    .await
                    .map_err(|e| PipelineError::storage(PipelineStage::Signing, e))?,
            )
        } else {
            None
        };

        Ok(DerivativeOutcome {
            request_id: request_id.to_string(),
            derivative_key: derivative.key(),
            derivative: derivative_url,
            source: source_url,
        })
    }
}
