use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Raw query parameters as they arrive on the wire.
///
/// Everything is optional text so that missing and malformed values can be
/// reported with the service's own error body instead of an extractor rejection.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransformQuery {
    /// Object path of the source image inside the configured bucket
    pub filename: Option<String>,
    /// Output quality in percent (1-100, default 10)
    pub quality: Option<String>,
    /// Output size in percent, aspect ratio is not preserved (default 100)
    pub scale: Option<String>,
}

/// A validated derivative request.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct TransformRequest {
    #[validate(length(min = 1, max = 1024, message = "Object path must be between 1 and 1024 bytes"))]
    pub source_path: String,
    #[validate(range(min = 1, max = 100, message = "Quality must be between 1 and 100"))]
    pub quality: u32,
    #[validate(range(min = 1, message = "Scale must be positive"))]
    pub scale: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectLocator {
    pub bucket: String,
    /// Parent "directory" of the object, empty for top-level objects
    pub directory: String,
    pub name: String,
}

impl ObjectLocator {
    /// Object key within the bucket.
    pub fn key(&self) -> String {
        if self.directory.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.directory, self.name)
        }
    }
}

impl fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key())
    }
}

/// Locator of a derivative. Same bucket and directory as its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivativePath(pub(crate) ObjectLocator);

impl Deref for DerivativePath {
    type Target = ObjectLocator;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for DerivativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// What a successful pipeline run hands back to the dispatcher.
#[derive(Debug, Clone)]
pub struct DerivativeOutcome {
    pub request_id: String,
    pub derivative_key: String,
    pub derivative: SignedUrl,
    /// Only populated when source signing is enabled; never sent to the caller.
    pub source: Option<SignedUrl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Validating,
    Resolving,
    Fetching,
    Transforming,
    Uploading,
    Signing,
    CleaningUp,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Validating => "validating",
            PipelineStage::Resolving => "resolving",
            PipelineStage::Fetching => "fetching",
            PipelineStage::Transforming => "transforming",
            PipelineStage::Uploading => "uploading",
            PipelineStage::Signing => "signing",
            PipelineStage::CleaningUp => "cleaning_up",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_key() {
        let nested = ObjectLocator {
            bucket: "b".to_string(),
            directory: "photos/2024".to_string(),
            name: "cat.jpg".to_string(),
        };
        assert_eq!(nested.key(), "photos/2024/cat.jpg");
        assert_eq!(nested.to_string(), "b/photos/2024/cat.jpg");

        let top_level = ObjectLocator {
            bucket: "b".to_string(),
            directory: String::new(),
            name: "cat.jpg".to_string(),
        };
        assert_eq!(top_level.key(), "cat.jpg");
    }

    #[test]
    fn test_request_validation() {
        let ok = TransformRequest {
            source_path: "a/b.png".to_string(),
            quality: 50,
            scale: 50,
        };
        assert!(ok.validate().is_ok());

        let bad_quality = TransformRequest {
            quality: 101,
            ..ok.clone()
        };
        assert!(bad_quality.validate().is_err());

        let zero_scale = TransformRequest { scale: 0, ..ok };
        assert!(zero_scale.validate().is_err());
    }
}
