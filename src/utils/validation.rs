use crate::config::ServiceConfig;
use crate::models::{TransformQuery, TransformRequest};
use thiserror::Error;
use validator::Validate;

/// S3 limits keys to 1024 bytes of UTF-8
pub const MAX_OBJECT_PATH_LEN: usize = 1024;

pub const MAX_QUALITY: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestValidationError {
    #[error("File parameter not specified")]
    MissingFilename,

    #[error("Invalid object path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Parameter '{field}' must be a positive integer, got '{value}'")]
    NotAnInteger { field: &'static str, value: String },

    #[error("Parameter '{field}' must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Turns raw query parameters into a [`TransformRequest`], applying defaults
/// and bounds from the service configuration.
pub fn parse_transform_request(
    query: &TransformQuery,
    config: &ServiceConfig,
) -> Result<TransformRequest, RequestValidationError> {
    let source_path = match query.filename.as_deref() {
        Some(name) if !name.is_empty() => name,
        _ => return Err(RequestValidationError::MissingFilename),
    };
    validate_object_path(source_path)?;

    let quality = parse_percent("quality", query.quality.as_deref(), config.default_quality)?;
    let scale = parse_percent("scale", query.scale.as_deref(), config.default_scale)?;

    if quality > MAX_QUALITY {
        return Err(RequestValidationError::OutOfRange {
            field: "quality",
            value: quality,
            min: 1,
            max: MAX_QUALITY,
        });
    }
    if scale > config.max_scale_percent {
        return Err(RequestValidationError::OutOfRange {
            field: "scale",
            value: scale,
            min: 1,
            max: config.max_scale_percent,
        });
    }

    let request = TransformRequest {
        source_path: source_path.to_string(),
        quality,
        scale,
    };
    request
        .validate()
        .map_err(|e| RequestValidationError::Invalid(e.to_string()))?;

    Ok(request)
}

/// Accepts relative, slash-separated object paths with a non-empty leaf.
///
/// `.`/`..` and empty segments are rejected rather than normalized away, so the
/// key that is fetched is always exactly the key the caller named.
pub fn validate_object_path(path: &str) -> Result<(), RequestValidationError> {
    let invalid = |reason| {
        Err(RequestValidationError::InvalidPath {
            path: path.to_string(),
            reason,
        })
    };

    if path.trim().is_empty() {
        return invalid("path is blank");
    }
    if path.len() > MAX_OBJECT_PATH_LEN {
        return invalid("path exceeds 1024 bytes");
    }
    if path.starts_with('/') {
        return invalid("path must be relative to the bucket");
    }
    if path.ends_with('/') {
        return invalid("path must name an object, not a directory");
    }
    if path.chars().any(|c| c.is_control()) {
        return invalid("path contains control characters");
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return invalid("path contains empty, '.' or '..' segments");
    }

    Ok(())
}

fn parse_percent(
    field: &'static str,
    raw: Option<&str>,
    default: u32,
) -> Result<u32, RequestValidationError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(default),
        Some(raw) => raw,
    };

    let value: u32 = raw
        .parse()
        .map_err(|_| RequestValidationError::NotAnInteger {
            field,
            value: raw.to_string(),
        })?;

    if value == 0 {
        return Err(RequestValidationError::NotAnInteger {
            field,
            value: raw.to_string(),
        });
    }

    Ok(value)
}
