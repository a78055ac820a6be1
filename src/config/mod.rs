use crate::services::storage::validate_expiry;
use crate::utils::validation::MAX_QUALITY;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the derivative pipeline
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bucket holding both source images and their derivatives (default: "your_bucket")
    pub bucket_name: String,

    /// Lifetime of issued signed URLs (default: 7 days)
    pub signing_expiry: Duration,

    /// Appended to the source name to form the derivative name (default: "_modified")
    pub derivative_suffix: String,

    /// Raster tool executable (default: "convert")
    pub transform_binary: PathBuf,

    /// Transformer implementation: "imagemagick" or "passthrough" (default: "imagemagick")
    pub transformer_type: String,

    /// Maximum wall time for one transform run (default: 120 s)
    pub transform_timeout: Duration,

    /// Root under which per-request scratch directories are created
    pub scratch_dir: PathBuf,

    /// Also sign the source object after a successful run (default: false)
    pub sign_source_url: bool,

    /// Quality used when the caller omits it (default: 10)
    pub default_quality: u32,

    /// Scale used when the caller omits it (default: 100)
    pub default_scale: u32,

    /// Upper bound for the scale percentage (default: 1000)
    pub max_scale_percent: u32,

    pub s3: S3Config,
}

/// Connection settings for the S3-compatible store
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    /// Custom endpoint (MinIO, GCS interop). Uses the AWS default chain when unset.
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub force_path_style: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bucket_name: "your_bucket".to_string(),
            signing_expiry: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
            derivative_suffix: "_modified".to_string(),
            transform_binary: PathBuf::from("convert"),
            transformer_type: "imagemagick".to_string(),
            transform_timeout: Duration::from_secs(120),
            scratch_dir: env::temp_dir().join("derivative-scratch"),
            sign_source_url: false,
            default_quality: 10,
            default_scale: 100,
            max_scale_percent: 1000,
            s3: S3Config {
                region: "us-east-1".to_string(),
                ..S3Config::default()
            },
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source. Unparseable or unusable
    /// values fall back to their defaults.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();

        let max_scale_percent = var("MAX_SCALE_PERCENT")
            .and_then(|v| v.parse().ok())
            .filter(|s| *s > 0)
            .unwrap_or(default.max_scale_percent);

        Self {
            bucket_name: var("BUCKET_NAME")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default.bucket_name),

            // S3 refuses presigned URLs outside (0, 7 days]
            signing_expiry: var("SIGNING_EXPIRY_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .filter(|d| validate_expiry(*d).is_ok())
                .unwrap_or(default.signing_expiry),

            // An empty suffix would make the derivative overwrite its source
            derivative_suffix: var("DERIVATIVE_SUFFIX")
                .filter(|v| !v.is_empty() && !v.contains('/'))
                .unwrap_or(default.derivative_suffix),

            transform_binary: var("TRANSFORM_BINARY")
                .map(PathBuf::from)
                .unwrap_or(default.transform_binary),

            transformer_type: var("TRANSFORMER_TYPE").unwrap_or(default.transformer_type),

            transform_timeout: var("TRANSFORM_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(default.transform_timeout),

            scratch_dir: var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.scratch_dir),

            sign_source_url: var("SIGN_SOURCE_URL")
                .map(|v| parse_flag(&v))
                .unwrap_or(default.sign_source_url),

            default_quality: var("DEFAULT_QUALITY")
                .and_then(|v| v.parse().ok())
                .filter(|q| (1..=MAX_QUALITY).contains(q))
                .unwrap_or(default.default_quality),

            default_scale: var("DEFAULT_SCALE")
                .and_then(|v| v.parse().ok())
                .filter(|s| (1..=max_scale_percent).contains(s))
                .unwrap_or(default.default_scale.min(max_scale_percent)),

            max_scale_percent,

            s3: S3Config {
                endpoint: var("S3_ENDPOINT").filter(|v| !v.is_empty()),
                region: var("S3_REGION").unwrap_or(default.s3.region),
                access_key: var("S3_ACCESS_KEY"),
                secret_key: var("S3_SECRET_KEY"),
                force_path_style: var("S3_FORCE_PATH_STYLE")
                    .map(|v| parse_flag(&v))
                    .unwrap_or(default.s3.force_path_style),
            },
        }
    }

    /// Config for local development: passthrough transformer, short-lived URLs
    pub fn development() -> Self {
        Self {
            transformer_type: "passthrough".to_string(),
            signing_expiry: Duration::from_secs(60 * 60),
            ..Self::default()
        }
    }
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value != "false" && value != "0" && !value.is_empty()
}
