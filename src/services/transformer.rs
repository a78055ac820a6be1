use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error};

/// Posterize level passed on every run.
pub const POSTERIZE_LEVELS: u32 = 100;

/// Result of one raster tool run.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl TransformOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Failed to launch raster tool '{binary}': {source}")]
    Launch {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Raster tool exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Raster tool timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Malformed transform arguments: {0}")]
    InvalidArguments(String),
}

/// The external raster engine. Implementations receive the complete ordered
/// argument list and report the exit code and captured stderr.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn run(&self, args: &[OsString]) -> Result<TransformOutput, TransformError>;

    /// Check if the transformer is available/healthy
    async fn health_check(&self) -> bool;
}

/// Runs ImageMagick's `convert` (or a compatible binary) as a child process.
pub struct ImageMagickTransformer {
    binary: PathBuf,
    timeout: Duration,
}

impl ImageMagickTransformer {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn launch_error(&self, source: std::io::Error) -> TransformError {
        TransformError::Launch {
            binary: self.binary.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl Transformer for ImageMagickTransformer {
    async fn run(&self, args: &[OsString]) -> Result<TransformOutput, TransformError> {
        debug!("Running {} {:?}", self.binary.display(), args);

        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.launch_error(e))?;

        // Dropping the wait future on timeout kills the child via kill_on_drop
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| TransformError::TimedOut(self.timeout))?
            .map_err(|e| self.launch_error(e))?;

        Ok(TransformOutput {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn health_check(&self) -> bool {
        let probe = Command::new(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        matches!(
            tokio::time::timeout(Duration::from_secs(5), probe).await,
            Ok(Ok(status)) if status.success()
        )
    }
}

/// Copies the input to the output unchanged. For development without ImageMagick.
pub struct PassthroughTransformer;

#[async_trait]
impl Transformer for PassthroughTransformer {
    async fn run(&self, args: &[OsString]) -> Result<TransformOutput, TransformError> {
        tracing::warn!("PassthroughTransformer: copying source unchanged (development mode)");
        let (input, output) = match (args.first(), args.last()) {
            (Some(input), Some(output)) if args.len() >= 2 => (input, output),
            _ => {
                return Err(TransformError::InvalidArguments(
                    "expected input and output paths".to_string(),
                ));
            }
        };

        match tokio::fs::copy(input, output).await {
            Ok(_) => Ok(TransformOutput {
                exit_code: Some(0),
                stderr: String::new(),
            }),
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

/// Factory function to create the transformer named in the config
pub fn create_transformer(
    transformer_type: &str,
    binary: &Path,
    timeout: Duration,
) -> Box<dyn Transformer> {
    match transformer_type.to_lowercase().as_str() {
        "imagemagick" | "convert" => Box::new(ImageMagickTransformer::new(binary, timeout)),
        "passthrough" | "noop" => Box::new(PassthroughTransformer),
        _ => {
            tracing::warn!(
                "Unknown transformer type '{}', using ImageMagick",
                transformer_type
            );
            Box::new(ImageMagickTransformer::new(binary, timeout))
        }
    }
}

/// The fixed, ordered argument list for one derivative:
/// `<in> -quality <q> -scale <s>% -dither none -posterize 100 -strip <out>`
pub fn convert_args(input: &Path, output: &Path, quality: u32, scale: u32) -> Vec<OsString> {
    vec![
        input.as_os_str().to_owned(),
        "-quality".into(),
        quality.to_string().into(),
        "-scale".into(),
        format!("{}%", scale).into(),
        "-dither".into(),
        "none".into(),
        "-posterize".into(),
        POSTERIZE_LEVELS.to_string().into(),
        "-strip".into(),
        output.as_os_str().to_owned(),
    ]
}

/// Produces `local_derivative` from `local_source`. The exit status is the only
/// success signal; on failure the captured stderr is carried in the error.
pub async fn transform(
    transformer: &dyn Transformer,
    local_source: &Path,
    local_derivative: &Path,
    quality: u32,
    scale: u32,
) -> Result<(), TransformError> {
    let args = convert_args(local_source, local_derivative, quality, scale);
    let output = transformer.run(&args).await?;

    if !output.success() {
        let status = match output.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "termination by signal".to_string(),
        };
        error!("Raster tool failed ({}): {}", status, output.stderr.trim());
        return Err(TransformError::Failed {
            status,
            stderr: output.stderr,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_args_order() {
        let args = convert_args(Path::new("/tmp/in.jpg"), Path::new("/tmp/out"), 10, 100);
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "/tmp/in.jpg",
                "-quality",
                "10",
                "-scale",
                "100%",
                "-dither",
                "none",
                "-posterize",
                "100",
                "-strip",
                "/tmp/out",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let transformer =
            ImageMagickTransformer::new("/nonexistent/raster-tool", Duration::from_secs(5));
        let err = transformer.run(&[]).await.unwrap_err();
        assert!(matches!(err, TransformError::Launch { .. }));
        assert!(!transformer.health_check().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_transform_failure() {
        let transformer = ImageMagickTransformer::new("false", Duration::from_secs(5));
        let err = transform(&transformer, Path::new("in"), Path::new("out"), 10, 100)
            .await
            .unwrap_err();
        match err {
            TransformError::Failed { status, .. } => assert_eq!(status, "exit code 1"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let transformer = ImageMagickTransformer::new("true", Duration::from_secs(5));
        transform(&transformer, Path::new("in"), Path::new("out"), 10, 100)
            .await
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_child() {
        let transformer = ImageMagickTransformer::new("sleep", Duration::from_millis(100));
        let err = transformer.run(&["5".into()]).await.unwrap_err();
        assert!(matches!(err, TransformError::TimedOut(_)));
    }

    #[tokio::test]
    async fn test_passthrough_copies_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("in.png_modified");
        tokio::fs::write(&input, b"pixels").await.unwrap();

        transform(&PassthroughTransformer, &input, &output, 10, 100)
            .await
            .unwrap();
        assert_eq!(tokio::fs::read(&output).await.unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn test_passthrough_missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = transform(
            &PassthroughTransformer,
            &dir.path().join("missing.png"),
            &dir.path().join("out"),
            10,
            100,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransformError::Failed { .. }));
    }

    #[tokio::test]
    async fn test_create_transformer() {
        let transformer = create_transformer("passthrough", Path::new("convert"), Duration::from_secs(1));
        assert!(transformer.health_check().await);
    }
}
