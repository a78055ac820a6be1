use crate::models::{DerivativePath, ObjectLocator};

/// Splits an object path into its parent directory and leaf name.
///
/// Total over any input; callers reject malformed paths before getting here.
pub fn split_path(bucket: &str, path: &str) -> ObjectLocator {
    let (directory, name) = match path.rsplit_once('/') {
        Some((directory, name)) => (directory, name),
        None => ("", path),
    };

    ObjectLocator {
        bucket: bucket.to_string(),
        directory: directory.to_string(),
        name: name.to_string(),
    }
}

/// Resolves the source locator and the derivative locator for `source_path`.
///
/// The derivative lives next to its source, named `<leaf><suffix>`.
pub fn resolve(bucket: &str, source_path: &str, suffix: &str) -> (ObjectLocator, DerivativePath) {
    let source = split_path(bucket, source_path);
    let derivative = DerivativePath(ObjectLocator {
        bucket: source.bucket.clone(),
        directory: source.directory.clone(),
        name: format!("{}{}", source.name, suffix),
    });
    (source, derivative)
}
