use crate::models::{DerivativePath, ObjectLocator};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Hands out per-request staging directories under a common root.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

/// Local files staged for one pipeline run.
///
/// The directory name is random, so concurrent runs on the same source never
/// share files. Call [`ScratchSet::release`] when done; dropping the set also
/// removes the directory, which covers panics and cancelled requests.
#[derive(Debug)]
pub struct ScratchSet {
    dir: Option<TempDir>,
    local_dir: PathBuf,
    local_source_file: PathBuf,
    local_derivative_file: PathBuf,
}

impl ScratchSpace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn acquire(
        &self,
        request_id: &str,
        source: &ObjectLocator,
        derivative: &DerivativePath,
    ) -> io::Result<ScratchSet> {
        tokio::fs::create_dir_all(&self.root).await?;

        let root = self.root.clone();
        let prefix = format!("req-{}-", sanitize(request_id));
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(&prefix).tempdir_in(root)
        })
        .await
        .map_err(io::Error::other)??;

        let local_dir = dir.path().to_path_buf();
        let set = ScratchSet {
            local_source_file: local_dir.join(&source.name),
            local_derivative_file: local_dir.join(&derivative.name),
            local_dir,
            dir: Some(dir),
        };
        debug!("Acquired scratch directory {}", set.local_dir.display());
        Ok(set)
    }
}

impl ScratchSet {
    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    pub fn local_source_file(&self) -> &Path {
        &self.local_source_file
    }

    pub fn local_derivative_file(&self) -> &Path {
        &self.local_derivative_file
    }

    /// Deletes both staged files and the directory. Missing files are fine.
    pub async fn release(mut self) -> io::Result<()> {
        remove_if_exists(&self.local_source_file).await?;
        remove_if_exists(&self.local_derivative_file).await?;

        match tokio::fs::remove_dir_all(&self.local_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        // Already gone from disk; the guard's own cleanup is a no-op now.
        self.dir.take();
        debug!("Released scratch directory {}", self.local_dir.display());
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Request ids may come from clients; keep only filename-safe characters.
fn sanitize(request_id: &str) -> String {
    request_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .take(40)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::paths::resolve;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_acquire_creates_directory_and_paths() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path().join("nested/scratch"));
        let (source, derivative) = resolve("b", "photos/cat.jpg", "_modified");

        let set = scratch.acquire("req-1", &source, &derivative).await.unwrap();
        assert!(set.local_dir().is_dir());
        assert!(set.local_dir().starts_with(scratch.root()));
        assert_eq!(set.local_source_file().file_name().unwrap(), "cat.jpg");
        assert_eq!(
            set.local_derivative_file().file_name().unwrap(),
            "cat.jpg_modified"
        );

        set.release().await.unwrap();
        assert_eq!(entries(scratch.root()), 0);
    }

    #[tokio::test]
    async fn test_same_source_gets_distinct_directories() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path());
        let (source, derivative) = resolve("b", "photos/cat.jpg", "_modified");

        let first = scratch.acquire("same-id", &source, &derivative).await.unwrap();
        let second = scratch.acquire("same-id", &source, &derivative).await.unwrap();
        assert_ne!(first.local_dir(), second.local_dir());
        assert_ne!(first.local_source_file(), second.local_source_file());

        first.release().await.unwrap();
        assert!(second.local_dir().is_dir());
        second.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_release_removes_staged_files() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path());
        let (source, derivative) = resolve("b", "a/b.png", "_modified");

        let set = scratch.acquire("req", &source, &derivative).await.unwrap();
        tokio::fs::write(set.local_source_file(), b"source").await.unwrap();
        tokio::fs::write(set.local_derivative_file(), b"derivative")
            .await
            .unwrap();

        set.release().await.unwrap();
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_release_tolerates_missing_files() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path());
        let (source, derivative) = resolve("b", "a/b.png", "_modified");

        // Only the source was fetched before the failure
        let set = scratch.acquire("req", &source, &derivative).await.unwrap();
        tokio::fs::write(set.local_source_file(), b"source").await.unwrap();
        set.release().await.unwrap();

        // Directory removed out from under us
        let set = scratch.acquire("req", &source, &derivative).await.unwrap();
        std::fs::remove_dir_all(set.local_dir()).unwrap();
        set.release().await.unwrap();

        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_drop_without_release_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path());
        let (source, derivative) = resolve("b", "a/b.png", "_modified");

        let set = scratch.acquire("req", &source, &derivative).await.unwrap();
        tokio::fs::write(set.local_source_file(), b"source").await.unwrap();
        drop(set);

        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn test_sanitize_request_id() {
        assert_eq!(sanitize("abc-123"), "abc-123");
        assert_eq!(sanitize("../../etc"), "etc");
        assert_eq!(sanitize(&"x".repeat(100)).len(), 40);
    }
}
