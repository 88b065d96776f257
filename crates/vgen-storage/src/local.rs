//! Local filesystem store for downloaded and exported videos.

use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Output and input roots on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStore {
    output_root: PathBuf,
    input_root: Option<PathBuf>,
}

impl LocalStore {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            input_root: None,
        }
    }

    pub fn with_input_root(mut self, input_root: impl Into<PathBuf>) -> Self {
        self.input_root = Some(input_root.into());
        self
    }

    /// Directory new files are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_root
    }

    pub fn input_dir(&self) -> Option<&Path> {
        self.input_root.as_deref()
    }

    /// Write `bytes` to `path` and return where they actually landed.
    ///
    /// Relative paths are placed under the output root and may not climb out
    /// of it with `..`. If the target already
    /// exists, `_<unix-timestamp>` is appended to the file stem. Only one
    /// alternative is tried; a second collision overwrites it.
    ///
    /// ```
    /// # tokio_test::block_on(async {
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = vgen_storage::LocalStore::new(dir.path());
    ///
    /// let first = store.write(b"one", "clips/result.mp4").await.unwrap();
    /// assert_eq!(first, dir.path().join("clips/result.mp4"));
    ///
    /// let second = store.write(b"two", "clips/result.mp4").await.unwrap();
    /// assert_ne!(second, first);
    /// assert_eq!(std::fs::read(&first).unwrap(), b"one");
    /// # });
    /// ```
    pub async fn write(&self, bytes: &[u8], path: impl AsRef<Path>) -> StorageResult<PathBuf> {
        let requested = self.under_output(path.as_ref())?;

        if let Some(parent) = requested.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::create_dir(parent, e))?;
        }

        let target = if fs::try_exists(&requested).await.unwrap_or(false) {
            let alternative = timestamped(&requested, chrono::Utc::now().timestamp())?;
            debug!(
                requested = %requested.display(),
                target = %alternative.display(),
                "Output exists, writing to timestamped name"
            );
            alternative
        } else {
            requested
        };

        fs::write(&target, bytes)
            .await
            .map_err(|e| StorageError::write_failed(&target, e))?;

        info!(path = %target.display(), bytes = bytes.len(), "Wrote file");
        Ok(target)
    }

    /// Resolve an input path: as given if it exists, else under the input root.
    pub fn resolve_input(&self, path: impl AsRef<Path>) -> Option<PathBuf> {
        let path = path.as_ref();
        if path.exists() {
            return Some(path.to_path_buf());
        }

        let candidate = self.input_root.as_ref()?.join(path);
        candidate.exists().then_some(candidate)
    }

    fn under_output(&self, path: &Path) -> StorageResult<PathBuf> {
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(StorageError::invalid_path(format!(
                "{} leaves the output directory",
                path.display()
            )));
        }
        Ok(self.output_root.join(path))
    }
}

/// `dir/stem.ext` becomes `dir/stem_<ts>.ext`.
fn timestamped(path: &Path, timestamp: i64) -> StorageResult<PathBuf> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| StorageError::invalid_path(path.display().to_string()))?;

    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_{}.{}", stem, timestamp, ext),
        None => format!("{}_{}", stem, timestamp),
    };

    Ok(path.with_file_name(name))
}
