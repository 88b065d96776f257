//! Output file naming for exported videos.
//!
//! Two schemes are supported. With an explicit start counter, files are
//! named `{prefix}_{counter}.{ext}` and the counter advances on every call.
//! Without one, the folder is scanned for `{prefix}_NNNNN_.*` files and the
//! next free number is used as `{prefix}_{counter:05}_.{ext}`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

use crate::error::{StorageError, StorageResult};

/// Naming configuration for one exporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub output_root: PathBuf,
    /// May contain directory components, e.g. `videos/clip`
    pub filename_prefix: String,
    #[serde(default)]
    pub start_counter: Option<u32>,
    /// Absolute, or relative to `output_root`
    #[serde(default)]
    pub subfolder: Option<String>,
}

impl OutputConfig {
    pub fn new(output_root: impl Into<PathBuf>, filename_prefix: impl Into<String>) -> Self {
        Self {
            output_root: output_root.into(),
            filename_prefix: filename_prefix.into(),
            start_counter: None,
            subfolder: None,
        }
    }

    pub fn with_start_counter(mut self, counter: u32) -> Self {
        self.start_counter = Some(counter);
        self
    }

    pub fn with_subfolder(mut self, subfolder: impl Into<String>) -> Self {
        self.subfolder = Some(subfolder.into());
        self
    }
}

/// Hands out output paths for one exporter instance.
#[derive(Debug, Clone)]
pub struct OutputNamer {
    folder: PathBuf,
    prefix: String,
    next_counter: Option<u32>,
}

impl OutputNamer {
    /// Resolve and create the target folder.
    ///
    /// A subfolder that cannot be created falls back to the output root.
    pub async fn prepare(config: OutputConfig) -> StorageResult<Self> {
        let base = match config.subfolder.as_deref().map(str::trim) {
            Some(sub) if !sub.is_empty() => {
                let sub = Path::new(sub);
                let folder = if sub.is_absolute() {
                    sub.to_path_buf()
                } else {
                    config.output_root.join(sub)
                };
                match fs::create_dir_all(&folder).await {
                    Ok(()) => folder,
                    Err(e) => {
                        warn!(
                            subfolder = %folder.display(),
                            error = %e,
                            "Cannot create subfolder, using output root"
                        );
                        config.output_root.clone()
                    }
                }
            }
            _ => config.output_root.clone(),
        };

        // Directory components of the prefix become part of the folder.
        let prefix_path = Path::new(&config.filename_prefix);
        let (folder, prefix) = match (prefix_path.parent(), prefix_path.file_name()) {
            (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
                (base.join(parent), name.to_string_lossy().to_string())
            }
            _ => (base, config.filename_prefix.clone()),
        };

        fs::create_dir_all(&folder)
            .await
            .map_err(|e| StorageError::create_dir(&folder, e))?;

        Ok(Self {
            folder,
            prefix,
            next_counter: config.start_counter,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Path for the next file with extension `ext`.
    pub async fn next_path(&mut self, ext: &str) -> StorageResult<PathBuf> {
        let name = match self.next_counter {
            Some(current) => {
                self.next_counter = Some(current.saturating_add(1));
                if self.prefix.is_empty() {
                    format!("{}.{}", current, ext)
                } else {
                    format!("{}_{}.{}", self.prefix, current, ext)
                }
            }
            None => {
                let counter = self.scan_counter().await? + 1;
                format!("{}{:05}_.{}", self.stem_prefix(), counter, ext)
            }
        };

        Ok(self.folder.join(name))
    }

    fn stem_prefix(&self) -> String {
        if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}_", self.prefix)
        }
    }

    /// Highest counter among existing `{prefix}_NNNNN_*` files, 0 if none.
    async fn scan_counter(&self) -> StorageResult<u32> {
        let stem_prefix = self.stem_prefix();
        let mut highest = 0;

        let mut entries = fs::read_dir(&self.folder).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(counter) = parse_counter(name, &stem_prefix) {
                highest = highest.max(counter);
            }
        }

        Ok(highest)
    }
}

fn parse_counter(file_name: &str, stem_prefix: &str) -> Option<u32> {
    let rest = file_name.strip_prefix(stem_prefix)?;
    let (digits, _) = rest.split_once('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_counter() {
        assert_eq!(parse_counter("clip_00007_.mp4", "clip_"), Some(7));
        assert_eq!(parse_counter("clip_12.mp4", "clip_"), None);
        assert_eq!(parse_counter("other_00001_.mp4", "clip_"), None);
        assert_eq!(parse_counter("clip_abc_.mp4", "clip_"), None);
    }

    #[tokio::test]
    async fn test_scanned_counter_continues_after_existing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip_00003_.mp4"), b"").unwrap();
        std::fs::write(dir.path().join("clip_00001_.gif"), b"").unwrap();

        let mut namer = OutputNamer::prepare(OutputConfig::new(dir.path(), "clip"))
            .await
            .unwrap();
        assert_eq!(
            namer.next_path("mp4").await.unwrap(),
            dir.path().join("clip_00004_.mp4")
        );
    }

    #[tokio::test]
    async fn test_start_counter_increments() {
        let dir = tempfile::tempdir().unwrap();
        let config = OutputConfig::new(dir.path(), "shot").with_start_counter(9);
        let mut namer = OutputNamer::prepare(config).await.unwrap();

        assert_eq!(namer.next_path("mp4").await.unwrap(), dir.path().join("shot_9.mp4"));
        assert_eq!(namer.next_path("mp4").await.unwrap(), dir.path().join("shot_10.mp4"));

        let config = OutputConfig::new(dir.path(), "").with_start_counter(1);
        let mut namer = OutputNamer::prepare(config).await.unwrap();
        assert_eq!(namer.next_path("gif").await.unwrap(), dir.path().join("1.gif"));
    }

    #[tokio::test]
    async fn test_subfolder_and_prefix_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let config = OutputConfig::new(dir.path(), "videos/take").with_subfolder("day1");
        let mut namer = OutputNamer::prepare(config).await.unwrap();

        assert_eq!(namer.folder(), dir.path().join("day1/videos"));
        assert!(namer.folder().is_dir());
        assert_eq!(
            namer.next_path("webp").await.unwrap(),
            dir.path().join("day1/videos/take_00001_.webp")
        );
    }
}
