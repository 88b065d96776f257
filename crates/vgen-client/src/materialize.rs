//! Turning a remote result URL into local frames.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use vgen_media::{FrameSequence, MediaCodec, MediaError};
use vgen_storage::LocalStore;

use crate::config::ClientConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::transport::{validate_task_id, Transport};

/// Container extension of downloaded results.
pub const RESULT_EXTENSION: &str = "mp4";

/// Downloads, persists and decodes finished videos.
#[derive(Clone)]
pub struct ResultMaterializer {
    store: LocalStore,
    codec: Arc<dyn MediaCodec>,
    prefix: String,
}

impl ResultMaterializer {
    pub fn new(store: LocalStore, codec: Arc<dyn MediaCodec>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            codec,
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &ClientConfig, codec: Arc<dyn MediaCodec>) -> Self {
        let store = LocalStore::new(&config.output_dir).with_input_root(&config.input_dir);
        Self::new(store, codec, config.result_prefix.clone())
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// File name a task's result is saved under, before collision handling.
    pub fn file_name(&self, task_id: &str) -> String {
        format!("{}_{}.{}", self.prefix, task_id, RESULT_EXTENSION)
    }

    /// Download `url`, write it under the output root and decode it.
    ///
    /// Returns the decoded frames together with the path the file was
    /// actually written to.
    pub async fn materialize(
        &self,
        transport: &dyn Transport,
        url: &str,
        task_id: &str,
    ) -> GenerationResult<(FrameSequence, PathBuf)> {
        validate_task_id(task_id)?;
        let bytes = transport.download(url).await?;
        if bytes.is_empty() {
            return Err(GenerationError::decode(format!("downloaded result for task {} is empty", task_id)));
        }

        let path = self.store.write(&bytes, self.file_name(task_id)).await?;
        info!(task_id, path = %path.display(), bytes = bytes.len(), "Result saved");

        let frames = self
            .codec
            .decode(&path)
            .await
            .map_err(|e| match e {
                MediaError::Cancelled => GenerationError::Cancelled,
                e => GenerationError::decode(format!("{}: {}", path.display(), e)),
            })?;

        if frames.is_empty() {
            return Err(GenerationError::decode(format!(
                "{} contains no frames",
                path.display()
            )));
        }

        let (width, height) = frames.dimensions();
        info!(
            task_id,
            frames = frames.len(),
            width,
            height,
            fps = frames.frame_rate(),
            "Result decoded"
        );
        Ok((frames, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportKind;
    use async_trait::async_trait;
    use ndarray::Array4;
    use std::path::Path;
    use vgen_media::{EncodeOptions, MediaResult};
    use vgen_models::{GenerationPayload, Task, TaskStatus};

    struct BytesTransport(Vec<u8>);

    #[async_trait]
    impl Transport for BytesTransport {
        fn kind(&self) -> TransportKind {
            TransportKind::Http
        }

        async fn submit(&self, _: &GenerationPayload) -> GenerationResult<String> {
            Ok("t".into())
        }

        async fn fetch_status(&self, id: &str) -> GenerationResult<Task> {
            Ok(Task::new(id, TaskStatus::Queued))
        }

        async fn download(&self, _: &str) -> GenerationResult<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    /// Decodes any file into `frames` black frames, or fails when zero.
    struct FixedCodec {
        frames: usize,
    }

    struct CancelledCodec;

    #[async_trait]
    impl MediaCodec for CancelledCodec {
        async fn decode(&self, _: &Path) -> MediaResult<FrameSequence> {
            Err(MediaError::Cancelled)
        }

        async fn encode(&self, _: &FrameSequence, _: &Path, _: &EncodeOptions) -> MediaResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl MediaCodec for FixedCodec {
        async fn decode(&self, path: &Path) -> MediaResult<FrameSequence> {
            if !path.exists() {
                return Err(MediaError::FileNotFound(path.to_path_buf()));
            }
            FrameSequence::new(Array4::zeros((self.frames, 4, 6, 3)), 24.0)
        }

        async fn encode(&self, _: &FrameSequence, _: &Path, _: &EncodeOptions) -> MediaResult<()> {
            Ok(())
        }
    }

    fn materializer(dir: &Path, frames: usize) -> ResultMaterializer {
        ResultMaterializer::new(LocalStore::new(dir), Arc::new(FixedCodec { frames }), "doubao")
    }

    #[tokio::test]
    async fn test_materialize_writes_and_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let m = materializer(dir.path(), 3);
        let transport = BytesTransport(b"video-bytes".to_vec());

        let (frames, path) = m.materialize(&transport, "https://r/v.mp4", "cgt-1").await.unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames.dimensions(), (6, 4));
        assert_eq!(path, dir.path().join("doubao_cgt-1.mp4"));
        assert_eq!(std::fs::read(&path).unwrap(), b"video-bytes");

        // A second result for the same task lands beside the first.
        let (_, second) = m.materialize(&transport, "https://r/v.mp4", "cgt-1").await.unwrap();
        assert_ne!(second, path);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_empty_results_are_decode_errors() {
        let dir = tempfile::tempdir().unwrap();

        let m = materializer(dir.path(), 0);
        let err = m
            .materialize(&BytesTransport(b"x".to_vec()), "u", "t")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Decode(_)));

        let m = materializer(dir.path(), 2);
        let err = m
            .materialize(&BytesTransport(Vec::new()), "u", "t2")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Decode(_)));
    }

    #[tokio::test]
    async fn test_task_id_cannot_leave_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output");
        let m = materializer(&output, 1);

        let err = m
            .materialize(&BytesTransport(b"x".to_vec()), "u", "x/../../escaped")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_)));
        assert!(!dir.path().join("escaped.mp4").exists());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_cancelled_decode_stays_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let m = ResultMaterializer::new(LocalStore::new(dir.path()), Arc::new(CancelledCodec), "doubao");

        let err = m
            .materialize(&BytesTransport(b"x".to_vec()), "u", "t")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Cancelled));
    }
}
