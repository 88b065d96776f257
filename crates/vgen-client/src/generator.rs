//! End-to-end generation: normalize, build, submit, poll, materialize.

use ndarray::Array4;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{warn, Instrument};
use vgen_media::{Frame, FrameNormalizer, FrameSequence, FrameSource, MediaCodec, MediaInput, SequenceInfo};

use crate::config::ClientConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::logging::GenerationLogger;
use crate::materialize::ResultMaterializer;
use crate::metrics;
use crate::poller::TaskPoller;
use crate::request::{GenerationParams, RequestBuilder};
use crate::transport::{Transport, TransportKind, TransportSelector};

/// Parameters plus reference media that still need normalizing.
///
/// Media inputs take precedence over frames already set on `params`.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    pub params: GenerationParams,
    pub first_frame: Option<MediaInput>,
    pub last_frame: Option<MediaInput>,
}

impl GenerationInput {
    pub fn new(params: GenerationParams) -> Self {
        Self {
            params,
            first_frame: None,
            last_frame: None,
        }
    }

    pub fn with_first_frame(mut self, input: impl Into<MediaInput>) -> Self {
        self.first_frame = Some(input.into());
        self
    }

    pub fn with_last_frame(mut self, input: impl Into<MediaInput>) -> Self {
        self.last_frame = Some(input.into());
        self
    }
}

impl From<GenerationParams> for GenerationInput {
    fn from(params: GenerationParams) -> Self {
        Self::new(params)
    }
}

/// A finished video: decoded frames plus the downloaded file.
#[derive(Debug, Clone)]
pub struct GeneratedVideo {
    frames: FrameSequence,
    path: PathBuf,
}

impl GeneratedVideo {
    pub fn new(frames: FrameSequence, path: PathBuf) -> Self {
        Self { frames, path }
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (usize, usize) {
        self.frames.dimensions()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames.duration_secs()
    }

    pub fn frame_rate(&self) -> f64 {
        self.frames.frame_rate()
    }

    pub fn frames(&self) -> &FrameSequence {
        &self.frames
    }

    /// Downloaded file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stacked frames and their rate.
    pub fn components(&self) -> (Array4<f32>, f64) {
        (self.frames.frames().clone(), self.frames.frame_rate())
    }

    pub fn info(&self) -> SequenceInfo {
        self.frames.info()
    }

    /// Copy the downloaded file to `dest`, creating parent directories.
    pub async fn save_to(&self, dest: impl AsRef<Path>) -> GenerationResult<PathBuf> {
        let dest = dest.as_ref();
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| vgen_storage::StorageError::create_dir(parent, e))?;
        }
        tokio::fs::copy(&self.path, dest)
            .await
            .map_err(|e| vgen_storage::StorageError::write_failed(dest, e))?;
        Ok(dest.to_path_buf())
    }
}

impl FrameSource for GeneratedVideo {
    fn images(&self) -> MediaInput {
        MediaInput::Stack(self.frames.frames().clone())
    }

    fn frame_rate(&self) -> Option<f64> {
        Some(self.frames.frame_rate())
    }
}

/// Result of one generation.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub task_id: String,
    pub video_url: String,
    pub local_path: PathBuf,
    pub transport: TransportKind,
    pub video: GeneratedVideo,
}

impl GenerationOutput {
    pub fn summary(&self) -> GenerationSummary {
        GenerationSummary {
            task_id: self.task_id.clone(),
            video_url: self.video_url.clone(),
            local_path: self.local_path.clone(),
            transport: self.transport,
            video: self.video.info(),
        }
    }
}

/// Serializable overview of a [`GenerationOutput`].
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSummary {
    pub task_id: String,
    pub video_url: String,
    pub local_path: PathBuf,
    pub transport: TransportKind,
    pub video: SequenceInfo,
}

/// Runs generation requests.
///
/// Requests share only the read-only configuration; each one gets its own
/// transport and polling state.
#[derive(Clone)]
pub struct VideoGenerator {
    config: Arc<ClientConfig>,
    selector: TransportSelector,
    builder: RequestBuilder,
    normalizer: FrameNormalizer,
    poller: TaskPoller,
    materializer: ResultMaterializer,
}

impl VideoGenerator {
    pub fn new(config: ClientConfig, codec: Arc<dyn MediaCodec>) -> Self {
        let config = Arc::new(config);
        let builder = match &config.api_key {
            Some(key) => RequestBuilder::with_fallback_key(Some(key.clone())),
            None => RequestBuilder::from_env(),
        };

        Self {
            selector: TransportSelector::new(Arc::clone(&config)),
            builder,
            normalizer: FrameNormalizer::new(Arc::clone(&codec)).with_input_dir(&config.input_dir),
            poller: TaskPoller::from_config(&config),
            materializer: ResultMaterializer::from_config(&config, codec),
            config,
        }
    }

    pub fn with_selector(mut self, selector: TransportSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_request_builder(mut self, builder: RequestBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_normalizer(mut self, normalizer: FrameNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run the whole flow on its own task.
    pub fn spawn(
        self: Arc<Self>,
        input: GenerationInput,
        cancel: watch::Receiver<bool>,
    ) -> JoinHandle<GenerationResult<GenerationOutput>> {
        tokio::spawn(async move { self.generate(input, cancel).await })
    }

    /// Generate one video and wait for it.
    pub async fn generate(
        &self,
        input: GenerationInput,
        cancel: watch::Receiver<bool>,
    ) -> GenerationResult<GenerationOutput> {
        let logger = GenerationLogger::new(&input.params.model);
        let span = logger.create_span();

        let result = self.run(input, cancel, logger.clone()).instrument(span).await;
        match &result {
            Ok(output) => {
                metrics::record_generation("succeeded");
                logger
                    .with_task(&output.task_id)
                    .log_completion(&format!("saved to {}", output.local_path.display()));
            }
            Err(e) => {
                metrics::record_generation(e.kind());
                logger.log_error(&e.to_string());
            }
        }
        result
    }

    async fn run(
        &self,
        input: GenerationInput,
        cancel: watch::Receiver<bool>,
        logger: GenerationLogger,
    ) -> GenerationResult<GenerationOutput> {
        let GenerationInput {
            mut params,
            first_frame,
            last_frame,
        } = input;

        logger.log_start(&format!("mode {}, {}s at {}", params.mode, params.duration_secs, params.resolution));

        if let Some(frame) = self.reference_frame(first_frame, "first", &logger).await {
            params.first_frame = Some(frame);
        }
        if let Some(frame) = self.reference_frame(last_frame, "last", &logger).await {
            params.last_frame = Some(frame);
        }

        let request = self.builder.build(params)?;
        let payload = request.to_payload()?;

        if *cancel.borrow() {
            return Err(GenerationError::Cancelled);
        }

        let started_at = Instant::now();
        let (transport, task_id) = self.selector.submit(request.api_key(), &payload).await?;
        let logger = logger.with_task(&task_id);
        logger.log_progress(&format!("submitted via {}", transport.kind()));

        let video_url = self.poller.poll(&transport, &task_id, started_at, cancel).await?;
        logger.log_progress("result ready, downloading");

        let (frames, local_path) = self.materializer.materialize(&transport, &video_url, &task_id).await?;

        Ok(GenerationOutput {
            task_id,
            video_url,
            transport: transport.kind(),
            video: GeneratedVideo::new(frames, local_path.clone()),
            local_path,
        })
    }

    /// First frame of a reference input, if it normalizes to anything.
    async fn reference_frame(
        &self,
        input: Option<MediaInput>,
        role: &str,
        logger: &GenerationLogger,
    ) -> Option<Frame> {
        let input = input?;
        let kind = input.kind();
        let frame = self
            .normalizer
            .normalize(input, Some(1))
            .await
            .and_then(|seq| seq.first_frame());

        if frame.is_none() {
            warn!(role, kind, "Reference input produced no frames");
            logger.log_warning(&format!("{} frame input ({}) produced no frames", role, kind));
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ndarray::Array3;
    use vgen_media::{EncodeOptions, MediaResult};
    use vgen_models::GenerationMode;

    struct NullCodec;

    #[async_trait]
    impl MediaCodec for NullCodec {
        async fn decode(&self, _: &Path) -> MediaResult<FrameSequence> {
            FrameSequence::new(Array4::zeros((2, 4, 4, 3)), 24.0)
        }

        async fn encode(&self, _: &FrameSequence, _: &Path, _: &EncodeOptions) -> MediaResult<()> {
            Ok(())
        }
    }

    fn generator() -> VideoGenerator {
        VideoGenerator::new(
            ClientConfig::default().with_api_key("0123456789abcdefghij-key"),
            Arc::new(NullCodec),
        )
    }

    fn no_cancel() -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        std::mem::forget(tx);
        rx
    }

    #[tokio::test]
    async fn test_missing_reference_frame_is_rejected_before_submit() {
        let params = GenerationParams::new("a cat", "doubao-seedance-1-0-pro-250528")
            .with_mode(GenerationMode::ImageToVideo);
        // An empty list normalizes to nothing, leaving the mode unsatisfied.
        let input = GenerationInput::new(params).with_first_frame(MediaInput::Sequence(vec![]));

        let err = generator().generate(input, no_cancel()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_submit() {
        let params = GenerationParams::new("a cat", "doubao-seedance-1-0-pro-250528");
        let (_tx, rx) = watch::channel(true);

        let err = generator().generate(params.into(), rx).await.unwrap_err();
        assert!(matches!(err, GenerationError::Cancelled));
    }

    #[tokio::test]
    async fn test_generated_video_accessors() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("doubao_t.mp4");
        std::fs::write(&source, b"mp4").unwrap();

        let frames = FrameSequence::from_frames(vec![Array3::zeros((4, 8, 3)); 48], 24.0).unwrap();
        let video = GeneratedVideo::new(frames, source);

        assert_eq!(video.dimensions(), (8, 4));
        assert_eq!(video.duration_secs(), 2.0);
        assert_eq!(FrameSource::frame_rate(&video), Some(24.0));
        let (stack, rate) = video.components();
        assert_eq!(stack.shape(), &[48, 4, 8, 3]);
        assert_eq!(rate, 24.0);

        let copy = video.save_to(dir.path().join("copies/clip.mp4")).await.unwrap();
        assert_eq!(std::fs::read(copy).unwrap(), b"mp4");
    }

    #[tokio::test]
    async fn test_generated_video_feeds_back_into_normalizer() {
        let frames = FrameSequence::from_frames(vec![Array3::from_elem((2, 2, 3), 0.25); 10], 12.0).unwrap();
        let video = GeneratedVideo::new(frames, PathBuf::from("unused.mp4"));

        let normalizer = FrameNormalizer::new(Arc::new(NullCodec));
        let seq = normalizer
            .normalize(MediaInput::Wrapper(Arc::new(video)), Some(5))
            .await
            .unwrap();
        assert_eq!(seq.len(), 5);
        assert_eq!(seq.frame_rate(), 12.0);
    }
}
