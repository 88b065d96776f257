//! Normalization of heterogeneous media inputs into frame sequences.
//!
//! Inputs are matched in a fixed priority order: stacked frames, a list of
//! frames, a wrapper or map exposing frames, a `(frames, rate)` pair, a file
//! path, and finally an opaque host handle resolved through the
//! [`HandleAdapterRegistry`]. Failures are logged and reported as `None`.

use ndarray::{s, Array3, Array4, Axis};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::codec::MediaCodec;
use crate::error::{MediaError, MediaResult};
use crate::frame::{FrameSequence, CHANNELS, DEFAULT_FRAME_RATE};
use crate::handles::HandleAdapterRegistry;
use crate::sampling::sample_indices;

/// Keys probed on map inputs for frame data, in priority order.
const FRAME_KEYS: [&str; 3] = ["images", "frames", "video"];

/// Keys probed on map inputs for a frame rate.
const RATE_KEYS: [&str; 2] = ["fps", "frame_rate"];

/// Nesting limit for wrappers and maps.
const MAX_DEPTH: usize = 8;

/// Anything that exposes frames, such as a decoded video object.
pub trait FrameSource: Send + Sync {
    /// Frames held by the source.
    fn images(&self) -> MediaInput;

    /// Playback rate, if the source knows it.
    fn frame_rate(&self) -> Option<f64> {
        None
    }
}

/// Accepted input shapes.
#[derive(Clone)]
pub enum MediaInput {
    /// Frames stacked as `(batch, height, width, channels)`
    Stack(Array4<f32>),
    /// A single `(height, width, channels)` buffer
    Image(Array3<f32>),
    /// A list of frames, or a `(frames, rate)` pair
    Sequence(Vec<MediaInput>),
    /// Numeric scalar, meaningful as the rate half of a pair
    Number(f64),
    Wrapper(Arc<dyn FrameSource>),
    /// Keyed container with `images`/`frames`/`video` and `fps`/`frame_rate`
    Map(BTreeMap<String, MediaInput>),
    /// Video file on disk
    Path(PathBuf),
    /// Host file object, see [`HandleAdapterRegistry`]
    Handle(Arc<dyn Any + Send + Sync>),
}

impl MediaInput {
    pub fn kind(&self) -> &'static str {
        match self {
            MediaInput::Stack(_) => "stack",
            MediaInput::Image(_) => "image",
            MediaInput::Sequence(_) => "sequence",
            MediaInput::Number(_) => "number",
            MediaInput::Wrapper(_) => "wrapper",
            MediaInput::Map(_) => "map",
            MediaInput::Path(_) => "path",
            MediaInput::Handle(_) => "handle",
        }
    }

    /// `(frames, rate)` pair.
    pub fn with_rate(frames: MediaInput, frame_rate: f64) -> Self {
        MediaInput::Sequence(vec![frames, MediaInput::Number(frame_rate)])
    }
}

impl fmt::Debug for MediaInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaInput::Stack(a) => write!(f, "Stack({:?})", a.shape()),
            MediaInput::Image(a) => write!(f, "Image({:?})", a.shape()),
            MediaInput::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
            MediaInput::Number(n) => write!(f, "Number({})", n),
            MediaInput::Wrapper(_) => write!(f, "Wrapper(..)"),
            MediaInput::Map(map) => f.debug_tuple("Map").field(map).finish(),
            MediaInput::Path(p) => write!(f, "Path({})", p.display()),
            MediaInput::Handle(_) => write!(f, "Handle(..)"),
        }
    }
}

impl From<FrameSequence> for MediaInput {
    fn from(seq: FrameSequence) -> Self {
        let (frames, rate) = seq.into_parts();
        MediaInput::with_rate(MediaInput::Stack(frames), rate)
    }
}

impl From<PathBuf> for MediaInput {
    fn from(path: PathBuf) -> Self {
        MediaInput::Path(path)
    }
}

/// Result of unwrapping an input before any decoding.
enum Unwrapped {
    Frames(Array4<f32>, Option<f64>),
    File(PathBuf, Option<f64>),
    Nothing,
}

/// Converts [`MediaInput`] values into [`FrameSequence`]s.
#[derive(Clone)]
pub struct FrameNormalizer {
    codec: Arc<dyn MediaCodec>,
    input_dir: Option<PathBuf>,
    handles: HandleAdapterRegistry,
}

impl FrameNormalizer {
    pub fn new(codec: Arc<dyn MediaCodec>) -> Self {
        Self {
            codec,
            input_dir: None,
            handles: HandleAdapterRegistry::default(),
        }
    }

    /// Directory used to re-resolve relative paths that do not exist as given.
    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = Some(dir.into());
        self
    }

    pub fn with_handles(mut self, handles: HandleAdapterRegistry) -> Self {
        self.handles = handles;
        self
    }

    pub fn handles_mut(&mut self) -> &mut HandleAdapterRegistry {
        &mut self.handles
    }

    /// Normalize `input`, subsampling to at most `max_frames` frames.
    ///
    /// `None` or `Some(0)` keeps every frame. Returns `None` when the input
    /// is unrecognised, empty or cannot be decoded.
    pub async fn normalize(&self, input: MediaInput, max_frames: Option<usize>) -> Option<FrameSequence> {
        let kind = input.kind();
        let sequence = match self.load(input).await {
            Ok(Some(sequence)) => sequence,
            Ok(None) => {
                debug!(input = kind, "Input not recognised as media");
                return None;
            }
            Err(e) => {
                warn!(input = kind, error = %e, "Failed to normalize media input");
                return None;
            }
        };

        if sequence.is_empty() {
            debug!(input = kind, "Media input has no frames");
            return None;
        }

        match max_frames {
            Some(max) if max > 0 && sequence.len() > max => {
                let indices = sample_indices(sequence.len(), max);
                debug!(from = sequence.len(), to = indices.len(), "Subsampled frames");
                Some(sequence.select(&indices))
            }
            _ => Some(sequence),
        }
    }

    async fn load(&self, input: MediaInput) -> MediaResult<Option<FrameSequence>> {
        match self.unwrap_input(input, None, 0)? {
            Unwrapped::Frames(frames, rate) => {
                let frames = rescale(coerce_channels(frames)?);
                FrameSequence::new(frames, rate.unwrap_or(DEFAULT_FRAME_RATE)).map(Some)
            }
            Unwrapped::File(path, rate) => {
                let path = self.resolve_path(&path)?;
                let sequence = self.codec.decode(&path).await?;
                Ok(Some(match rate {
                    Some(rate) => sequence.with_frame_rate(rate),
                    None => sequence,
                }))
            }
            Unwrapped::Nothing => Ok(None),
        }
    }

    fn unwrap_input(&self, input: MediaInput, rate: Option<f64>, depth: usize) -> MediaResult<Unwrapped> {
        if depth > MAX_DEPTH {
            return Err(MediaError::invalid_frames("media input nested too deeply"));
        }

        match input {
            MediaInput::Stack(frames) => Ok(Unwrapped::Frames(frames, rate)),
            MediaInput::Image(frame) => Ok(Unwrapped::Frames(frame.insert_axis(Axis(0)), rate)),
            MediaInput::Sequence(items) => self.unwrap_sequence(items, rate, depth),
            MediaInput::Wrapper(source) => {
                let rate = source.frame_rate().or(rate);
                self.unwrap_input(source.images(), rate, depth + 1)
            }
            MediaInput::Map(mut map) => {
                let rate = RATE_KEYS
                    .iter()
                    .find_map(|key| match map.get(*key) {
                        Some(MediaInput::Number(n)) => Some(*n),
                        _ => None,
                    })
                    .or(rate);
                match FRAME_KEYS.iter().find_map(|key| map.remove(*key)) {
                    Some(inner) => self.unwrap_input(inner, rate, depth + 1),
                    None => Ok(Unwrapped::Nothing),
                }
            }
            MediaInput::Path(path) => Ok(Unwrapped::File(path, rate)),
            MediaInput::Handle(handle) => match self.handles.resolve(handle.as_ref()) {
                Some(path) => Ok(Unwrapped::File(path, rate)),
                None => {
                    debug!("No adapter registered for handle type");
                    Ok(Unwrapped::Nothing)
                }
            },
            MediaInput::Number(_) => Ok(Unwrapped::Nothing),
        }
    }

    fn unwrap_sequence(&self, items: Vec<MediaInput>, rate: Option<f64>, depth: usize) -> MediaResult<Unwrapped> {
        if items.is_empty() {
            return Ok(Unwrapped::Nothing);
        }

        if items.iter().all(|item| matches!(item, MediaInput::Image(_))) {
            let frames = items
                .into_iter()
                .filter_map(|item| match item {
                    MediaInput::Image(frame) => Some(frame),
                    _ => None,
                })
                .map(|frame| coerce_channels(frame.insert_axis(Axis(0))))
                .collect::<MediaResult<Vec<_>>>()?;
            let views: Vec<_> = frames.iter().map(|f| f.view()).collect();
            let stacked = ndarray::concatenate(Axis(0), &views)
                .map_err(|e| MediaError::invalid_frames(e.to_string()))?;
            return Ok(Unwrapped::Frames(stacked, rate));
        }

        let mut items = items.into_iter();
        match (items.next(), items.next()) {
            (Some(frames), Some(MediaInput::Number(pair_rate))) => {
                self.unwrap_input(frames, Some(pair_rate), depth + 1)
            }
            _ => Ok(Unwrapped::Nothing),
        }
    }

    fn resolve_path(&self, path: &Path) -> MediaResult<PathBuf> {
        if path.exists() {
            return Ok(path.to_path_buf());
        }

        if let Some(dir) = &self.input_dir {
            let candidate = dir.join(path);
            if candidate.exists() {
                debug!(path = %candidate.display(), "Resolved media path under input directory");
                return Ok(candidate);
            }
        }

        Err(MediaError::FileNotFound(path.to_path_buf()))
    }
}

/// Bring a stack to three channels: alpha is dropped, gray is replicated.
fn coerce_channels(frames: Array4<f32>) -> MediaResult<Array4<f32>> {
    match frames.shape()[3] {
        CHANNELS => Ok(frames),
        4 => Ok(frames.slice(s![.., .., .., 0..CHANNELS]).to_owned()),
        1 => {
            let gray = frames.view();
            ndarray::concatenate(Axis(3), &[gray, gray, gray])
                .map_err(|e| MediaError::invalid_frames(e.to_string()))
        }
        other => Err(MediaError::invalid_frames(format!(
            "unsupported channel count {}",
            other
        ))),
    }
}

/// Samples above 1.0 indicate 0-255 data.
fn rescale(frames: Array4<f32>) -> Array4<f32> {
    let max = frames.iter().copied().fold(f32::MIN, f32::max);
    if max > 1.0 {
        frames.mapv(|v| v / 255.0)
    } else {
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::codec::EncodeOptions;

    /// Decodes any existing file into three 2x2 gray frames at 30 fps.
    struct StubCodec;

    #[async_trait]
    impl MediaCodec for StubCodec {
        async fn decode(&self, path: &Path) -> MediaResult<FrameSequence> {
            if !path.exists() {
                return Err(MediaError::FileNotFound(path.to_path_buf()));
            }
            FrameSequence::new(Array4::from_elem((3, 2, 2, 3), 0.5), 30.0)
        }

        async fn encode(&self, _: &FrameSequence, _: &Path, _: &EncodeOptions) -> MediaResult<()> {
            Ok(())
        }
    }

    struct StubVideo {
        frames: Array4<f32>,
    }

    impl FrameSource for StubVideo {
        fn images(&self) -> MediaInput {
            MediaInput::Stack(self.frames.clone())
        }

        fn frame_rate(&self) -> Option<f64> {
            Some(12.0)
        }
    }

    fn normalizer() -> FrameNormalizer {
        FrameNormalizer::new(Arc::new(StubCodec))
    }

    fn stack(len: usize) -> Array4<f32> {
        Array4::from_shape_fn((len, 2, 2, 3), |(i, _, _, _)| i as f32 / 100.0)
    }

    #[tokio::test]
    async fn test_unrecognised_and_empty_inputs() {
        let n = normalizer();
        assert!(n.normalize(MediaInput::Sequence(vec![]), None).await.is_none());
        assert!(n.normalize(MediaInput::Number(3.0), None).await.is_none());
        assert!(n.normalize(MediaInput::Map(BTreeMap::new()), None).await.is_none());
        assert!(n.normalize(MediaInput::Stack(stack(0)), None).await.is_none());
        assert!(n.normalize(MediaInput::Handle(Arc::new(7u8)), None).await.is_none());
    }

    #[tokio::test]
    async fn test_stack_drops_alpha_and_rescales() {
        let rgba = Array4::from_elem((2, 3, 3, 4), 255.0);
        let seq = normalizer().normalize(MediaInput::Stack(rgba), None).await.unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.frames().shape(), &[2, 3, 3, 3]);
        assert!(seq.frames().iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert_eq!(seq.frame_rate(), DEFAULT_FRAME_RATE);
    }

    #[tokio::test]
    async fn test_sequence_of_images_keeps_order() {
        let images = vec![
            MediaInput::Image(Array3::from_elem((2, 2, 1), 0.1)),
            MediaInput::Image(Array3::from_elem((2, 2, 3), 0.9)),
        ];
        let seq = normalizer().normalize(MediaInput::Sequence(images), None).await.unwrap();
        assert_eq!(seq.len(), 2);
        assert!((seq.frame(0).unwrap()[[0, 0, 2]] - 0.1).abs() < 1e-6);
        assert!((seq.frame(1).unwrap()[[1, 1, 0]] - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_wrapper_and_map_rates() {
        let wrapper = MediaInput::Wrapper(Arc::new(StubVideo { frames: stack(4) }));
        let seq = normalizer().normalize(wrapper, None).await.unwrap();
        assert_eq!(seq.frame_rate(), 12.0);

        let mut map = BTreeMap::new();
        map.insert("frames".to_string(), MediaInput::Stack(stack(5)));
        map.insert("frame_rate".to_string(), MediaInput::Number(8.0));
        let seq = normalizer().normalize(MediaInput::Map(map), None).await.unwrap();
        assert_eq!(seq.len(), 5);
        assert_eq!(seq.frame_rate(), 8.0);
    }

    #[tokio::test]
    async fn test_pair_overrides_rate() {
        let pair = MediaInput::with_rate(MediaInput::Stack(stack(3)), 30.0);
        let seq = normalizer().normalize(pair, None).await.unwrap();
        assert_eq!(seq.frame_rate(), 30.0);
    }

    #[tokio::test]
    async fn test_max_frames_subsamples() {
        let seq = normalizer()
            .normalize(MediaInput::Stack(stack(10)), Some(4))
            .await
            .unwrap();
        assert_eq!(seq.len(), 4);
        assert!((seq.frame(3).unwrap()[[0, 0, 0]] - 0.09).abs() < 1e-6);

        let seq = normalizer().normalize(MediaInput::Stack(stack(10)), Some(0)).await.unwrap();
        assert_eq!(seq.len(), 10);
    }

    #[tokio::test]
    async fn test_path_falls_back_to_input_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"stub").unwrap();

        let n = normalizer().with_input_dir(dir.path());
        let seq = n.normalize(MediaInput::Path("clip.mp4".into()), None).await.unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.frame_rate(), 30.0);

        assert!(n.normalize(MediaInput::Path("missing.mp4".into()), None).await.is_none());
    }

    #[tokio::test]
    async fn test_registered_handle_decodes_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("host.mp4");
        std::fs::write(&file, b"stub").unwrap();

        let seq = normalizer()
            .normalize(MediaInput::Handle(Arc::new(file)), Some(1))
            .await
            .unwrap();
        assert_eq!(seq.len(), 1);
    }
}
