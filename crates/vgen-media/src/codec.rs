//! Media codec: decoding containers into frame sequences and back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tokio::sync::watch;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner, PIPE_IN, PIPE_OUT};
use crate::error::{MediaError, MediaResult};
use crate::frame::FrameSequence;
use crate::probe::probe_stream;

/// Decode and encode frame sequences.
#[async_trait]
pub trait MediaCodec: Send + Sync {
    /// Decode a video file into normalized frames.
    async fn decode(&self, path: &Path) -> MediaResult<FrameSequence>;

    /// Encode frames into a container at `path`.
    async fn encode(&self, frames: &FrameSequence, path: &Path, options: &EncodeOptions) -> MediaResult<()>;
}

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    #[default]
    Auto,
    Mp4,
    Gif,
    Webp,
    Mov,
    Avi,
}

impl VideoFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoFormat::Auto => "auto",
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Gif => "gif",
            VideoFormat::Webp => "webp",
            VideoFormat::Mov => "mov",
            VideoFormat::Avi => "avi",
        }
    }

    /// File extension; `auto` writes mp4.
    pub fn extension(&self) -> &'static str {
        match self {
            VideoFormat::Auto => "mp4",
            other => other.as_str(),
        }
    }

    /// Animated image formats loop and ignore CRF.
    pub fn is_animated_image(&self) -> bool {
        matches!(self, VideoFormat::Gif | VideoFormat::Webp)
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoFormat {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(VideoFormat::Auto),
            "mp4" => Ok(VideoFormat::Mp4),
            "gif" => Ok(VideoFormat::Gif),
            "webp" => Ok(VideoFormat::Webp),
            "mov" => Ok(VideoFormat::Mov),
            "avi" => Ok(VideoFormat::Avi),
            _ => Err(MediaError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Video encoder selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    Auto,
    H264,
    H265,
    Libx264,
    Libx265,
    Vp9,
    Prores,
    Mpeg4,
}

impl VideoCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoCodec::Auto => "auto",
            VideoCodec::H264 => "h264",
            VideoCodec::H265 => "h265",
            VideoCodec::Libx264 => "libx264",
            VideoCodec::Libx265 => "libx265",
            VideoCodec::Vp9 => "vp9",
            VideoCodec::Prores => "prores",
            VideoCodec::Mpeg4 => "mpeg4",
        }
    }

    /// Whether the encoder takes `-crf`/`-preset`.
    pub fn uses_crf(&self) -> bool {
        matches!(
            self,
            VideoCodec::Auto
                | VideoCodec::H264
                | VideoCodec::H265
                | VideoCodec::Libx264
                | VideoCodec::Libx265
        )
    }

    /// FFmpeg encoder name, `None` to let FFmpeg pick for the container.
    pub fn encoder(&self) -> Option<&'static str> {
        match self {
            VideoCodec::Auto => None,
            VideoCodec::H264 | VideoCodec::Libx264 => Some("libx264"),
            VideoCodec::H265 | VideoCodec::Libx265 => Some("libx265"),
            VideoCodec::Vp9 => Some("libvpx-vp9"),
            VideoCodec::Prores => Some("prores_ks"),
            VideoCodec::Mpeg4 => Some("mpeg4"),
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoCodec {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(VideoCodec::Auto),
            "h264" => Ok(VideoCodec::H264),
            "h265" => Ok(VideoCodec::H265),
            "libx264" => Ok(VideoCodec::Libx264),
            "libx265" => Ok(VideoCodec::Libx265),
            "vp9" => Ok(VideoCodec::Vp9),
            "prores" => Ok(VideoCodec::Prores),
            "mpeg4" => Ok(VideoCodec::Mpeg4),
            _ => Err(MediaError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Default CRF for video containers.
pub const DEFAULT_QUALITY: u8 = 22;

/// Encoding options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeOptions {
    #[serde(default)]
    pub format: VideoFormat,
    #[serde(default)]
    pub codec: VideoCodec,
    /// CRF 0-51 for video containers; webp quality 0-100
    #[serde(default = "default_quality")]
    pub quality: u8,
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            format: VideoFormat::Auto,
            codec: VideoCodec::Auto,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl EncodeOptions {
    /// Webp quality; CRF-range values are mapped onto the 0-100 scale.
    pub fn webp_quality(&self) -> u8 {
        if self.quality < 52 {
            100 - self.quality
        } else {
            self.quality.min(100)
        }
    }
}

/// Codec backed by the FFmpeg and FFprobe command-line tools.
#[derive(Debug, Clone, Default)]
pub struct FfmpegCodec {
    timeout_secs: Option<u64>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl FfmpegCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill FFmpeg runs that exceed `secs`.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Kill running FFmpeg processes once `cancel_rx` reads `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    fn runner(&self) -> FfmpegRunner {
        let runner = match self.timeout_secs {
            Some(secs) => FfmpegRunner::new().with_timeout(secs),
            None => FfmpegRunner::new(),
        };
        match &self.cancel_rx {
            Some(rx) => runner.with_cancel(rx.clone()),
            None => runner,
        }
    }
}

#[async_trait]
impl MediaCodec for FfmpegCodec {
    async fn decode(&self, path: &Path) -> MediaResult<FrameSequence> {
        let info = probe_stream(path).await?;
        if info.width == 0 || info.height == 0 {
            return Err(MediaError::invalid_video(format!(
                "{} has no frame dimensions",
                path.display()
            )));
        }

        let cmd = FfmpegCommand::new(path, PIPE_OUT).raw_rgb_output();
        let raw = self.runner().run_with_io(&cmd, None).await?;

        let frames = FrameSequence::from_rgb8(info.width as usize, info.height as usize, &raw, info.fps)?;
        debug!(
            path = %path.display(),
            frames = frames.len(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            "Decoded video"
        );
        Ok(frames)
    }

    async fn encode(&self, frames: &FrameSequence, path: &Path, options: &EncodeOptions) -> MediaResult<()> {
        if frames.is_empty() {
            return Err(MediaError::invalid_frames("cannot encode an empty sequence"));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let cmd = build_encode_command(frames, path, options);
        self.runner().run_with_io(&cmd, Some(frames.to_rgb8())).await?;

        debug!(
            path = %path.display(),
            frames = frames.len(),
            format = %options.format,
            codec = %options.codec,
            "Encoded video"
        );
        Ok(())
    }
}

/// FFmpeg invocation that encodes `frames` piped as rgb24 into `path`.
pub fn build_encode_command(frames: &FrameSequence, path: &Path, options: &EncodeOptions) -> FfmpegCommand {
    let (width, height) = frames.dimensions();
    let cmd = FfmpegCommand::new(PIPE_IN, path).raw_rgb_input(width, height, frames.frame_rate());

    match options.format {
        VideoFormat::Gif => cmd.loop_count(0),
        VideoFormat::Webp => cmd
            .video_codec("libwebp")
            .quality(options.webp_quality())
            .loop_count(0),
        VideoFormat::Auto | VideoFormat::Mp4 | VideoFormat::Mov | VideoFormat::Avi => {
            let cmd = match options.codec.encoder() {
                Some(encoder) => cmd.video_codec(encoder),
                None => cmd,
            };
            let cmd = if options.codec.uses_crf() {
                cmd.crf(options.quality.min(51)).preset("medium")
            } else {
                cmd
            };
            // yuv420p needs even dimensions
            cmd.output_args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"])
                .pixel_format("yuv420p")
        }
    }
}
