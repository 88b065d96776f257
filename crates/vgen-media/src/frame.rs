//! Frames and frame sequences.
//!
//! A [`Frame`] is an `(height, width, 3)` RGB buffer with samples in `[0, 1]`.
//! A [`FrameSequence`] stacks frames that share the same dimensions together
//! with the rate they should be played back at.

use ndarray::{s, Array3, Array4, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Single RGB frame, shape `(height, width, 3)`, samples in `[0, 1]`.
pub type Frame = Array3<f32>;

/// Frame rate used when neither the input nor the container reports one.
pub const DEFAULT_FRAME_RATE: f64 = 24.0;

/// Number of color channels in a normalized frame.
pub const CHANNELS: usize = 3;

/// Ordered frames of identical dimensions plus a playback rate.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSequence {
    frames: Array4<f32>,
    frame_rate: f64,
}

/// Summary of a sequence, suitable for logging and job output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequenceInfo {
    pub frame_count: usize,
    pub width: usize,
    pub height: usize,
    pub frame_rate: f64,
}

impl FrameSequence {
    /// Wrap a stacked `(frames, height, width, 3)` array.
    pub fn new(frames: Array4<f32>, frame_rate: f64) -> MediaResult<Self> {
        let channels = frames.shape()[3];
        if channels != CHANNELS {
            return Err(MediaError::invalid_frames(format!(
                "expected {} channels, got {}",
                CHANNELS, channels
            )));
        }

        Ok(Self {
            frames,
            frame_rate: sanitize_frame_rate(frame_rate),
        })
    }

    /// Stack individual frames in order. All frames must share dimensions.
    pub fn from_frames(frames: Vec<Frame>, frame_rate: f64) -> MediaResult<Self> {
        let Some(first) = frames.first() else {
            return Self::new(Array4::zeros((0, 0, 0, CHANNELS)), frame_rate);
        };

        let shape = first.shape().to_vec();
        if let Some(mismatch) = frames.iter().find(|f| f.shape() != shape.as_slice()) {
            return Err(MediaError::invalid_frames(format!(
                "frame shape {:?} does not match {:?}",
                mismatch.shape(),
                shape
            )));
        }

        let views: Vec<ArrayView3<f32>> = frames.iter().map(|f| f.view()).collect();
        let stacked = ndarray::stack(Axis(0), &views)
            .map_err(|e| MediaError::invalid_frames(e.to_string()))?;

        Self::new(stacked, frame_rate)
    }

    /// Build a sequence from packed 8-bit RGB data as produced by
    /// `ffmpeg -f rawvideo -pix_fmt rgb24`.
    pub fn from_rgb8(width: usize, height: usize, data: &[u8], frame_rate: f64) -> MediaResult<Self> {
        let frame_size = width * height * CHANNELS;
        if frame_size == 0 {
            return Err(MediaError::invalid_frames("zero frame dimensions"));
        }

        // A truncated trailing frame is dropped.
        let count = data.len() / frame_size;
        let samples: Vec<f32> = data[..count * frame_size]
            .iter()
            .map(|&b| b as f32 / 255.0)
            .collect();

        let frames = Array4::from_shape_vec((count, height, width, CHANNELS), samples)
            .map_err(|e| MediaError::invalid_frames(e.to_string()))?;

        Self::new(frames, frame_rate)
    }

    /// Packed 8-bit RGB bytes of all frames, row-major.
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.frames.iter().map(|&v| sample_to_u8(v)).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.frames.shape()[2], self.frames.shape()[1])
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Duration in seconds at the sequence frame rate.
    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.frame_rate
    }

    /// Borrow frame `index`.
    pub fn frame(&self, index: usize) -> Option<ArrayView3<'_, f32>> {
        (index < self.len()).then(|| self.frames.slice(s![index, .., .., ..]))
    }

    /// Owned copy of the first frame.
    pub fn first_frame(&self) -> Option<Frame> {
        self.frame(0).map(|f| f.to_owned())
    }

    /// New sequence made of the frames at `indices`, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            frames: self.frames.select(Axis(0), indices),
            frame_rate: self.frame_rate,
        }
    }

    /// Same frames at a different rate.
    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = sanitize_frame_rate(frame_rate);
        self
    }

    pub fn frames(&self) -> &Array4<f32> {
        &self.frames
    }

    pub fn into_parts(self) -> (Array4<f32>, f64) {
        (self.frames, self.frame_rate)
    }

    pub fn info(&self) -> SequenceInfo {
        let (width, height) = self.dimensions();
        SequenceInfo {
            frame_count: self.len(),
            width,
            height,
            frame_rate: self.frame_rate,
        }
    }
}

/// Convert a `[0, 1]` sample to an 8-bit value.
pub fn sample_to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Convert a single frame into an 8-bit RGB image.
pub fn frame_to_rgb_image(frame: ArrayView3<'_, f32>) -> MediaResult<image::RgbImage> {
    let (height, width, channels) = frame.dim();
    if channels != CHANNELS {
        return Err(MediaError::invalid_frames(format!(
            "expected {} channels, got {}",
            CHANNELS, channels
        )));
    }

    let bytes: Vec<u8> = frame.iter().map(|&v| sample_to_u8(v)).collect();
    image::RgbImage::from_raw(width as u32, height as u32, bytes)
        .ok_or_else(|| MediaError::invalid_frames("frame buffer size mismatch"))
}

fn sanitize_frame_rate(frame_rate: f64) -> f64 {
    if frame_rate.is_finite() && frame_rate > 0.0 {
        frame_rate
    } else {
        DEFAULT_FRAME_RATE
    }
}
