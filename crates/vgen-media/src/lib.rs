//! Frame handling and FFmpeg media codec for generated videos.
//!
//! This crate provides:
//! - Frame and frame sequence types backed by `ndarray`
//! - Normalization of heterogeneous media inputs into frame sequences
//! - Uniform frame subsampling
//! - A media codec trait with an FFmpeg CLI implementation
//! - JPEG data-URL encoding of reference frames

pub mod codec;
pub mod command;
pub mod error;
pub mod frame;
pub mod handles;
pub mod jpeg;
pub mod normalize;
pub mod probe;
pub mod sampling;

pub use codec::{EncodeOptions, FfmpegCodec, MediaCodec, VideoCodec, VideoFormat};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frame::{Frame, FrameSequence, SequenceInfo, DEFAULT_FRAME_RATE};
pub use handles::HandleAdapterRegistry;
pub use jpeg::{encode_jpeg_data_url, REFERENCE_JPEG_QUALITY};
pub use normalize::{FrameNormalizer, FrameSource, MediaInput};
pub use probe::{probe_stream, StreamInfo};
pub use sampling::sample_indices;
