//! Saving frame sequences as named video files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;
use vgen_media::{EncodeOptions, FrameSequence, MediaCodec, VideoCodec, VideoFormat};
use vgen_storage::OutputNamer;

use crate::error::{GenerationError, GenerationResult};

/// Container, codec and quality for an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExportOptions {
    #[serde(flatten)]
    pub encode: EncodeOptions,
}

impl ExportOptions {
    pub fn new(format: VideoFormat, codec: VideoCodec, quality: u8) -> Self {
        Self {
            encode: EncodeOptions {
                format,
                codec,
                quality,
            },
        }
    }

    pub fn extension(&self) -> &'static str {
        self.encode.format.extension()
    }
}

impl From<EncodeOptions> for ExportOptions {
    fn from(encode: EncodeOptions) -> Self {
        Self { encode }
    }
}

/// Encode `frames` into the next file `namer` hands out.
pub async fn export_video(
    codec: &dyn MediaCodec,
    namer: &mut OutputNamer,
    frames: &FrameSequence,
    options: &ExportOptions,
) -> GenerationResult<PathBuf> {
    if frames.is_empty() {
        return Err(GenerationError::validation("cannot export an empty frame sequence"));
    }

    let path = namer.next_path(options.extension()).await?;
    codec.encode(frames, &path, &options.encode).await?;

    info!(
        path = %path.display(),
        frames = frames.len(),
        format = %options.encode.format,
        codec = %options.encode.codec,
        "Video exported"
    );
    Ok(path)
}
