//! JPEG data URLs for reference frames.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use ndarray::ArrayView3;

use crate::error::MediaResult;
use crate::frame::frame_to_rgb_image;

/// Quality used for reference frames sent to the generation API.
pub const REFERENCE_JPEG_QUALITY: u8 = 85;

/// Encode a frame as RGB JPEG bytes.
pub fn encode_jpeg(frame: ArrayView3<'_, f32>, quality: u8) -> MediaResult<Vec<u8>> {
    let image = frame_to_rgb_image(frame)?;
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgb8,
    )?;
    Ok(buf)
}

/// Encode a frame as a `data:image/jpeg;base64,...` URL.
pub fn encode_jpeg_data_url(frame: ArrayView3<'_, f32>, quality: u8) -> MediaResult<String> {
    let bytes = encode_jpeg(frame, quality)?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)))
}
