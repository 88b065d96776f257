//! Validated generation requests and their wire payload.

use std::fmt;

use vgen_media::{encode_jpeg_data_url, Frame, MediaResult, REFERENCE_JPEG_QUALITY};
use vgen_models::{
    wrap_seed, AspectRatio, ContentItem, FrameRole, GenerationMode, GenerationPayload, ModelFamily,
    Resolution,
};

use crate::config::API_KEY_ENV;
use crate::error::{GenerationError, GenerationResult};

/// Keys shorter than this are rejected as malformed.
pub const MIN_API_KEY_LEN: usize = 20;

/// Caller-supplied parameters, before validation.
#[derive(Clone)]
pub struct GenerationParams {
    pub prompt: String,
    /// Model name or custom endpoint id
    pub model: String,
    pub mode: GenerationMode,
    /// Only sent for text-to-video
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub duration_secs: u32,
    /// Any width; wrapped into 32 bits. Defaults to 0; `None` leaves it off the wire.
    pub seed: Option<u64>,
    /// Overrides the configured key when non-empty
    pub api_key: Option<String>,
    pub first_frame: Option<Frame>,
    pub last_frame: Option<Frame>,
}

impl GenerationParams {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            mode: GenerationMode::default(),
            aspect_ratio: AspectRatio::default(),
            resolution: Resolution::default(),
            duration_secs: 5,
            seed: Some(0),
            api_key: None,
            first_frame: None,
            last_frame: None,
        }
    }

    pub fn with_mode(mut self, mode: GenerationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Let the server pick a seed.
    pub fn without_seed(mut self) -> Self {
        self.seed = None;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_first_frame(mut self, frame: Frame) -> Self {
        self.first_frame = Some(frame);
        self
    }

    pub fn with_last_frame(mut self, frame: Frame) -> Self {
        self.last_frame = Some(frame);
        self
    }
}

impl fmt::Debug for GenerationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationParams")
            .field("prompt", &self.prompt)
            .field("model", &self.model)
            .field("mode", &self.mode)
            .field("aspect_ratio", &self.aspect_ratio)
            .field("resolution", &self.resolution)
            .field("duration_secs", &self.duration_secs)
            .field("seed", &self.seed)
            .field("first_frame", &self.first_frame.as_ref().map(|f| f.dim()))
            .field("last_frame", &self.last_frame.as_ref().map(|f| f.dim()))
            .finish_non_exhaustive()
    }
}

/// A reference image with its position in the clip.
#[derive(Debug, Clone)]
pub struct ReferenceFrame {
    pub role: FrameRole,
    pub image: Frame,
}

/// A request that passed validation.
#[derive(Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model_id: String,
    pub mode: GenerationMode,
    /// `Some` only for text-to-video
    pub aspect_ratio: Option<AspectRatio>,
    pub resolution: Resolution,
    pub duration_secs: u32,
    pub seed: Option<u32>,
    /// Ordered first, then last
    pub reference_frames: Vec<ReferenceFrame>,
    api_key: String,
}

impl GenerationRequest {
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Build the task-creation body, JPEG-encoding reference frames.
    pub fn to_payload(&self) -> MediaResult<GenerationPayload> {
        let mut content = Vec::with_capacity(1 + self.reference_frames.len());
        content.push(ContentItem::text(self.prompt.clone()));

        for reference in &self.reference_frames {
            let url = encode_jpeg_data_url(reference.image.view(), REFERENCE_JPEG_QUALITY)?;
            content.push(ContentItem::image(url, reference.role));
        }

        Ok(GenerationPayload {
            model: self.model_id.clone(),
            content,
            resolution: self.resolution,
            duration: self.duration_secs,
            ratio: self.aspect_ratio,
            seed: self.seed,
        })
    }
}

impl fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("prompt", &self.prompt)
            .field("model_id", &self.model_id)
            .field("mode", &self.mode)
            .field("aspect_ratio", &self.aspect_ratio)
            .field("resolution", &self.resolution)
            .field("duration_secs", &self.duration_secs)
            .field("seed", &self.seed)
            .field("reference_frames", &self.reference_frames.len())
            .finish_non_exhaustive()
    }
}

/// Where the builder finds a key when the request has none.
#[derive(Clone)]
enum FallbackKey {
    /// Read the environment at build time
    Env,
    Fixed(Option<String>),
}

/// Validates parameters into a [`GenerationRequest`].
#[derive(Clone)]
pub struct RequestBuilder {
    fallback: FallbackKey,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RequestBuilder {
    /// Fall back to the `ARK_API_KEY` environment variable.
    pub fn from_env() -> Self {
        Self {
            fallback: FallbackKey::Env,
        }
    }

    /// Fall back to a fixed key, typically from [`ClientConfig`](crate::ClientConfig).
    pub fn with_fallback_key(api_key: Option<String>) -> Self {
        Self {
            fallback: FallbackKey::Fixed(api_key),
        }
    }

    pub fn build(&self, params: GenerationParams) -> GenerationResult<GenerationRequest> {
        let model_id = params.model.trim().to_string();

        if ModelFamily::is_fast_variant(&model_id)
            && params.mode == GenerationMode::FirstLastFrameToVideo
        {
            return Err(GenerationError::validation(format!(
                "Model {} is a fast variant and does not support first/last frame mode; \
                 use image-to-video or a non-fast model",
                model_id
            )));
        }

        if let Some(bounds) = ModelFamily::from_model_id(&model_id).duration_bounds() {
            if !bounds.contains(&params.duration_secs) {
                return Err(GenerationError::validation(format!(
                    "Duration {}s is not supported by {}; allowed range is {}-{}s",
                    params.duration_secs,
                    model_id,
                    bounds.start(),
                    bounds.end()
                )));
            }
        }

        let mut reference_frames = Vec::new();
        if params.mode.requires_first_frame() {
            let image = params.first_frame.ok_or_else(|| {
                GenerationError::validation(format!("{} mode requires a first frame", params.mode))
            })?;
            reference_frames.push(ReferenceFrame {
                role: FrameRole::First,
                image,
            });
        }
        if params.mode.requires_last_frame() {
            let image = params.last_frame.ok_or_else(|| {
                GenerationError::validation(format!("{} mode requires a last frame", params.mode))
            })?;
            reference_frames.push(ReferenceFrame {
                role: FrameRole::Last,
                image,
            });
        }

        let api_key = self.resolve_api_key(params.api_key.as_deref())?;

        let aspect_ratio = (params.mode == GenerationMode::TextToVideo).then_some(params.aspect_ratio);

        Ok(GenerationRequest {
            prompt: params.prompt,
            model_id,
            mode: params.mode,
            aspect_ratio,
            resolution: params.resolution,
            duration_secs: params.duration_secs,
            seed: params.seed.map(wrap_seed),
            reference_frames,
            api_key,
        })
    }

    fn resolve_api_key(&self, explicit: Option<&str>) -> GenerationResult<String> {
        let explicit = explicit.map(str::trim).unwrap_or_default();

        let key = if !explicit.is_empty() {
            explicit.to_string()
        } else {
            let fallback = match &self.fallback {
                FallbackKey::Env => std::env::var(API_KEY_ENV).ok(),
                FallbackKey::Fixed(key) => key.clone(),
            };
            fallback.map(|k| k.trim().to_string()).unwrap_or_default()
        };

        if key.is_empty() {
            return Err(GenerationError::validation(format!(
                "API key missing; pass one with the request or set {}",
                API_KEY_ENV
            )));
        }
        if key.chars().count() < MIN_API_KEY_LEN {
            return Err(GenerationError::validation(format!(
                "API key looks truncated (fewer than {} characters)",
                MIN_API_KEY_LEN
            )));
        }
        if key.chars().any(char::is_whitespace) {
            return Err(GenerationError::validation("API key contains whitespace"));
        }

        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    const KEY: &str = "0123456789abcdefghij-key";
    const PRO_15: &str = "doubao-seedance-1-5-pro-251215";

    fn builder() -> RequestBuilder {
        RequestBuilder::with_fallback_key(None)
    }

    fn frame() -> Frame {
        Array3::from_elem((4, 4, 3), 0.5)
    }

    fn params(model: &str) -> GenerationParams {
        GenerationParams::new("a cat surfing", model).with_api_key(KEY)
    }

    fn validation_message(result: GenerationResult<GenerationRequest>) -> String {
        match result {
            Err(GenerationError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_duration_bounds() {
        for secs in [3, 13] {
            let msg = validation_message(builder().build(params(PRO_15).with_duration(secs)));
            assert!(msg.contains("4-12"), "{}", msg);
        }
        for secs in [4, 12] {
            assert!(builder().build(params(PRO_15).with_duration(secs)).is_ok());
        }

        // Custom endpoints skip the check.
        assert!(builder().build(params("ep-2025-custom").with_duration(30)).is_ok());
    }

    #[test]
    fn test_fast_model_rejects_first_last_mode() {
        let p = params("doubao-seedance-1-0-pro-fast-251015")
            .with_mode(GenerationMode::FirstLastFrameToVideo)
            .with_duration(2)
            .with_first_frame(frame())
            .with_last_frame(frame());
        // Checked before the duration bound.
        let msg = validation_message(builder().build(p));
        assert!(msg.contains("fast"));
    }

    #[test]
    fn test_mode_frame_requirements() {
        let p = params(PRO_15).with_mode(GenerationMode::ImageToVideo);
        assert!(validation_message(builder().build(p)).contains("first frame"));

        let p = params(PRO_15)
            .with_mode(GenerationMode::FirstLastFrameToVideo)
            .with_first_frame(frame());
        assert!(validation_message(builder().build(p)).contains("last frame"));

        let request = builder()
            .build(params(PRO_15).with_first_frame(frame()).with_last_frame(frame()))
            .unwrap();
        assert!(request.reference_frames.is_empty());
    }

    #[test]
    fn test_api_key_checks() {
        let p = GenerationParams::new("p", PRO_15);
        assert!(validation_message(builder().build(p.clone())).contains("missing"));
        assert!(validation_message(builder().build(p.clone().with_api_key("short"))).contains("truncated"));
        assert!(validation_message(
            builder().build(p.clone().with_api_key("0123456789 abcdefghijkl"))
        )
        .contains("whitespace"));

        // Blank explicit key falls back.
        let fallback = RequestBuilder::with_fallback_key(Some(format!("  {}  ", KEY)));
        let request = fallback.build(p.with_api_key("   ")).unwrap();
        assert_eq!(request.api_key(), KEY);
    }

    #[test]
    fn test_payload_ratio_only_for_text_mode() {
        let request = builder()
            .build(params(PRO_15).with_aspect_ratio(AspectRatio::PORTRAIT).with_seed(4_294_967_297))
            .unwrap();
        let payload = request.to_payload().unwrap();
        assert_eq!(payload.ratio, Some(AspectRatio::PORTRAIT));
        assert_eq!(payload.seed, Some(1));
        assert_eq!(payload.image_count(), 0);

        let request = builder()
            .build(
                params(PRO_15)
                    .with_mode(GenerationMode::FirstLastFrameToVideo)
                    .with_first_frame(frame())
                    .with_last_frame(frame()),
            )
            .unwrap();
        let payload = request.to_payload().unwrap();
        assert!(payload.ratio.is_none());
        assert_eq!(payload.seed, Some(0));
        assert_eq!(payload.image_count(), 2);

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("ratio").is_none());
        assert_eq!(json["content"][1]["role"], "first_frame");
        assert_eq!(json["content"][2]["role"], "last_frame");
        assert!(json["content"][1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_seed_defaults_to_zero_unless_cleared() {
        let payload = builder().build(params(PRO_15)).unwrap().to_payload().unwrap();
        assert_eq!(serde_json::to_value(&payload).unwrap()["seed"], 0);

        let payload = builder()
            .build(params(PRO_15).without_seed())
            .unwrap()
            .to_payload()
            .unwrap();
        assert!(serde_json::to_value(&payload).unwrap().get("seed").is_none());
    }
}
