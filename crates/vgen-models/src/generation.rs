//! Generation modes, resolutions and model-family constraints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

/// How the video is conditioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Prompt only
    #[default]
    TextToVideo,
    /// Prompt plus a first frame
    ImageToVideo,
    /// Prompt plus first and last frames
    FirstLastFrameToVideo,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::TextToVideo => "text_to_video",
            GenerationMode::ImageToVideo => "image_to_video",
            GenerationMode::FirstLastFrameToVideo => "first_last_frame_to_video",
        }
    }

    /// Whether this mode needs a first reference frame.
    pub fn requires_first_frame(&self) -> bool {
        !matches!(self, GenerationMode::TextToVideo)
    }

    /// Whether this mode needs a last reference frame.
    pub fn requires_last_frame(&self) -> bool {
        matches!(self, GenerationMode::FirstLastFrameToVideo)
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GenerationMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text_to_video" | "t2v" => Ok(GenerationMode::TextToVideo),
            "image_to_video" | "i2v" => Ok(GenerationMode::ImageToVideo),
            "first_last_frame_to_video" | "flf2v" => Ok(GenerationMode::FirstLastFrameToVideo),
            _ => Err(ModeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown generation mode: {0}")]
pub struct ModeParseError(String);

/// Output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Resolution {
    #[serde(rename = "480p")]
    P480,
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::P480 => "480p",
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = ResolutionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "480p" => Ok(Resolution::P480),
            "720p" => Ok(Resolution::P720),
            "1080p" => Ok(Resolution::P1080),
            _ => Err(ResolutionParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown resolution: {0}")]
pub struct ResolutionParseError(String);

/// Role of a reference frame in the request content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameRole {
    #[serde(rename = "first_frame")]
    First,
    #[serde(rename = "last_frame")]
    Last,
}

/// Inclusive duration range in seconds.
pub type DurationBounds = RangeInclusive<u32>;

/// Known model families and their duration limits.
///
/// Identifiers are matched by substring so that dated releases
/// (`doubao-seedance-1-5-pro-251215`) resolve to their family. Custom
/// endpoint ids (`ep-...`) are [`ModelFamily::Unrecognized`] and skip
/// duration checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    Seedance15Pro,
    Seedance10Pro,
    Unrecognized,
}

impl ModelFamily {
    pub fn from_model_id(model_id: &str) -> Self {
        if model_id.contains("doubao-seedance-1-5-pro") {
            ModelFamily::Seedance15Pro
        } else if model_id.contains("doubao-seedance-1-0-pro") {
            ModelFamily::Seedance10Pro
        } else {
            ModelFamily::Unrecognized
        }
    }

    /// Permitted duration range, `None` when the family is not known.
    pub fn duration_bounds(&self) -> Option<DurationBounds> {
        match self {
            ModelFamily::Seedance15Pro => Some(4..=12),
            ModelFamily::Seedance10Pro => Some(5..=10),
            ModelFamily::Unrecognized => None,
        }
    }

    /// Fast variants only support text and first-frame conditioning.
    pub fn is_fast_variant(model_id: &str) -> bool {
        model_id.contains("fast")
    }
}

/// Reduce a wide seed into the 32-bit range accepted by the API.
pub fn wrap_seed(seed: u64) -> u32 {
    (seed % (1u64 << 32)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_seed() {
        assert_eq!(wrap_seed(0), 0);
        assert_eq!(wrap_seed(4_294_967_295), u32::MAX);
        assert_eq!(wrap_seed(4_294_967_296), 0);
        assert_eq!(wrap_seed(4_294_967_297), 1);
        assert_eq!(wrap_seed(u64::MAX), u32::MAX);
    }

    #[test]
    fn test_model_family_bounds() {
        let family = ModelFamily::from_model_id("doubao-seedance-1-5-pro-251215");
        assert_eq!(family, ModelFamily::Seedance15Pro);
        assert_eq!(family.duration_bounds(), Some(4..=12));

        let family = ModelFamily::from_model_id("doubao-seedance-1-0-pro-fast-251015");
        assert_eq!(family, ModelFamily::Seedance10Pro);
        assert_eq!(family.duration_bounds(), Some(5..=10));

        let family = ModelFamily::from_model_id("ep-20250101-abcde");
        assert_eq!(family, ModelFamily::Unrecognized);
        assert!(family.duration_bounds().is_none());
    }

    #[test]
    fn test_fast_variant() {
        assert!(ModelFamily::is_fast_variant("doubao-seedance-1-0-pro-fast-251015"));
        assert!(!ModelFamily::is_fast_variant("doubao-seedance-1-0-pro-250528"));
    }

    #[test]
    fn test_mode_parse_and_requirements() {
        assert_eq!("i2v".parse::<GenerationMode>().unwrap(), GenerationMode::ImageToVideo);
        assert_eq!(
            "first_last_frame_to_video".parse::<GenerationMode>().unwrap(),
            GenerationMode::FirstLastFrameToVideo
        );
        assert!("video_to_video".parse::<GenerationMode>().is_err());

        assert!(!GenerationMode::TextToVideo.requires_first_frame());
        assert!(GenerationMode::ImageToVideo.requires_first_frame());
        assert!(!GenerationMode::ImageToVideo.requires_last_frame());
        assert!(GenerationMode::FirstLastFrameToVideo.requires_last_frame());
    }

    #[test]
    fn test_resolution_serde() {
        assert_eq!(serde_json::to_string(&Resolution::P1080).unwrap(), "\"1080p\"");
        assert_eq!("720P".parse::<Resolution>().unwrap(), Resolution::P720);
    }
}
