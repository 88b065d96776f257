//! Aspect ratio of a generated video.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Aspect ratio, serialized on the wire as `"W:H"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Landscape (16:9)
    pub const LANDSCAPE: AspectRatio = AspectRatio::new(16, 9);

    /// Portrait (9:16)
    pub const PORTRAIT: AspectRatio = AspectRatio::new(9, 16);

    /// Square (1:1)
    pub const SQUARE: AspectRatio = AspectRatio::new(1, 1);

    /// Classic (4:3)
    pub const CLASSIC: AspectRatio = AspectRatio::new(4, 3);

    /// Classic portrait (3:4)
    pub const CLASSIC_PORTRAIT: AspectRatio = AspectRatio::new(3, 4);

    /// Cinema (21:9)
    pub const CINEMA: AspectRatio = AspectRatio::new(21, 9);

    /// Create a new aspect ratio.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the aspect ratio as a decimal.
    pub fn as_f64(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| AspectRatioParseError::InvalidFormat(s.to_string()))?;

        let width = width
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(width.to_string()))?;
        let height = height
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(height.to_string()))?;

        if width == 0 || height == 0 {
            return Err(AspectRatioParseError::ZeroValue);
        }

        Ok(AspectRatio { width, height })
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = AspectRatioParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AspectRatio> for String {
    fn from(value: AspectRatio) -> Self {
        value.to_string()
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::LANDSCAPE
    }
}

#[derive(Debug, Error)]
pub enum AspectRatioParseError {
    #[error("Invalid aspect ratio format: {0}, expected 'W:H'")]
    InvalidFormat(String),
    #[error("Invalid number in aspect ratio: {0}")]
    InvalidNumber(String),
    #[error("Aspect ratio cannot have zero values")]
    ZeroValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_parse() {
        assert_eq!("16:9".parse::<AspectRatio>().unwrap(), AspectRatio::LANDSCAPE);
        assert_eq!("21:9".parse::<AspectRatio>().unwrap(), AspectRatio::CINEMA);
        assert!("16x9".parse::<AspectRatio>().is_err());
        assert!("0:9".parse::<AspectRatio>().is_err());
        assert!("a:9".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_aspect_ratio_serializes_as_string() {
        let json = serde_json::to_string(&AspectRatio::PORTRAIT).unwrap();
        assert_eq!(json, "\"9:16\"");

        let parsed: AspectRatio = serde_json::from_str("\"4:3\"").unwrap();
        assert_eq!(parsed, AspectRatio::CLASSIC);
    }
}
