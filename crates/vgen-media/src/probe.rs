//! Frame geometry of a video file, read with ffprobe.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};
use crate::frame::DEFAULT_FRAME_RATE;

/// What the decoder needs to know before reading raw frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

#[derive(Debug, Deserialize)]
struct ProbeStreams {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

/// Read the first video stream's size and frame rate.
pub async fn probe_stream(path: impl AsRef<Path>) -> MediaResult<StreamInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args(["-v", "error", "-select_streams", "v:0", "-of", "json"])
        .args(["-show_entries", "stream=width,height,avg_frame_rate,r_frame_rate"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("ffprobe could not read {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        });
    }

    parse_stream_info(&output.stdout)
}

fn parse_stream_info(stdout: &[u8]) -> MediaResult<StreamInfo> {
    let probe: ProbeStreams = serde_json::from_slice(stdout)?;
    let stream = probe
        .streams
        .first()
        .ok_or_else(|| MediaError::invalid_video("No video stream found"))?;

    // avg_frame_rate is "0/0" for some streams, so fall through to r_frame_rate
    let fps = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|r| parse_frame_rate(r))
        .unwrap_or(DEFAULT_FRAME_RATE);

    Ok(StreamInfo {
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
        fps,
    })
}

/// `"30000/1001"` or `"29.97"` to frames per second.
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            num / den
        }
        None => s.parse().ok()?,
    };

    (rate.is_finite() && rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("24"), Some(24.0));
        assert!(parse_frame_rate("0/0").is_none());
        assert!(parse_frame_rate("-5").is_none());
        assert!(parse_frame_rate("fast").is_none());
    }

    #[test]
    fn test_zero_avg_rate_falls_back() {
        let json = br#"{"streams": [
            {"width": 1280, "height": 720, "avg_frame_rate": "0/0", "r_frame_rate": "24/1"}
        ]}"#;

        let info = parse_stream_info(json).unwrap();
        assert_eq!((info.width, info.height), (1280, 720));
        assert!((info.fps - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_rates_use_default() {
        let info = parse_stream_info(br#"{"streams": [{"width": 8, "height": 4}]}"#).unwrap();
        assert_eq!(info.fps, DEFAULT_FRAME_RATE);
    }

    #[test]
    fn test_no_video_stream() {
        assert!(matches!(
            parse_stream_info(br#"{"streams": []}"#),
            Err(MediaError::InvalidVideo(_))
        ));
        assert!(matches!(
            parse_stream_info(br#"{}"#),
            Err(MediaError::InvalidVideo(_))
        ));
    }
}
