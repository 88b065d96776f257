//! JSON job files and their translation into generation inputs.

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use vgen_client::{export_video, ExportOptions, GenerationInput, GenerationParams, GenerationSummary};
use vgen_media::{FrameSequence, MediaCodec, MediaInput};
use vgen_models::{AspectRatio, GenerationMode, Resolution};
use vgen_storage::{LocalStore, OutputConfig, OutputNamer};

use crate::error::{WorkerError, WorkerResult};

/// Extensions loaded as still images; anything else is decoded as video.
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "bmp"];

fn default_duration() -> u32 {
    5
}

fn default_export_prefix() -> String {
    "vgen".to_string()
}

/// One generation job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSpec {
    pub prompt: String,
    pub model: String,
    #[serde(default)]
    pub mode: GenerationMode,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Image or video; a video contributes its first frame
    #[serde(default)]
    pub first_frame: Option<PathBuf>,
    #[serde(default)]
    pub last_frame: Option<PathBuf>,
    /// Extra copy of the downloaded file
    #[serde(default)]
    pub save_to: Option<PathBuf>,
    /// Re-encode the result through the output namer
    #[serde(default)]
    pub export: Option<ExportJob>,
}

impl JobSpec {
    pub async fn load(path: impl AsRef<Path>) -> WorkerResult<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| WorkerError::ReadJob {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> WorkerResult<Self> {
        let job: JobSpec = serde_json::from_str(raw)?;
        if job.prompt.trim().is_empty() {
            return Err(WorkerError::invalid_job("prompt is empty"));
        }
        if job.model.trim().is_empty() {
            return Err(WorkerError::invalid_job("model is empty"));
        }
        Ok(job)
    }

    /// Build the generation input, loading reference media through `store`.
    pub fn to_input(&self, store: &LocalStore) -> WorkerResult<GenerationInput> {
        let mut params = GenerationParams::new(self.prompt.clone(), self.model.clone())
            .with_mode(self.mode)
            .with_aspect_ratio(self.aspect_ratio)
            .with_resolution(self.resolution)
            .with_duration(self.duration);
        if let Some(seed) = self.seed {
            params = params.with_seed(seed);
        }
        if let Some(key) = &self.api_key {
            params = params.with_api_key(key.clone());
        }

        let mut input = GenerationInput::new(params);
        if let Some(path) = &self.first_frame {
            input = input.with_first_frame(reference_input(store, path)?);
        }
        if let Some(path) = &self.last_frame {
            input = input.with_last_frame(reference_input(store, path)?);
        }
        Ok(input)
    }
}

/// Export settings of a job.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportJob {
    #[serde(default = "default_export_prefix")]
    pub filename_prefix: String,
    #[serde(default)]
    pub subfolder: Option<String>,
    #[serde(default)]
    pub start_counter: Option<u32>,
    #[serde(flatten)]
    pub options: ExportOptions,
}

impl ExportJob {
    pub async fn run(
        &self,
        codec: &dyn MediaCodec,
        output_root: &Path,
        frames: &FrameSequence,
    ) -> WorkerResult<PathBuf> {
        let mut config = OutputConfig::new(output_root, self.filename_prefix.clone());
        if let Some(subfolder) = &self.subfolder {
            config = config.with_subfolder(subfolder.clone());
        }
        if let Some(counter) = self.start_counter {
            config = config.with_start_counter(counter);
        }

        let mut namer = OutputNamer::prepare(config).await?;
        Ok(export_video(codec, &mut namer, frames, &self.options).await?)
    }
}

/// What the worker prints when a job finishes.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    #[serde(flatten)]
    pub summary: GenerationSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported: Option<PathBuf>,
}

fn reference_input(store: &LocalStore, path: &Path) -> WorkerResult<MediaInput> {
    let resolved = store
        .resolve_input(path)
        .ok_or_else(|| WorkerError::invalid_job(format!("reference file not found: {}", path.display())))?;

    let is_image = resolved
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false);

    if !is_image {
        debug!(path = %resolved.display(), "Using video file as reference input");
        return Ok(MediaInput::Path(resolved));
    }

    let img = image::open(&resolved)
        .map_err(|source| WorkerError::Image {
            path: resolved.clone(),
            source,
        })?
        .to_rgb8();
    let (width, height) = img.dimensions();
    let samples: Vec<f32> = img.into_raw().into_iter().map(|b| b as f32 / 255.0).collect();
    let frame = Array3::from_shape_vec((height as usize, width as usize, 3), samples)
        .map_err(|e| WorkerError::invalid_job(format!("{}: {}", resolved.display(), e)))?;

    Ok(MediaInput::Image(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_media::{VideoCodec, VideoFormat};

    #[test]
    fn test_parse_minimal_job_uses_defaults() {
        let job = JobSpec::parse(r#"{"prompt": "a fox", "model": "doubao-seedance-1-5-pro-251215"}"#).unwrap();
        assert_eq!(job.mode, GenerationMode::TextToVideo);
        assert_eq!(job.resolution, Resolution::default());
        assert_eq!(job.duration, 5);
        assert!(job.seed.is_none());
        assert!(job.export.is_none());
    }

    #[test]
    fn test_parse_full_job() {
        let job = JobSpec::parse(
            r#"{
                "prompt": "the fox jumps",
                "model": "doubao-seedance-1-0-pro-250528",
                "mode": "first_last_frame_to_video",
                "aspect_ratio": "9:16",
                "resolution": "1080p",
                "duration": 10,
                "seed": 4294967297,
                "first_frame": "a.png",
                "last_frame": "b.png",
                "export": {"filename_prefix": "fox", "format": "gif", "codec": "auto", "quality": 30}
            }"#,
        )
        .unwrap();

        assert_eq!(job.mode, GenerationMode::FirstLastFrameToVideo);
        assert_eq!(job.resolution, Resolution::P1080);
        assert_eq!(job.seed, Some(4_294_967_297));
        let export = job.export.unwrap();
        assert_eq!(export.filename_prefix, "fox");
        assert_eq!(export.options.encode.format, VideoFormat::Gif);
        assert_eq!(export.options.encode.codec, VideoCodec::Auto);
        assert_eq!(export.options.encode.quality, 30);
    }

    #[test]
    fn test_parse_rejects_blank_prompt() {
        assert!(matches!(
            JobSpec::parse(r#"{"prompt": "  ", "model": "m"}"#),
            Err(WorkerError::InvalidJob(_))
        ));
        assert!(matches!(
            JobSpec::parse(r#"{"model": "m"}"#),
            Err(WorkerError::ParseJob(_))
        ));
    }

    #[test]
    fn test_reference_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("out")).with_input_root(dir.path());

        image::RgbImage::from_pixel(4, 2, image::Rgb([255, 0, 0]))
            .save(dir.path().join("still.png"))
            .unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"not decoded here").unwrap();

        match reference_input(&store, Path::new("still.png")).unwrap() {
            MediaInput::Image(frame) => {
                assert_eq!(frame.dim(), (2, 4, 3));
                assert_eq!(frame[[0, 0, 0]], 1.0);
                assert_eq!(frame[[0, 0, 1]], 0.0);
            }
            other => panic!("unexpected input: {:?}", other),
        }

        assert!(matches!(
            reference_input(&store, Path::new("clip.mp4")).unwrap(),
            MediaInput::Path(p) if p == dir.path().join("clip.mp4")
        ));

        assert!(matches!(
            reference_input(&store, Path::new("missing.png")),
            Err(WorkerError::InvalidJob(_))
        ));
    }
}
