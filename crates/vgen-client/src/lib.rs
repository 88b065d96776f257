//! Asynchronous video generation client.
//!
//! This crate provides:
//! - Request validation and wire payload construction
//! - Typed-client and raw HTTP transports with per-request fallback
//! - Bounded task polling with endpoint probing and error classification
//! - Download, storage and decoding of finished videos
//! - Video export through the media codec
//!
//! A typical flow:
//!
//! ```ignore
//! let generator = Arc::new(VideoGenerator::new(ClientConfig::from_env(), Arc::new(FfmpegCodec::new())));
//! let params = GenerationParams::new("a red fox in snow", "doubao-seedance-1-5-pro-251215");
//! let (_cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
//! let output = generator.spawn(params.into(), cancel_rx).await??;
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod generator;
pub mod logging;
pub mod lookup;
pub mod materialize;
pub mod metrics;
pub mod poller;
pub mod request;
pub mod transport;

pub use config::{ClientConfig, API_KEY_ENV, DEFAULT_BASE_URL};
pub use error::{classify_error_response, GenerationError, GenerationResult};
pub use export::{export_video, ExportOptions};
pub use generator::{GeneratedVideo, GenerationInput, GenerationOutput, GenerationSummary, VideoGenerator};
pub use logging::GenerationLogger;
pub use materialize::ResultMaterializer;
pub use poller::TaskPoller;
pub use request::{GenerationParams, GenerationRequest, ReferenceFrame, RequestBuilder};
#[cfg(feature = "sdk")]
pub use transport::ArkSdkClient;
pub use transport::{
    ContentGenerationApi, HttpCore, HttpTransport, SdkTransport, SelectedTransport, Transport,
    TransportKind, TransportSelector,
};
