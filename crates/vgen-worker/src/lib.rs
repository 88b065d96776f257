//! Job runner for video generation.
//!
//! Reads a JSON job description, runs one generation on its own task and
//! reports the result.

pub mod error;
pub mod job;
pub mod telemetry;

pub use error::{WorkerError, WorkerResult};
pub use job::{ExportJob, JobReport, JobSpec};
pub use telemetry::init_tracing;
