//! Shared data models for the video generation client.
//!
//! This crate provides Serde-serializable types for:
//! - Generation modes, resolutions and aspect ratios
//! - Model-family duration bounds and seed wrapping
//! - The outgoing task-creation payload
//! - Remote tasks and their status

pub mod aspect;
pub mod generation;
pub mod payload;
pub mod task;

// Re-export common types
pub use aspect::{AspectRatio, AspectRatioParseError};
pub use generation::{
    wrap_seed, DurationBounds, FrameRole, GenerationMode, ModelFamily, ModeParseError,
    Resolution, ResolutionParseError,
};
pub use payload::{ContentItem, GenerationPayload, ImageUrl};
pub use task::{Task, TaskError, TaskStatus};
