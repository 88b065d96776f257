//! Local output storage for generated videos.
//!
//! This crate provides:
//! - Collision-safe writes of downloaded results
//! - Input path resolution against an input directory
//! - Prefix and counter based naming for exported videos

pub mod error;
pub mod local;
pub mod naming;

pub use error::{StorageError, StorageResult};
pub use local::LocalStore;
pub use naming::{OutputConfig, OutputNamer};
