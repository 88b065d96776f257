//! Transports for the content generation API.
//!
//! Two interchangeable transports exist: a typed client ([`SdkTransport`])
//! and raw HTTP with endpoint probing ([`HttpTransport`]). One is selected per
//! request by [`TransportSelector`] and then used for the task's whole life.

mod http;
mod http_core;
mod sdk;
mod select;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use vgen_models::{GenerationPayload, Task};

use crate::error::{GenerationError, GenerationResult};

pub use http::{HttpTransport, STATUS_PATH_TEMPLATES};
pub use http_core::HttpCore;
#[cfg(feature = "sdk")]
pub use sdk::ArkSdkClient;
pub use sdk::{ContentGenerationApi, SdkTransport};
pub use select::{SelectedTransport, TransportSelector};

/// Task creation path, relative to the API root.
pub const TASKS_PATH: &str = "contents/generations/tasks";

/// Which transport carried a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Sdk,
    Http,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Sdk => "sdk",
            TransportKind::Http => "http",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Capabilities shared by all transports.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Create a task, returning its id.
    async fn submit(&self, payload: &GenerationPayload) -> GenerationResult<String>;

    /// Read the current state of a task.
    async fn fetch_status(&self, task_id: &str) -> GenerationResult<Task>;

    /// Fetch the finished video.
    async fn download(&self, url: &str) -> GenerationResult<Vec<u8>>;
}

/// Check a server-issued task id before it is put into URLs and file names.
///
/// Ids must stay a single path segment: no separators, dot segments, URL
/// delimiters, escapes or control characters.
pub fn validate_task_id(task_id: &str) -> GenerationResult<()> {
    let bad_char = task_id
        .chars()
        .any(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_control());

    if bad_char || task_id.contains("..") || task_id == "." {
        return Err(GenerationError::transport(format!(
            "server returned an unusable task id: {:?}",
            task_id
        )));
    }
    Ok(())
}
