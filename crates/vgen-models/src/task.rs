//! Remote generation tasks and their lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a remote generation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is waiting for capacity on the server
    Queued,
    /// Task is running
    Processing,
    /// Task finished and produced a video
    Succeeded,
    /// Task finished with an error
    Failed,
    /// Status string missing or not recognised; polling continues
    #[default]
    Unknown,
}

impl TaskStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Unknown => "unknown",
        }
    }

    /// Classify a server status string, ignoring case.
    pub fn from_server(status: Option<&str>) -> Self {
        let Some(status) = status else {
            return TaskStatus::Unknown;
        };

        match status.trim().to_lowercase().as_str() {
            "queued" | "pending" => TaskStatus::Queued,
            "running" | "processing" => TaskStatus::Processing,
            "succeeded" | "success" => TaskStatus::Succeeded,
            "failed" => TaskStatus::Failed,
            _ => TaskStatus::Unknown,
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error reported by the server for a failed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TaskError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Snapshot of a remote task as seen by one status read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Server-assigned task identifier
    pub id: String,
    pub status: TaskStatus,
    /// Download URL of the finished video
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    /// Raw server response the snapshot was read from
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl Task {
    pub fn new(id: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            id: id.into(),
            status,
            result_url: None,
            error: None,
            raw: serde_json::Value::Null,
        }
    }

    pub fn with_result_url(mut self, url: impl Into<String>) -> Self {
        self.result_url = Some(url.into());
        self
    }

    pub fn with_error(mut self, error: TaskError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_server() {
        assert_eq!(TaskStatus::from_server(Some("Queued")), TaskStatus::Queued);
        assert_eq!(TaskStatus::from_server(Some("running")), TaskStatus::Processing);
        assert_eq!(TaskStatus::from_server(Some("SUCCESS")), TaskStatus::Succeeded);
        assert_eq!(TaskStatus::from_server(Some("Succeeded")), TaskStatus::Succeeded);
        assert_eq!(TaskStatus::from_server(Some("FAILED")), TaskStatus::Failed);
        assert_eq!(TaskStatus::from_server(Some("expired")), TaskStatus::Unknown);
        assert_eq!(TaskStatus::from_server(None), TaskStatus::Unknown);
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(!TaskStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_task_builder() {
        let task = Task::new("cgt-1", TaskStatus::Succeeded).with_result_url("https://x/v.mp4");
        assert!(task.is_terminal());
        assert_eq!(task.result_url.as_deref(), Some("https://x/v.mp4"));
        assert!(task.error.is_none());
    }
}
