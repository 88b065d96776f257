//! Structured generation logging utilities.
//!
//! Provides consistent, structured logging for one generation request with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

/// Generation logger for structured logging with consistent formatting.
///
/// Every request gets a run id at creation. The remote task id is attached
/// once the server has accepted the task.
#[derive(Debug, Clone)]
pub struct GenerationLogger {
    run_id: String,
    model: String,
    task_id: Option<String>,
}

impl GenerationLogger {
    /// Create a logger for a new request against `model`.
    pub fn new(model: &str) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            model: model.to_string(),
            task_id: None,
        }
    }

    /// Attach the remote task id.
    pub fn with_task(mut self, task_id: &str) -> Self {
        self.task_id = Some(task_id.to_string());
        self
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            model = %self.model,
            task_id = self.task_id.as_deref().unwrap_or("-"),
            "Generation started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            model = %self.model,
            task_id = self.task_id.as_deref().unwrap_or("-"),
            "Generation progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            model = %self.model,
            task_id = self.task_id.as_deref().unwrap_or("-"),
            "Generation warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            model = %self.model,
            task_id = self.task_id.as_deref().unwrap_or("-"),
            "Generation error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            model = %self.model,
            task_id = self.task_id.as_deref().unwrap_or("-"),
            "Generation completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// Create a tracing span for this request.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "generation",
            run_id = %self.run_id,
            model = %self.model
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_ids() {
        let logger = GenerationLogger::new("doubao-seedance-1-5-pro-251215");
        assert!(Uuid::parse_str(logger.run_id()).is_ok());
        assert!(logger.task_id().is_none());

        let logger = logger.with_task("cgt-2025");
        assert_eq!(logger.task_id(), Some("cgt-2025"));
    }

    #[test]
    fn test_distinct_run_ids() {
        let a = GenerationLogger::new("m");
        let b = GenerationLogger::new("m");
        assert_ne!(a.run_id(), b.run_id());
    }
}
