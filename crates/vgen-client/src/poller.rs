//! Bounded polling of a remote task until it yields a result URL.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vgen_models::TaskStatus;

use crate::config::ClientConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::metrics;
use crate::transport::Transport;

/// Polls a task at a fixed interval within a total time budget.
#[derive(Debug, Clone, Copy)]
pub struct TaskPoller {
    interval: Duration,
    budget: Duration,
}

impl Default for TaskPoller {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            budget: Duration::from_secs(600),
        }
    }
}

impl TaskPoller {
    pub fn new(interval: Duration, budget: Duration) -> Self {
        Self { interval, budget }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.poll_interval, config.poll_timeout)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Poll `task_id` until it succeeds with a URL.
    ///
    /// The budget is measured from `started_at`, normally the submission
    /// time. Queued, processing and unrecognised states keep polling, as do
    /// transient errors. Authentication, content-policy, validation and task
    /// failures end the loop immediately.
    pub async fn poll(
        &self,
        transport: &dyn Transport,
        task_id: &str,
        started_at: Instant,
        mut cancel: watch::Receiver<bool>,
    ) -> GenerationResult<String> {
        let transport_kind = transport.kind().as_str();
        let mut attempt: u32 = 0;

        loop {
            if *cancel.borrow() {
                info!(task_id, "Polling cancelled");
                metrics::record_poll_attempt(transport_kind, "cancelled");
                return Err(GenerationError::Cancelled);
            }

            let waited = started_at.elapsed();
            if waited >= self.budget {
                warn!(task_id, waited_secs = waited.as_secs(), "Polling budget exhausted");
                metrics::record_poll_attempt(transport_kind, "timeout");
                return Err(GenerationError::Timeout {
                    waited_secs: waited.as_secs(),
                });
            }

            attempt += 1;
            match transport.fetch_status(task_id).await {
                Ok(task) => {
                    metrics::record_poll_attempt(transport_kind, task.status.as_str());
                    match task.status {
                        TaskStatus::Succeeded => match task.result_url {
                            Some(url) => {
                                info!(
                                    task_id,
                                    attempt,
                                    waited_secs = waited.as_secs(),
                                    "Task succeeded"
                                );
                                return Ok(url);
                            }
                            None => {
                                warn!(task_id, attempt, "Task succeeded but no video URL yet, polling again");
                            }
                        },
                        TaskStatus::Failed => {
                            warn!(task_id, attempt, "Task failed");
                            return Err(GenerationError::GenerationFailed { payload: task.raw });
                        }
                        TaskStatus::Queued => {
                            info!(task_id, attempt, waited_secs = waited.as_secs(), "Task queued");
                        }
                        TaskStatus::Processing => {
                            info!(task_id, attempt, waited_secs = waited.as_secs(), "Task processing");
                        }
                        TaskStatus::Unknown => {
                            debug!(task_id, attempt, raw = %task.raw, "Unrecognised task status");
                        }
                    }
                }
                Err(e) if e.stops_polling() => {
                    metrics::record_poll_attempt(transport_kind, e.kind());
                    return Err(e);
                }
                Err(e) => {
                    metrics::record_poll_attempt(transport_kind, "retry");
                    warn!(task_id, attempt, error = %e, "Status read failed, retrying");
                }
            }

            let sleep = tokio::time::sleep(self.interval);
            tokio::pin!(sleep);
            let woke = tokio::select! {
                _ = &mut sleep => false,
                _ = cancel.changed() => true,
            };
            // Woken without a cancel request (or the sender is gone): finish the interval.
            if woke && !*cancel.borrow() {
                sleep.await;
            }
        }
    }
}
