//! Raw HTTP transport with status endpoint probing.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};
use vgen_models::{GenerationPayload, Task, TaskError, TaskStatus};

use super::http_core::HttpCore;
use super::{validate_task_id, Transport, TransportKind, TASKS_PATH};
use crate::error::{GenerationError, GenerationResult};
use crate::lookup::{find_string_key, first_string, HTTP_RESULT_URL_PATHS, TASK_ID_PATHS, URL_KEYS};
use crate::metrics;

/// Status endpoints tried in order. Deployments differ in which one they
/// serve; a 404 moves on to the next.
pub const STATUS_PATH_TEMPLATES: [&str; 6] = [
    "contents/generations/tasks/{id}",
    "content/generation/tasks/{id}",
    "tasks/{id}",
    "video/tasks/{id}",
    "videos/tasks/{id}",
    "cv/tasks/{id}",
];

/// Transport speaking the REST API directly.
///
/// The status endpoint cursor is sticky: once a candidate returns 404 it is
/// never tried again for this transport.
#[derive(Debug)]
pub struct HttpTransport {
    core: HttpCore,
    candidate: AtomicUsize,
}

impl HttpTransport {
    pub fn new(core: HttpCore) -> Self {
        Self {
            core,
            candidate: AtomicUsize::new(0),
        }
    }

    /// Index of the status endpoint currently in use.
    pub fn current_candidate(&self) -> usize {
        self.candidate.load(Ordering::SeqCst)
    }

    fn status_path(index: usize, task_id: &str) -> String {
        STATUS_PATH_TEMPLATES[index].replace("{id}", task_id)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn submit(&self, payload: &GenerationPayload) -> GenerationResult<String> {
        let response = self.core.post_json(TASKS_PATH, payload).await?;

        if response.status() == StatusCode::NOT_FOUND {
            // Any error code in the body is subsumed by the unknown model.
            self.core.log_failure(response).await;
            return Err(GenerationError::ModelNotFound {
                model: payload.model.clone(),
            });
        }

        let body = self.core.read_json(response).await?;
        let task_id = first_string(&body, TASK_ID_PATHS)
            .ok_or_else(|| GenerationError::transport(format!("task creation response has no id: {}", body)))?;
        validate_task_id(&task_id)?;

        info!(task_id = %task_id, transport = "http", "Task submitted");
        Ok(task_id)
    }

    async fn fetch_status(&self, task_id: &str) -> GenerationResult<Task> {
        loop {
            let index = self.candidate.load(Ordering::SeqCst);
            let response = self.core.get_status(&Self::status_path(index, task_id)).await?;

            if response.status() == StatusCode::NOT_FOUND && index + 1 < STATUS_PATH_TEMPLATES.len() {
                // Never move backwards, even if another read advanced meanwhile.
                self.candidate.fetch_max(index + 1, Ordering::SeqCst);
                metrics::record_endpoint_fallback(index + 1);
                debug!(
                    task_id,
                    candidate = index + 1,
                    path = STATUS_PATH_TEMPLATES[index + 1],
                    "Status endpoint returned 404, trying next candidate"
                );
                continue;
            }

            let body = self.core.read_json(response).await?;
            return parse_status_response(task_id, body);
        }
    }

    async fn download(&self, url: &str) -> GenerationResult<Vec<u8>> {
        self.core.download(url).await
    }
}

/// Interpret a raw status document.
///
/// The status is read from `data.status`, or the top-level `status` when the
/// response has no `data` object.
fn parse_status_response(task_id: &str, body: Value) -> GenerationResult<Task> {
    let data = body.get("data").filter(|d| d.is_object());

    let raw_status = match data {
        Some(data) => data.get("status"),
        None => body.get("status"),
    }
    .and_then(Value::as_str);

    let status = TaskStatus::from_server(raw_status);
    if status == TaskStatus::Failed {
        return Err(GenerationError::GenerationFailed { payload: body });
    }

    let result_url = if status == TaskStatus::Succeeded {
        first_string(&body, HTTP_RESULT_URL_PATHS)
            .or_else(|| find_string_key(data.unwrap_or(&body), URL_KEYS))
    } else {
        None
    };

    let error = data
        .unwrap_or(&body)
        .get("error")
        .filter(|e| !e.is_null())
        .and_then(|e| serde_json::from_value::<TaskError>(e.clone()).ok());

    let mut task = Task::new(task_id, status).with_raw(body);
    task.result_url = result_url;
    task.error = error;
    Ok(task)
}
