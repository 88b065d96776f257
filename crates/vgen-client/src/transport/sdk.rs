//! Typed content-generation client transport.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use vgen_models::{GenerationPayload, Task, TaskError, TaskStatus};

use super::http_core::HttpCore;
use super::{validate_task_id, Transport, TransportKind};
use crate::config::ClientConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::lookup::{first_string, SDK_RESULT_URL_PATHS, TASK_ID_PATHS};

/// Task operations of a content-generation client.
///
/// Responses are returned as JSON so that fields can be located through
/// lookup paths regardless of client version.
#[async_trait]
pub trait ContentGenerationApi: Send + Sync {
    async fn create_task(&self, payload: &GenerationPayload) -> GenerationResult<Value>;

    async fn get_task(&self, task_id: &str) -> GenerationResult<Value>;
}

/// Client for the canonical `contents/generations/tasks` API.
#[cfg(feature = "sdk")]
#[derive(Debug, Clone)]
pub struct ArkSdkClient {
    core: HttpCore,
}

#[cfg(feature = "sdk")]
impl ArkSdkClient {
    pub fn new(core: HttpCore) -> Self {
        Self { core }
    }
}

#[cfg(feature = "sdk")]
#[async_trait]
impl ContentGenerationApi for ArkSdkClient {
    async fn create_task(&self, payload: &GenerationPayload) -> GenerationResult<Value> {
        let response = self.core.post_json(super::TASKS_PATH, payload).await?;
        self.core.read_json(response).await
    }

    async fn get_task(&self, task_id: &str) -> GenerationResult<Value> {
        let path = format!("{}/{}", super::TASKS_PATH, task_id);
        let response = self.core.get_status(&path).await?;
        self.core.read_json(response).await
    }
}

/// Transport backed by a [`ContentGenerationApi`].
#[derive(Clone)]
pub struct SdkTransport {
    api: Arc<dyn ContentGenerationApi>,
    core: HttpCore,
}

impl SdkTransport {
    /// Wrap an existing client. `core` is used for downloads.
    pub fn new(api: Arc<dyn ContentGenerationApi>, core: HttpCore) -> Self {
        Self { api, core }
    }

    /// Construct the default client. Never touches the network.
    #[cfg(feature = "sdk")]
    pub fn connect(_config: &ClientConfig, core: HttpCore) -> GenerationResult<Self> {
        let api = Arc::new(ArkSdkClient::new(core.clone()));
        Ok(Self::new(api, core))
    }

    #[cfg(not(feature = "sdk"))]
    pub fn connect(_config: &ClientConfig, _core: HttpCore) -> GenerationResult<Self> {
        Err(GenerationError::transport(
            "SDK unavailable: built without the `sdk` feature",
        ))
    }
}

#[async_trait]
impl Transport for SdkTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Sdk
    }

    async fn submit(&self, payload: &GenerationPayload) -> GenerationResult<String> {
        let response = self.api.create_task(payload).await?;
        let task_id = first_string(&response, TASK_ID_PATHS)
            .ok_or_else(|| GenerationError::transport(format!("SDK response has no task id: {}", response)))?;
        validate_task_id(&task_id)?;

        info!(task_id = %task_id, transport = "sdk", "Task submitted");
        Ok(task_id)
    }

    async fn fetch_status(&self, task_id: &str) -> GenerationResult<Task> {
        let response = self.api.get_task(task_id).await?;
        Ok(parse_sdk_task(task_id, response))
    }

    async fn download(&self, url: &str) -> GenerationResult<Vec<u8>> {
        self.core.download(url).await
    }
}

fn parse_sdk_task(task_id: &str, response: Value) -> Task {
    let status = response
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_lowercase);

    let mut task = Task::new(task_id, TaskStatus::from_server(status.as_deref()));
    task.result_url = first_string(&response, SDK_RESULT_URL_PATHS);
    task.error = response
        .get("error")
        .filter(|e| !e.is_null())
        .and_then(|e| serde_json::from_value::<TaskError>(e.clone()).ok());
    task.with_raw(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use vgen_models::{ContentItem, Resolution};

    struct ScriptedApi {
        create: Value,
        statuses: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl ContentGenerationApi for ScriptedApi {
        async fn create_task(&self, _: &GenerationPayload) -> GenerationResult<Value> {
            Ok(self.create.clone())
        }

        async fn get_task(&self, _: &str) -> GenerationResult<Value> {
            let mut statuses = self.statuses.lock().unwrap();
            Ok(statuses.remove(0))
        }
    }

    fn payload() -> GenerationPayload {
        GenerationPayload {
            model: "m".into(),
            content: vec![ContentItem::text("p")],
            resolution: Resolution::P720,
            duration: 5,
            ratio: None,
            seed: None,
        }
    }

    fn transport(create: Value, statuses: Vec<Value>) -> SdkTransport {
        let core = HttpCore::new(&ClientConfig::default(), "k").unwrap();
        let api = Arc::new(ScriptedApi {
            create,
            statuses: Mutex::new(statuses),
        });
        SdkTransport::new(api, core)
    }

    #[tokio::test]
    async fn test_submit_reads_nested_id() {
        let t = transport(json!({"data": {"id": "cgt-9"}}), vec![]);
        assert_eq!(t.submit(&payload()).await.unwrap(), "cgt-9");

        let t = transport(json!({"object": "task"}), vec![]);
        assert!(matches!(
            t.submit(&payload()).await,
            Err(GenerationError::Transport(_))
        ));

        let t = transport(json!({"id": "../../v1/keys"}), vec![]);
        assert!(matches!(
            t.submit(&payload()).await,
            Err(GenerationError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_status_parses_url_and_error() {
        let t = transport(
            json!({"id": "x"}),
            vec![
                json!({"status": "Succeeded", "content": {"video_url": "https://v/1.mp4"}}),
                json!({"status": "FAILED", "error": {"code": "Oops", "message": "bad"}}),
            ],
        );

        let task = t.fetch_status("x").await.unwrap();
        assert_eq!(task.status, TaskStatus::Succeeded);
        assert_eq!(task.result_url.as_deref(), Some("https://v/1.mp4"));

        let task = t.fetch_status("x").await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.unwrap().code, "Oops");
    }
}
