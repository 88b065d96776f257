//! Per-request transport selection.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;
use vgen_models::{GenerationPayload, Task};

use super::http::HttpTransport;
use super::http_core::HttpCore;
use super::sdk::{ContentGenerationApi, SdkTransport};
use super::{Transport, TransportKind};
use crate::config::ClientConfig;
use crate::error::GenerationResult;
use crate::metrics;

/// The transport a request committed to after a successful submission.
pub enum SelectedTransport {
    Sdk(SdkTransport),
    Http(HttpTransport),
}

#[async_trait]
impl Transport for SelectedTransport {
    fn kind(&self) -> TransportKind {
        match self {
            SelectedTransport::Sdk(t) => t.kind(),
            SelectedTransport::Http(t) => t.kind(),
        }
    }

    async fn submit(&self, payload: &GenerationPayload) -> GenerationResult<String> {
        match self {
            SelectedTransport::Sdk(t) => t.submit(payload).await,
            SelectedTransport::Http(t) => t.submit(payload).await,
        }
    }

    async fn fetch_status(&self, task_id: &str) -> GenerationResult<Task> {
        match self {
            SelectedTransport::Sdk(t) => t.fetch_status(task_id).await,
            SelectedTransport::Http(t) => t.fetch_status(task_id).await,
        }
    }

    async fn download(&self, url: &str) -> GenerationResult<Vec<u8>> {
        match self {
            SelectedTransport::Sdk(t) => t.download(url).await,
            SelectedTransport::Http(t) => t.download(url).await,
        }
    }
}

/// How the typed client is obtained.
#[derive(Clone)]
enum SdkSource {
    Disabled,
    Default,
    Custom(Arc<dyn ContentGenerationApi>),
}

/// Picks a transport for each request and submits the task through it.
///
/// The typed client is tried first. If it cannot be constructed or its
/// submission fails, the request is submitted over raw HTTP instead and
/// stays there.
#[derive(Clone)]
pub struct TransportSelector {
    config: Arc<ClientConfig>,
    sdk: SdkSource,
}

impl TransportSelector {
    pub fn new(config: Arc<ClientConfig>) -> Self {
        let sdk = if config.prefer_sdk {
            SdkSource::Default
        } else {
            SdkSource::Disabled
        };
        Self { config, sdk }
    }

    /// Use `api` instead of the default typed client.
    pub fn with_sdk_api(mut self, api: Arc<dyn ContentGenerationApi>) -> Self {
        self.sdk = SdkSource::Custom(api);
        self
    }

    /// Always use raw HTTP.
    pub fn without_sdk(mut self) -> Self {
        self.sdk = SdkSource::Disabled;
        self
    }

    /// Submit `payload` and return the committed transport with the task id.
    pub async fn submit(
        &self,
        api_key: &str,
        payload: &GenerationPayload,
    ) -> GenerationResult<(SelectedTransport, String)> {
        let core = HttpCore::new(&self.config, api_key)?;

        if let Some(sdk) = self.sdk_transport(core.clone()) {
            match sdk.submit(payload).await {
                Ok(task_id) => return Ok((SelectedTransport::Sdk(sdk), task_id)),
                Err(e) => {
                    warn!(error = %e, "SDK submission failed, falling back to HTTP");
                    metrics::record_transport_fallback("submit");
                }
            }
        }

        let http = HttpTransport::new(core);
        let task_id = http.submit(payload).await?;
        Ok((SelectedTransport::Http(http), task_id))
    }

    fn sdk_transport(&self, core: HttpCore) -> Option<SdkTransport> {
        match &self.sdk {
            SdkSource::Disabled => None,
            SdkSource::Custom(api) => Some(SdkTransport::new(Arc::clone(api), core)),
            SdkSource::Default => match SdkTransport::connect(&self.config, core) {
                Ok(sdk) => Some(sdk),
                Err(e) => {
                    warn!(error = %e, "SDK client unavailable, using HTTP");
                    metrics::record_transport_fallback("construct");
                    None
                }
            },
        }
    }
}
