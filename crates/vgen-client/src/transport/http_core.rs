//! Shared HTTP plumbing: client construction, error classification and
//! streamed downloads.

use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{body_preview, classify_error_response, GenerationError, GenerationResult};
use crate::metrics;

/// Upper bound on the buffer reserved from a download's `Content-Length`.
const MAX_DOWNLOAD_PREALLOC: u64 = 64 * 1024 * 1024;

/// Authenticated HTTP access to the API root.
#[derive(Clone)]
pub struct HttpCore {
    http: Client,
    base_url: Url,
    api_key: String,
    submit_timeout: Duration,
    status_timeout: Duration,
    download_timeout: Duration,
}

impl HttpCore {
    /// Build a client. No network traffic happens here.
    pub fn new(config: &ClientConfig, api_key: impl Into<String>) -> GenerationResult<Self> {
        // A trailing slash makes relative joins append instead of replace.
        let base_url = Url::parse(&format!("{}/", config.base_url.trim_end_matches('/')))
            .map_err(|e| GenerationError::config(format!("invalid base URL {}: {}", config.base_url, e)))?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(GenerationError::Network)?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
            submit_timeout: config.submit_timeout,
            status_timeout: config.status_timeout,
            download_timeout: config.download_timeout,
        })
    }

    /// Absolute URL for a path relative to the API root.
    pub fn endpoint(&self, path: &str) -> GenerationResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| GenerationError::config(format!("invalid endpoint path {}: {}", path, e)))
    }

    /// POST a JSON body with the submit timeout.
    pub async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> GenerationResult<Response> {
        let url = self.endpoint(path)?;
        let request = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .timeout(self.submit_timeout)
            .json(body);
        self.send("submit", request).await
    }

    /// GET a status document with the status timeout.
    pub async fn get_status(&self, path: &str) -> GenerationResult<Response> {
        let url = self.endpoint(path)?;
        let request = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .timeout(self.status_timeout);
        self.send("fetch_status", request).await
    }

    /// Parse a successful response body, or classify a failed one.
    pub async fn read_json(&self, response: Response) -> GenerationResult<Value> {
        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Turn a non-success response into a classified error.
    pub async fn error_from_response(&self, response: Response) -> GenerationError {
        let (status, body) = self.log_failure(response).await;
        classify_error_response(status, &body)
    }

    /// Log a failed response and hand back its status and body.
    pub async fn log_failure(&self, response: Response) -> (u16, String) {
        let status = response.status().as_u16();
        let url = response.url().clone();
        let body = response.text().await.unwrap_or_default();

        warn!(
            status,
            url = %url,
            body = %body_preview(&body),
            "Generation API request failed"
        );
        (status, body)
    }

    /// Stream a result file. The URL is pre-signed, so no auth header is sent.
    pub async fn download(&self, url: &str) -> GenerationResult<Vec<u8>> {
        let request = self.http.get(url).timeout(self.download_timeout);
        let response = self.send("download", request).await?;

        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }

        // The header is server-controlled; a bogus value must not size the buffer.
        let capacity = response
            .content_length()
            .map_or(0, |len| len.min(MAX_DOWNLOAD_PREALLOC) as usize);
        let mut bytes = Vec::with_capacity(capacity);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk?);
        }

        debug!(bytes = bytes.len(), "Downloaded result");
        Ok(bytes)
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> GenerationResult<Response> {
        let start = Instant::now();
        let result = request.send().await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(response) => {
                metrics::record_request(operation, response.status().as_str(), latency_ms);
                Ok(response)
            }
            Err(e) => {
                let status = if e.is_timeout() { "timeout" } else { "error" };
                metrics::record_request(operation, status, latency_ms);
                Err(GenerationError::Network(e))
            }
        }
    }
}

impl std::fmt::Debug for HttpCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCore")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join_keeps_base_path() {
        let config = ClientConfig::default().with_base_url("https://example.com/api/v3");
        let core = HttpCore::new(&config, "k").unwrap();
        assert_eq!(
            core.endpoint("contents/generations/tasks").unwrap().as_str(),
            "https://example.com/api/v3/contents/generations/tasks"
        );
        assert_eq!(
            core.endpoint("/tasks/abc").unwrap().as_str(),
            "https://example.com/api/v3/tasks/abc"
        );
    }

    #[tokio::test]
    async fn test_download_ignores_oversized_content_length() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1152921504606846976\r\n\r\nabc")
                .await
                .unwrap();
        });

        let core = HttpCore::new(&ClientConfig::default(), "k").unwrap();
        let result = core.download(&format!("http://{}/result.mp4", addr)).await;
        assert!(matches!(result, Err(GenerationError::Network(_))));
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ClientConfig::default().with_base_url("not a url");
        assert!(matches!(
            HttpCore::new(&config, "k"),
            Err(GenerationError::Config(_))
        ));
    }
}
