//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "ARK_API_KEY";

/// Client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Fallback API key when a request carries none
    pub api_key: Option<String>,
    /// API root, without trailing slash
    pub base_url: String,
    /// Delay between status reads
    pub poll_interval: Duration,
    /// Total time allowed from submission to a result URL
    pub poll_timeout: Duration,
    /// Per-request timeout for task creation
    pub submit_timeout: Duration,
    /// Per-request timeout for status reads
    pub status_timeout: Duration,
    /// Per-request timeout for result downloads
    pub download_timeout: Duration,
    /// Where downloaded results are written
    pub output_dir: PathBuf,
    /// Where relative input paths are looked up
    pub input_dir: PathBuf,
    /// File name prefix for downloaded results
    pub result_prefix: String,
    pub user_agent: String,
    /// Try the typed client before raw HTTP
    pub prefer_sdk: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(600),
            submit_timeout: Duration::from_secs(60),
            status_timeout: Duration::from_secs(10),
            download_timeout: Duration::from_secs(300),
            output_dir: PathBuf::from("./output"),
            input_dir: PathBuf::from("./input"),
            result_prefix: "doubao".to_string(),
            user_agent: concat!("vgen-client/", env!("CARGO_PKG_VERSION")).to_string(),
            prefer_sdk: true,
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            api_key: std::env::var(API_KEY_ENV)
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            base_url: std::env::var("VGEN_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            poll_interval: env_secs("VGEN_POLL_INTERVAL_SECS", defaults.poll_interval),
            poll_timeout: env_secs("VGEN_POLL_TIMEOUT_SECS", defaults.poll_timeout),
            submit_timeout: env_secs("VGEN_SUBMIT_TIMEOUT_SECS", defaults.submit_timeout),
            status_timeout: env_secs("VGEN_STATUS_TIMEOUT_SECS", defaults.status_timeout),
            download_timeout: env_secs("VGEN_DOWNLOAD_TIMEOUT_SECS", defaults.download_timeout),
            output_dir: std::env::var("VGEN_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            input_dir: std::env::var("VGEN_INPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.input_dir),
            result_prefix: std::env::var("VGEN_RESULT_PREFIX").unwrap_or(defaults.result_prefix),
            user_agent: std::env::var("VGEN_USER_AGENT").unwrap_or(defaults.user_agent),
            prefer_sdk: std::env::var("VGEN_USE_SDK")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.prefer_sdk),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    pub fn with_prefer_sdk(mut self, prefer_sdk: bool) -> Self {
        self.prefer_sdk = prefer_sdk;
        self
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .field("poll_timeout", &self.poll_timeout)
            .field("submit_timeout", &self.submit_timeout)
            .field("status_timeout", &self.status_timeout)
            .field("download_timeout", &self.download_timeout)
            .field("output_dir", &self.output_dir)
            .field("input_dir", &self.input_dir)
            .field("result_prefix", &self.result_prefix)
            .field("user_agent", &self.user_agent)
            .field("prefer_sdk", &self.prefer_sdk)
            .finish()
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.poll_timeout, Duration::from_secs(600));
        assert_eq!(config.submit_timeout, Duration::from_secs(60));
        assert_eq!(config.status_timeout, Duration::from_secs(10));
        assert_eq!(config.result_prefix, "doubao");
    }

    #[test]
    fn test_builder_trims_base_url_and_redacts_key() {
        let config = ClientConfig::default()
            .with_base_url("http://localhost:9000/api/v3/")
            .with_api_key("secret-key-value-123456");
        assert_eq!(config.base_url, "http://localhost:9000/api/v3");
        assert!(!format!("{:?}", config).contains("secret-key"));
    }
}
