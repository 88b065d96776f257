//! Error types for video generation.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use vgen_media::MediaError;
use vgen_storage::StorageError;

/// Result type for generation operations.
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Maximum number of characters of a response body kept in logs.
pub const BODY_PREVIEW_CHARS: usize = 500;

/// Errors that can occur while generating a video.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Model or endpoint not found: {model}. Check the model name or custom endpoint id")]
    ModelNotFound { model: String },

    #[error("Authentication failed: {message}")]
    Authentication {
        code: Option<String>,
        message: String,
    },

    #[error("Content rejected by safety review ({code}): {message}")]
    ContentPolicy { code: String, message: String },

    #[error("Generation failed: {}", failure_summary(.payload))]
    GenerationFailed { payload: Value },

    #[error("No result after waiting {waited_secs} seconds")]
    Timeout { waited_secs: u64 },

    #[error("Failed to decode result: {0}")]
    Decode(String),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GenerationError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Errors that end a polling loop instead of being retried.
    pub fn stops_polling(&self) -> bool {
        matches!(
            self,
            GenerationError::Authentication { .. }
                | GenerationError::ContentPolicy { .. }
                | GenerationError::GenerationFailed { .. }
                | GenerationError::Validation(_)
                | GenerationError::Cancelled
        )
    }

    /// Short machine-readable kind, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Validation(_) => "validation",
            GenerationError::Transport(_) => "transport",
            GenerationError::Api { .. } => "api",
            GenerationError::ModelNotFound { .. } => "model_not_found",
            GenerationError::Authentication { .. } => "authentication",
            GenerationError::ContentPolicy { .. } => "content_policy",
            GenerationError::GenerationFailed { .. } => "generation_failed",
            GenerationError::Timeout { .. } => "timeout",
            GenerationError::Decode(_) => "decode",
            GenerationError::Cancelled => "cancelled",
            GenerationError::Network(_) => "network",
            GenerationError::Json(_) => "json",
            GenerationError::Media(_) => "media",
            GenerationError::Storage(_) => "storage",
            GenerationError::Config(_) => "config",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Classify a non-success response from the generation API.
///
/// Bodies of the form `{"error": {"code", "message"}}` are inspected for
/// sensitive-content and authentication codes. Unparseable bodies fall back
/// to the HTTP status.
pub fn classify_error_response(status: u16, body: &str) -> GenerationError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) => {
            let message = error.message.unwrap_or_default();
            match error.code {
                Some(code) if code.ends_with("SensitiveContentDetected") => {
                    GenerationError::ContentPolicy { code, message }
                }
                Some(code) if code == "AuthenticationError" => GenerationError::Authentication {
                    code: Some(code),
                    message,
                },
                code if status == 401 => GenerationError::Authentication { code, message },
                code => GenerationError::Api {
                    status,
                    code,
                    message,
                },
            }
        }
        Err(_) if status == 401 => GenerationError::Authentication {
            code: None,
            message: body_preview(body),
        },
        Err(_) => GenerationError::Api {
            status,
            code: None,
            message: body.to_string(),
        },
    }
}

/// Truncate a response body for logging.
pub fn body_preview(body: &str) -> String {
    if body.chars().count() <= BODY_PREVIEW_CHARS {
        return body.to_string();
    }
    let mut preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

/// Human-readable reason from a failed task payload.
fn failure_summary(payload: &Value) -> String {
    let error = payload
        .pointer("/data/error")
        .or_else(|| payload.get("error"))
        .filter(|e| !e.is_null());

    match error {
        Some(error) => {
            let code = error.get("code").and_then(Value::as_str);
            let message = error.get("message").and_then(Value::as_str);
            match (code, message) {
                (Some(code), Some(message)) => format!("{}: {}", code, message),
                (None, Some(message)) => message.to_string(),
                (Some(code), None) => code.to_string(),
                (None, None) => body_preview(&error.to_string()),
            }
        }
        None => body_preview(&payload.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_sensitive_content() {
        let body = r#"{"error":{"code":"InputImageSensitiveContentDetected","message":"image rejected"}}"#;
        match classify_error_response(400, body) {
            GenerationError::ContentPolicy { code, message } => {
                assert_eq!(code, "InputImageSensitiveContentDetected");
                assert_eq!(message, "image rejected");
            }
            other => panic!("unexpected: {:?}", other),
        }

        let body = r#"{"error":{"code":"OutputVideoSensitiveContentDetected","message":"x"}}"#;
        assert!(matches!(
            classify_error_response(400, body),
            GenerationError::ContentPolicy { .. }
        ));
    }

    #[test]
    fn test_classify_authentication() {
        let body = r#"{"error":{"code":"AuthenticationError","message":"bad key"}}"#;
        assert!(matches!(
            classify_error_response(401, body),
            GenerationError::Authentication { .. }
        ));

        // Code alone is enough, whatever the status.
        assert!(matches!(
            classify_error_response(403, body),
            GenerationError::Authentication { .. }
        ));

        assert!(matches!(
            classify_error_response(401, "<html>unauthorized</html>"),
            GenerationError::Authentication { code: None, .. }
        ));
    }

    #[test]
    fn test_classify_generic() {
        let body = r#"{"error":{"code":"InternalServiceError","message":"boom"}}"#;
        match classify_error_response(500, body) {
            GenerationError::Api { status, code, message } => {
                assert_eq!(status, 500);
                assert_eq!(code.as_deref(), Some("InternalServiceError"));
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected: {:?}", other),
        }

        match classify_error_response(502, "bad gateway") {
            GenerationError::Api { code, message, .. } => {
                assert!(code.is_none());
                assert_eq!(message, "bad gateway");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_body_preview_truncates() {
        let long = "x".repeat(BODY_PREVIEW_CHARS + 10);
        let preview = body_preview(&long);
        assert_eq!(preview.len(), BODY_PREVIEW_CHARS + 3);
        assert_eq!(body_preview("short"), "short");
    }

    #[test]
    fn test_generation_failed_message() {
        let err = GenerationError::GenerationFailed {
            payload: json!({"data": {"status": "failed", "error": {"code": "E1", "message": "no gpu"}}}),
        };
        assert_eq!(err.to_string(), "Generation failed: E1: no gpu");
        assert!(err.stops_polling());
        assert!(!GenerationError::transport("reset").stops_polling());
    }
}
