use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::llm_client::LlmError;

/// Failure classes a caller can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InsufficientText,
    ModelUnavailable,
    ModelInvocationFailed,
    InvalidOutputFormat,
    SchemaViolation,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InsufficientText => "INSUFFICIENT_TEXT",
            ErrorKind::ModelUnavailable => "MODEL_UNAVAILABLE",
            ErrorKind::ModelInvocationFailed => "MODEL_INVOCATION_FAILED",
            ErrorKind::InvalidOutputFormat => "INVALID_OUTPUT_FORMAT",
            ErrorKind::SchemaViolation => "SCHEMA_VIOLATION",
        }
    }
}

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    Invocation,
    Parsing,
}

/// Error returned by `CritiquePipeline::produce_critique` and the text
/// extraction gate in front of it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Could not read text: extracted {found} characters, need at least {required}")]
    InsufficientText { found: usize, required: usize },

    #[error("Model backend '{backend}' is unavailable: {source}")]
    ModelUnavailable {
        backend: &'static str,
        #[source]
        source: LlmError,
    },

    #[error("Model backend '{backend}' failed: {source}")]
    ModelInvocationFailed {
        backend: &'static str,
        #[source]
        source: LlmError,
    },

    #[error("Model output is not valid JSON: {message}")]
    InvalidOutputFormat { message: String, raw_output: String },

    #[error("Model output does not match the critique schema: {message}")]
    SchemaViolation {
        message: String,
        fragment: Value,
        raw_output: String,
    },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InsufficientText { .. } => ErrorKind::InsufficientText,
            PipelineError::ModelUnavailable { .. } => ErrorKind::ModelUnavailable,
            PipelineError::ModelInvocationFailed { .. } => ErrorKind::ModelInvocationFailed,
            PipelineError::InvalidOutputFormat { .. } => ErrorKind::InvalidOutputFormat,
            PipelineError::SchemaViolation { .. } => ErrorKind::SchemaViolation,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::InsufficientText { .. } => Stage::Extraction,
            PipelineError::ModelUnavailable { .. }
            | PipelineError::ModelInvocationFailed { .. } => Stage::Invocation,
            PipelineError::InvalidOutputFormat { .. } | PipelineError::SchemaViolation { .. } => {
                Stage::Parsing
            }
        }
    }

    /// The unsanitized model text, for failures that happened after the model answered.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            PipelineError::InvalidOutputFormat { raw_output, .. }
            | PipelineError::SchemaViolation { raw_output, .. } => Some(raw_output),
            _ => None,
        }
    }

    /// Classifies a backend failure.
    pub fn from_backend(backend: &'static str, source: LlmError) -> Self {
        if source.is_unavailable() {
            PipelineError::ModelUnavailable { backend, source }
        } else {
            PipelineError::ModelInvocationFailed { backend, source }
        }
    }
}

/// Web-facing error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub const UNREADABLE_PDF_MESSAGE: &str = "Could not read text. Is this PDF empty or scanned?";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details, raw_output) = match &self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                None,
                None,
            ),
            AppError::Pipeline(e) => {
                let status = match e.kind() {
                    ErrorKind::InsufficientText => StatusCode::BAD_REQUEST,
                    ErrorKind::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                    ErrorKind::ModelInvocationFailed
                    | ErrorKind::InvalidOutputFormat
                    | ErrorKind::SchemaViolation => StatusCode::BAD_GATEWAY,
                };
                let message = match e.kind() {
                    ErrorKind::InsufficientText => UNREADABLE_PDF_MESSAGE,
                    ErrorKind::ModelUnavailable => "Model is not ready. Is the model server running?",
                    _ => "Failed to generate roast.",
                };
                if status.is_server_error() {
                    tracing::error!("Pipeline error ({:?}): {e}", e.stage());
                }
                (
                    status,
                    e.kind().code(),
                    message.to_string(),
                    Some(e.to_string()),
                    e.raw_output().map(String::from),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    None,
                    None,
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message,
        });
        if let Some(details) = details {
            error["details"] = json!(details);
        }
        if let Some(raw) = raw_output {
            error["raw_output"] = json!(raw);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_from_backend_classifies_unavailable() {
        let err = PipelineError::from_backend("chat", LlmError::Unavailable("down".into()));
        assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
        assert_eq!(err.stage(), Stage::Invocation);

        let err = PipelineError::from_backend("chat", LlmError::EmptyContent);
        assert_eq!(err.kind(), ErrorKind::ModelInvocationFailed);
    }

    #[test]
    fn test_raw_output_only_for_parse_failures() {
        let err = PipelineError::InvalidOutputFormat {
            message: "EOF".into(),
            raw_output: "{oops".into(),
        };
        assert_eq!(err.raw_output(), Some("{oops"));
        assert_eq!(err.stage(), Stage::Parsing);

        let err = PipelineError::InsufficientText {
            found: 3,
            required: 50,
        };
        assert_eq!(err.raw_output(), None);
        assert_eq!(err.stage(), Stage::Extraction);
    }

    #[tokio::test]
    async fn test_insufficient_text_is_bad_request() {
        let response = AppError::from(PipelineError::InsufficientText {
            found: 10,
            required: 50,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INSUFFICIENT_TEXT");
        assert_eq!(body["error"]["message"], UNREADABLE_PDF_MESSAGE);
    }

    #[tokio::test]
    async fn test_invalid_output_exposes_raw_text() {
        let response = AppError::from(PipelineError::InvalidOutputFormat {
            message: "EOF while parsing".into(),
            raw_output: "```json\n{\"rating\": ".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Failed to generate roast.");
        assert_eq!(body["error"]["raw_output"], "```json\n{\"rating\": ");
        assert!(body["error"]["details"]
            .as_str()
            .unwrap()
            .contains("EOF while parsing"));
    }

    #[tokio::test]
    async fn test_unavailable_is_service_unavailable() {
        let response = AppError::from(PipelineError::from_backend(
            "generate",
            LlmError::Unavailable("connection refused".into()),
        ))
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "MODEL_UNAVAILABLE");
        assert!(body["error"].get("raw_output").is_none());
    }
}
