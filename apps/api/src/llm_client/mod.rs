//! LLM Client — every model call in the roaster goes through a [`ModelBackend`].
//!
//! Three interchangeable backends are provided:
//! - [`ChatCompletionBackend`]: OpenAI-compatible `/v1/chat/completions`
//! - [`RawGenerateBackend`]: single-prompt `/api/generate` with a JSON format hint
//! - [`LocalInferenceBackend`]: in-process generation over a preloaded [`LocalModel`]
//!
//! The backend is selected once from configuration and shared behind
//! `Arc<dyn ModelBackend>`; callers never know which transport is in use.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, warn};

pub mod chat;
pub mod generate;
pub mod local;
pub mod prompts;

#[cfg(test)]
pub(crate) mod test_support;

pub use chat::ChatCompletionBackend;
pub use generate::RawGenerateBackend;
pub use local::{EngineLoader, LocalInferenceBackend, LocalModel};

use crate::config::BackendConfig;
use prompts::{Prompt, PromptEncoding};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Prompt encoding {0:?} is not accepted by this backend")]
    UnsupportedPrompt(PromptEncoding),

    #[error("Inference error: {0}")]
    Inference(String),
}

impl LlmError {
    /// True when the backend could not be reached or was never initialised,
    /// as opposed to a call that reached the model and then failed.
    pub fn is_unavailable(&self) -> bool {
        match self {
            LlmError::Unavailable(_) => true,
            LlmError::Http(e) => e.is_connect(),
            // 404: model not pulled on the server. 503: server still loading.
            LlmError::Api { status, .. } => matches!(status, 404 | 503),
            _ => false,
        }
    }
}

/// Which backend implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    Chat,
    Generate,
    Local,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Chat => "chat",
            BackendKind::Generate => "generate",
            BackendKind::Local => "local",
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chat" | "openai" => Ok(BackendKind::Chat),
            "generate" | "ollama" => Ok(BackendKind::Generate),
            "local" => Ok(BackendKind::Local),
            other => Err(format!(
                "unknown backend '{other}' (expected chat, generate or local)"
            )),
        }
    }
}

/// A way of getting a model's raw text response to a prompt.
///
/// Implementations must not retry; retry policy belongs to the caller.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Short name for logs and error reports.
    fn name(&self) -> &'static str;

    /// The prompt shape this backend consumes.
    fn encoding(&self) -> PromptEncoding;

    async fn invoke(&self, prompt: &Prompt) -> Result<String, LlmError>;
}

/// Connection settings shared by the HTTP backends.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl HttpSettings {
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, LlmError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Reads a response body, turning non-success statuses into [`LlmError::Api`].
pub(crate) async fn read_json<R: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<R, LlmError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        warn!("LLM API returned {}: {}", status, body);
        return Err(LlmError::Api {
            status: status.as_u16(),
            message: api_error_message(&body).unwrap_or(body),
        });
    }

    Ok(serde_json::from_str(&body)?)
}

/// Pulls the message out of `{"error": {"message": ..}}` (OpenAI) or
/// `{"error": ".."}` (Ollama) error bodies.
fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(String::from)
}

/// Builds the configured backend.
///
/// `local_model` is the preloaded model for [`BackendKind::Local`]; when it is
/// `None` the local backend is still returned but reports itself unavailable
/// on every call.
pub fn build_backend(
    config: &BackendConfig,
    local_model: Option<Arc<LocalModel>>,
) -> Result<Arc<dyn ModelBackend>, LlmError> {
    let backend: Arc<dyn ModelBackend> = match config.kind {
        BackendKind::Chat => Arc::new(ChatCompletionBackend::new(config.http.clone())?),
        BackendKind::Generate => Arc::new(
            RawGenerateBackend::new(config.http.clone())?.with_force_json(config.force_json),
        ),
        BackendKind::Local => match local_model {
            Some(model) => Arc::new(LocalInferenceBackend::new(model)),
            None => {
                warn!(
                    "Local backend selected but no model is loaded (weights: {}); calls will fail",
                    config
                        .local_model_path
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "unset".to_string())
                );
                Arc::new(LocalInferenceBackend::uninitialized())
            }
        },
    };

    info!(
        "Model backend initialized: {} (model: {})",
        backend.name(),
        config.http.model
    );
    Ok(backend)
}

/// Loads the process-wide local model described by `config`.
///
/// Call once at startup and pass the result to [`build_backend`].
pub fn load_local_model(
    config: &BackendConfig,
    loader: &dyn EngineLoader,
) -> Result<Arc<LocalModel>, LlmError> {
    let weights = config
        .local_model_path
        .as_deref()
        .ok_or_else(|| LlmError::Unavailable("LOCAL_MODEL_PATH is not set".to_string()))?;
    Ok(Arc::new(LocalModel::load(
        loader,
        weights,
        config.local_device,
    )?))
}
