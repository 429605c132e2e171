//! Single-prompt generate backend (Ollama `/api/generate`).
//!
//! The prompt is already rendered with role delimiters, so the request is sent
//! with `raw: true` to stop the server from applying its own chat template.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompts::{Prompt, PromptEncoding};
use super::{build_http_client, read_json, HttpSettings, LlmError, ModelBackend};

pub const GENERATE_PATH: &str = "/api/generate";
/// Large enough that long resumes are not truncated by the default 2048 window.
pub const CONTEXT_WINDOW: u32 = 8192;
pub const GENERATE_TEMPERATURE: f32 = 0.8;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    raw: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_ctx: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct RawGenerateBackend {
    client: Client,
    settings: HttpSettings,
    force_json: bool,
}

impl RawGenerateBackend {
    pub fn new(settings: HttpSettings) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_http_client(settings.timeout)?,
            settings,
            force_json: true,
        })
    }

    /// Toggles the `"format": "json"` hint. On by default.
    pub fn with_force_json(mut self, force_json: bool) -> Self {
        self.force_json = force_json;
        self
    }
}

#[async_trait]
impl ModelBackend for RawGenerateBackend {
    fn name(&self) -> &'static str {
        "generate"
    }

    fn encoding(&self) -> PromptEncoding {
        PromptEncoding::Instruct
    }

    async fn invoke(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let Prompt::Instruct(text) = prompt else {
            return Err(LlmError::UnsupportedPrompt(prompt.encoding()));
        };

        let body = GenerateRequest {
            model: &self.settings.model,
            prompt: text,
            stream: false,
            raw: true,
            format: self.force_json.then_some("json"),
            options: GenerateOptions {
                num_ctx: CONTEXT_WINDOW,
                temperature: GENERATE_TEMPERATURE,
            },
        };

        let mut request = self
            .client
            .post(self.settings.endpoint(GENERATE_PATH))
            .json(&body);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }

        let response: GenerateResponse = read_json(request.send().await?).await?;
        debug!("Generate returned {} chars", response.response.len());
        Ok(response.response)
    }
}
