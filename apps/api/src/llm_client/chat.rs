//! OpenAI-compatible chat completion backend (Ollama, vLLM, llama.cpp server, OpenAI).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompts::{ChatMessage, Prompt, PromptEncoding};
use super::{build_http_client, read_json, HttpSettings, LlmError, ModelBackend};

pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
pub const CHAT_TEMPERATURE: f32 = 0.8;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct ChatCompletionBackend {
    client: Client,
    settings: HttpSettings,
}

impl ChatCompletionBackend {
    pub fn new(settings: HttpSettings) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_http_client(settings.timeout)?,
            settings,
        })
    }
}

#[async_trait]
impl ModelBackend for ChatCompletionBackend {
    fn name(&self) -> &'static str {
        "chat"
    }

    fn encoding(&self) -> PromptEncoding {
        PromptEncoding::Chat
    }

    async fn invoke(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let Prompt::Chat(messages) = prompt else {
            return Err(LlmError::UnsupportedPrompt(prompt.encoding()));
        };

        let body = ChatRequest {
            model: &self.settings.model,
            messages,
            temperature: CHAT_TEMPERATURE,
            stream: false,
        };

        let mut request = self
            .client
            .post(self.settings.endpoint(CHAT_COMPLETIONS_PATH))
            .json(&body);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }

        let response: ChatResponse = read_json(request.send().await?).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyContent)?;

        debug!("Chat completion returned {} chars", content.len());
        Ok(content)
    }
}
