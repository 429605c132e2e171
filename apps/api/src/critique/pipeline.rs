//! Critique pipeline — the single entry point shared by the web and CLI front ends.
//!
//! Flow: build prompt → backend.invoke → sanitize → parse.
//!
//! The first failing stage short-circuits. Nothing is retried here; a failed
//! backend call is reported straight back to the caller.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::critique::parser::{parse_critique, ParseError};
use crate::critique::sanitizer::sanitize;
use crate::critique::Critique;
use crate::errors::PipelineError;
use crate::llm_client::prompts::PromptBuilder;
use crate::llm_client::ModelBackend;

#[derive(Clone)]
pub struct CritiquePipeline {
    backend: Arc<dyn ModelBackend>,
    prompts: PromptBuilder,
}

impl CritiquePipeline {
    /// The prompt encoding follows whatever the backend consumes.
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        let prompts = PromptBuilder::new(backend.encoding());
        Self { backend, prompts }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Produces a critique for already-extracted resume text.
    ///
    /// The minimum-length check is the caller's job (see `extract::ensure_readable`).
    pub async fn produce_critique(&self, resume_text: &str) -> Result<Critique, PipelineError> {
        let prompt = self.prompts.build(resume_text);
        info!(
            "Requesting critique from '{}' backend ({} chars of resume text)",
            self.backend.name(),
            resume_text.len()
        );

        let raw = self
            .backend
            .invoke(&prompt)
            .await
            .map_err(|e| PipelineError::from_backend(self.backend.name(), e))?;
        debug!("Raw model output: {}", raw);

        let critique = parse_critique(&sanitize(&raw)).map_err(|e| {
            warn!("Model output rejected: {e}");
            match e {
                ParseError::InvalidFormat { message, .. } => PipelineError::InvalidOutputFormat {
                    message,
                    raw_output: raw.clone(),
                },
                ParseError::Schema { message, fragment } => PipelineError::SchemaViolation {
                    message,
                    fragment,
                    raw_output: raw.clone(),
                },
            }
        })?;

        info!("Critique produced (rating {})", critique.rating);
        Ok(critique)
    }
}
