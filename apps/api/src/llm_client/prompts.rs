//! Prompt construction for the roast critique.
//!
//! The same task instructions are rendered either as a role-tagged chat
//! message list (OpenAI-compatible servers) or as a single Llama-3 style
//! instruction string (raw generate endpoints and in-process inference).

use serde::Serialize;

/// System instructions shared by every encoding.
pub const ROAST_SYSTEM: &str = r#"## Task
Generate a brutally honest 'roast' critique of the provided resume.

## Output Format (Strict JSON)
You must output a valid JSON object matching this exact structure:
{
    "roast_critique": "A mean, sarcastic paragraph here.",
    "professional_suggestions": [
        "Actionable tip 1",
        "Actionable tip 2",
        "Actionable tip 3"
    ],
    "rating": 5
}

## Rules
1. The "rating" field must be an INTEGER (e.g., 7), not a string.
2. Do NOT put the rating inside the suggestions list.
3. Return ONLY valid JSON."#;

/// Prefix placed in front of the resume text in the user turn.
pub const CONTEXT_PREFIX: &str = "Context:\n";

pub const BEGIN_OF_TEXT: &str = "<|begin_of_text|>";
pub const END_OF_TURN: &str = "<|eot_id|>";

/// Role header of the assistant turn. Local inference output is split on it.
pub const ASSISTANT_MARKER: &str = "<|start_header_id|>assistant<|end_header_id|>";

/// Empty assistant turn that closes an instruct prompt and cues generation.
pub const ASSISTANT_HEADER: &str = "<|start_header_id|>assistant<|end_header_id|>\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Which prompt shape a backend consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptEncoding {
    Chat,
    Instruct,
}

/// A fully rendered prompt. Built once per request and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Chat(Vec<ChatMessage>),
    Instruct(String),
}

impl Prompt {
    pub fn encoding(&self) -> PromptEncoding {
        match self {
            Prompt::Chat(_) => PromptEncoding::Chat,
            Prompt::Instruct(_) => PromptEncoding::Instruct,
        }
    }
}

/// Renders resume text into a [`Prompt`].
///
/// No validation happens here: callers enforce the minimum text length
/// before building.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    encoding: PromptEncoding,
}

impl PromptBuilder {
    pub fn new(encoding: PromptEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> PromptEncoding {
        self.encoding
    }

    pub fn build(&self, resume_text: &str) -> Prompt {
        match self.encoding {
            PromptEncoding::Chat => Prompt::Chat(chat_messages(resume_text)),
            PromptEncoding::Instruct => Prompt::Instruct(instruct_string(resume_text)),
        }
    }
}

fn chat_messages(resume_text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: Role::System,
            content: ROAST_SYSTEM.to_string(),
        },
        ChatMessage {
            role: Role::User,
            content: format!("{CONTEXT_PREFIX}{resume_text}"),
        },
    ]
}

fn instruct_string(resume_text: &str) -> String {
    format!(
        "{BEGIN_OF_TEXT}{system}{ROAST_SYSTEM}{END_OF_TURN}{user}{CONTEXT_PREFIX}{resume_text}{END_OF_TURN}{ASSISTANT_HEADER}",
        system = header("system"),
        user = header("user"),
    )
}

fn header(role: &str) -> String {
    format!("<|start_header_id|>{role}<|end_header_id|>\n\n")
}
