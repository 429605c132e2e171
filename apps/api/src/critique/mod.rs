// Roast critique: output model plus the stages that turn raw model text into it.
// Flow: PromptBuilder → ModelBackend → sanitizer → parser, driven by pipeline.

pub mod parser;
pub mod pipeline;
pub mod sanitizer;

use serde::{Deserialize, Serialize};

pub use parser::{parse_critique, ParseError};
pub use pipeline::CritiquePipeline;
pub use sanitizer::sanitize;

/// Placeholder used when the model omits `roast_critique`.
pub const MISSING_ROAST: &str = "No roast generated.";

/// A validated roast of one resume.
///
/// `rating` is 1–10 when the model complied. 0 marks a rating the parser had
/// to give up on (missing, or a string it could not read).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Critique {
    pub roast_critique: String,
    pub professional_suggestions: Vec<String>,
    pub rating: u8,
}

/// Display band for a rating, used by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingBand {
    Strong,
    Middling,
    Weak,
}

impl Critique {
    pub fn rating_band(&self) -> RatingBand {
        match self.rating {
            8.. => RatingBand::Strong,
            5..=7 => RatingBand::Middling,
            _ => RatingBand::Weak,
        }
    }
}
