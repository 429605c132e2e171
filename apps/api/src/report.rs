//! Plain-text rendering of critiques and failures for the terminal.

use crate::critique::{Critique, RatingBand};
use crate::errors::{ErrorKind, PipelineError};

pub const BANNER: &str = "🔥 RESUME ROAST MASTER 🔥";

pub fn render_critique(critique: &Critique) -> String {
    let band = match critique.rating_band() {
        RatingBand::Strong => "strong",
        RatingBand::Middling => "middling",
        RatingBand::Weak => "weak",
    };

    let mut out = format!("RATING: {}/10 ({band})\n\n", critique.rating);
    out.push_str(&panel("💀 The Critique", &critique.roast_critique));
    out.push_str("\n✨ Professional Fixes:\n");
    if critique.professional_suggestions.is_empty() {
        out.push_str("  (none given)\n");
    }
    for tip in &critique.professional_suggestions {
        out.push_str(&format!("  ✅ {tip}\n"));
    }
    out
}

/// Failure panel. Format failures also echo the model's raw text.
pub fn render_failure(err: &PipelineError) -> String {
    let title = match err.kind() {
        ErrorKind::InsufficientText => "⚠️ Warning",
        ErrorKind::ModelUnavailable => "❌ Model Unavailable",
        ErrorKind::ModelInvocationFailed => "❌ Model Error",
        ErrorKind::InvalidOutputFormat => "❌ The model output invalid JSON",
        ErrorKind::SchemaViolation => "❌ The model output the wrong shape",
    };

    let mut out = panel(title, &err.to_string());
    if let Some(raw) = err.raw_output() {
        out.push_str("\nRaw Output:\n");
        out.push_str(raw);
        out.push('\n');
    }
    out
}

fn panel(title: &str, body: &str) -> String {
    let rule = "─".repeat(60);
    let mut out = format!("┌ {title}\n│\n");
    for line in body.lines() {
        out.push_str(&format!("│ {line}\n"));
    }
    out.push_str(&format!("│\n└{rule}\n"));
    out
}
