//! PDF text extraction and the minimum-content gate in front of the pipeline.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::errors::PipelineError;

/// Fewer non-whitespace characters than this means an empty or scanned PDF.
pub const MIN_TEXT_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to extract PDF text: {0}")]
    Pdf(String),
}

/// Turns an uploaded document into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// Default extractor backed by `pdf-extract`.
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        extract_text_from_bytes(bytes)
    }
}

pub fn extract_text_from_bytes(bytes: &[u8]) -> Result<String, ExtractError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    debug!(
        "Extracted {} chars from {} byte PDF",
        text.len(),
        bytes.len()
    );
    Ok(text)
}

pub fn extract_text_from_path(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path)?;
    extract_text_from_bytes(&bytes)
}

/// Returns the trimmed text when it carries enough content to roast.
pub fn ensure_readable(text: &str) -> Result<&str, PipelineError> {
    let found = text.chars().filter(|c| !c.is_whitespace()).count();
    if found < MIN_TEXT_CHARS {
        return Err(PipelineError::InsufficientText {
            found,
            required: MIN_TEXT_CHARS,
        });
    }
    Ok(text.trim())
}
