use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use tracing::{info, warn};

use crate::critique::Critique;
use crate::errors::AppError;
use crate::extract::ensure_readable;
use crate::state::AppState;

/// Multipart field carrying the PDF.
pub const UPLOAD_FIELD: &str = "file";

/// POST /roast
///
/// Multipart upload of a single PDF under `file`. Unreadable PDFs are
/// reported the same way as empty ones.
pub async fn handle_roast(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Critique>, AppError> {
    let (file_name, pdf) = read_upload(&mut multipart).await?;
    info!("Received '{}' ({} bytes)", file_name, pdf.len());

    let extractor = Arc::clone(&state.extractor);
    let extracted = tokio::task::spawn_blocking(move || extractor.extract(&pdf))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF extraction task failed: {e}")))?;
    let text = extracted.unwrap_or_else(|e| {
        warn!("PDF extraction failed for '{}': {e}", file_name);
        String::new()
    });

    let resume_text = ensure_readable(&text)?;
    let critique = state.pipeline.produce_critique(resume_text).await?;
    Ok(Json(critique))
}

async fn read_upload(multipart: &mut Multipart) -> Result<(String, Vec<u8>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(AppError::Validation("No selected file".to_string()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
        return Ok((file_name, bytes.to_vec()));
    }

    Err(AppError::Validation("No file uploaded".to_string()))
}
