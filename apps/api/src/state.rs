use std::sync::Arc;

use crate::config::Config;
use crate::critique::CritiquePipeline;
use crate::extract::TextExtractor;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Backend is chosen once at startup; handlers never see which one.
    pub pipeline: CritiquePipeline,
    /// Upload-to-text step. Default: PdfTextExtractor.
    pub extractor: Arc<dyn TextExtractor>,
    pub config: Config,
}
