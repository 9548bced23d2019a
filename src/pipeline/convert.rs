//! Convert step
//!
//! Turns the raw upload into a UTF-8 text file at
//! `processed_text/{base}.txt` via the extractor registry. Any partial
//! output is removed on failure so reruns start clean.

use super::{PipelineContext, Step};
use crate::error::{Error, Result};
use crate::extract::ExtractorRegistry;
use std::sync::Arc;

pub struct ConvertStep {
    registry: Arc<ExtractorRegistry>,
}

impl ConvertStep {
    pub fn new(registry: Arc<ExtractorRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait::async_trait]
impl Step for ConvertStep {
    fn name(&self) -> &'static str {
        "convert"
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<String> {
        let output_path = ctx
            .paths
            .processed_text
            .join(format!("{}.txt", ctx.basename()));

        let registry = Arc::clone(&self.registry);
        let mime = ctx.mime_type.clone();
        let input = ctx.input_path.clone();

        // Extraction parses whole files; keep it off the async workers.
        let text = tokio::task::spawn_blocking(move || registry.extract(&mime, &input))
            .await
            .map_err(|e| Error::ExtractionFailed {
                path: ctx.input_path.clone(),
                reason: format!("extraction task panicked: {}", e),
            })??;

        if let Err(e) = tokio::fs::write(&output_path, &text).await {
            let _ = tokio::fs::remove_file(&output_path).await;
            return Err(e.into());
        }

        ctx.converted_text_path = Some(output_path.clone());
        ctx.attributes.insert(
            "converted_text_path".to_string(),
            output_path.to_string_lossy().to_string(),
        );

        Ok(format!("extracted {} characters", text.chars().count()))
    }
}
