//! Request handling: stage, convert, measure.
//!
//! ```text
//! bytes ──▶ StagedFile ──▶ acquire() ──▶ convert(path) ──▶ StructureStats
//!            (.pdf temp)   (may wait)     (engine)          (headings)
//! ```
//!
//! The staged file lives exactly as long as [`ConversionService::handle`];
//! every error path drops it before returning.

use crate::converter::RenderedDocument;
use crate::error::ServiceError;
use crate::lifecycle::ConverterLifecycle;
use crate::staging::StagedFile;
use crate::structure::StructureStats;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Outcome of one successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub markdown: String,
    pub pages_count: Option<usize>,
    /// Wall-clock time of engine acquisition plus conversion.
    pub processing_time_ms: u64,
    pub stats: StructureStats,
}

impl ConversionResult {
    /// Build the result from converter output and the measured duration.
    pub fn from_rendered(rendered: &RenderedDocument, processing_time_ms: u64) -> Self {
        let markdown = rendered.markdown_text();
        let stats = StructureStats::from_markdown(&markdown);
        Self {
            markdown,
            pages_count: rendered.page_count(),
            processing_time_ms,
            stats,
        }
    }

    pub fn has_structure(&self) -> bool {
        self.stats.has_structure()
    }
}

/// Converts PDF bytes using the shared engine.
#[derive(Clone)]
pub struct ConversionService {
    lifecycle: ConverterLifecycle,
    staging_dir: Option<PathBuf>,
}

impl ConversionService {
    pub fn new(lifecycle: ConverterLifecycle) -> Self {
        Self {
            lifecycle,
            staging_dir: None,
        }
    }

    /// Stage uploads in `dir` instead of the system temp dir.
    pub fn with_staging_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.staging_dir = dir;
        self
    }

    pub fn lifecycle(&self) -> &ConverterLifecycle {
        &self.lifecycle
    }

    /// Convert `raw_bytes` to Markdown.
    ///
    /// # Errors
    /// - [`ServiceError::Staging`] if the temp file cannot be written
    /// - [`ServiceError::Construction`] if the engine cannot be built
    /// - [`ServiceError::Conversion`] if the engine fails on this document
    pub async fn handle(&self, raw_bytes: &[u8]) -> Result<ConversionResult, ServiceError> {
        let staged = StagedFile::write(raw_bytes, self.staging_dir.as_deref())?;

        let start = Instant::now();
        let converter = self.lifecycle.acquire().await?;
        let rendered = converter.convert(staged.path()).await?;
        let processing_time_ms = start.elapsed().as_millis() as u64;

        staged.remove();

        let result = ConversionResult::from_rendered(&rendered, processing_time_ms);
        info!(
            pages = ?result.pages_count,
            h1 = result.stats.h1_count,
            h2 = result.stats.h2_count,
            h3 = result.stats.h3_count,
            "Converted {} bytes in {}ms",
            raw_bytes.len(),
            processing_time_ms
        );
        Ok(result)
    }
}
