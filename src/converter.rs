//! The contract between the service and a conversion engine.
//!
//! The service never looks inside an engine. It needs two things:
//!
//! * a [`ConverterFactory`] that performs the expensive construction once
//!   (loading libraries, resolving providers) and names the engine, and
//! * the [`DocumentConverter`] it produces, which turns a PDF on disk into a
//!   [`RenderedDocument`] and may be called concurrently.
//!
//! Both halves are object-safe so the lifecycle manager can hold them as
//! `Arc<dyn …>` and tests can substitute stub engines.

use crate::error::{ConstructionError, ConversionError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Shared reference to the single constructed converter.
pub type ConverterHandle = Arc<dyn DocumentConverter>;

/// A constructed, ready-to-use conversion engine.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert the PDF at `pdf_path` to Markdown.
    async fn convert(&self, pdf_path: &Path) -> Result<RenderedDocument, ConversionError>;
}

/// Builds a [`DocumentConverter`]. Called at most once per successful load.
#[async_trait]
pub trait ConverterFactory: Send + Sync {
    /// Short identifier reported as the `source`/`engine` of responses.
    fn engine_name(&self) -> &str;

    /// Perform the expensive construction.
    async fn create(&self) -> Result<ConverterHandle, ConstructionError>;
}

/// One page of converter output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPage {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Markdown for this page. Empty when the page failed.
    pub markdown: String,
}

/// What a converter returns for one document.
///
/// Both fields are optional: an engine that only produces per-page output
/// leaves `markdown` unset, and one that cannot report pages leaves `pages`
/// unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedDocument {
    pub markdown: Option<String>,
    pub pages: Option<Vec<RenderedPage>>,
}

impl RenderedDocument {
    /// Document-level Markdown, or the [`Display`](fmt::Display) rendering
    /// when the engine did not provide it.
    pub fn markdown_text(&self) -> String {
        match &self.markdown {
            Some(markdown) => markdown.clone(),
            None => self.to_string(),
        }
    }

    /// Number of pages, when the engine reported them.
    pub fn page_count(&self) -> Option<usize> {
        self.pages.as_ref().map(Vec::len)
    }
}

impl fmt::Display for RenderedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(markdown) = &self.markdown {
            return f.write_str(markdown);
        }
        let Some(pages) = &self.pages else {
            return Ok(());
        };
        let mut first = true;
        for page in pages.iter().filter(|p| !p.markdown.is_empty()) {
            if !first {
                f.write_str("\n\n")?;
            }
            f.write_str(page.markdown.trim_end())?;
            first = false;
        }
        Ok(())
    }
}
