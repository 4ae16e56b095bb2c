//! The built-in conversion engine: pdfium rasterisation + Vision LLM.
//!
//! ## Construction (once per process)
//!
//! 1. Make sure a PDFium shared library is available. `pdfium-auto` downloads
//!    it (~30 MB) into the user cache on first run; later starts only check
//!    the path.
//! 2. Bind the library on a dedicated render thread ([`render::RenderWorker`]).
//! 3. Resolve the VLM provider from config and environment.
//!
//! ## Conversion (per document)
//!
//! ```text
//! PDF ──▶ render ──▶ encode ──▶ VLM (concurrent) ──▶ cleanup ──▶ join
//!        (worker)    (PNG/b64)   (retry/backoff)      (per page)
//! ```
//!
//! A page that fails after all retries is logged and contributes an empty
//! page; the document fails only when every page does.

pub mod cleanup;
pub mod prompts;
pub mod render;
pub mod vlm;

use crate::config::EngineConfig;
use crate::converter::{
    ConverterFactory, ConverterHandle, DocumentConverter, RenderedDocument, RenderedPage,
};
use crate::error::{ConstructionError, ConversionError, PageError};
use async_trait::async_trait;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use render::{PageImage, RenderWorker};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Name reported as `source` / `engine` by the HTTP surface.
pub const ENGINE_NAME: &str = "edgequake-vlm";

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Builds a [`VisionEngine`].
#[derive(Debug, Clone)]
pub struct VisionEngineFactory {
    config: EngineConfig,
}

impl VisionEngineFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConverterFactory for VisionEngineFactory {
    fn engine_name(&self) -> &str {
        ENGINE_NAME
    }

    async fn create(&self) -> Result<ConverterHandle, ConstructionError> {
        let library = tokio::task::spawn_blocking(locate_pdfium)
            .await
            .map_err(|e| ConstructionError::Aborted(format!("PDFium lookup task: {e}")))??;

        let renderer = RenderWorker::start(library).await?;
        let provider = resolve_provider(&self.config)?;

        Ok(Arc::new(VisionEngine {
            renderer,
            provider,
            config: self.config.clone(),
        }))
    }
}

/// A constructed engine: bound pdfium plus a VLM provider.
pub struct VisionEngine {
    renderer: RenderWorker,
    provider: Arc<dyn LLMProvider>,
    config: EngineConfig,
}

#[async_trait]
impl DocumentConverter for VisionEngine {
    async fn convert(&self, pdf_path: &Path) -> Result<RenderedDocument, ConversionError> {
        let start = Instant::now();
        let images = self
            .renderer
            .render(pdf_path, self.config.max_rendered_pixels)
            .await?;
        if images.is_empty() {
            return Err(ConversionError::EmptyDocument {
                path: pdf_path.to_path_buf(),
            });
        }
        let total = images.len();
        debug!("Rendered {} pages in {:?}", total, start.elapsed());

        let outcomes: Vec<(usize, Result<String, PageError>)> =
            stream::iter(images.into_iter().map(|page| self.transcribe(page)))
                .buffer_unordered(self.config.concurrency)
                .collect()
                .await;

        let document = assemble(outcomes, self.config.max_retries)?;
        info!("Converted {} pages in {:?}", total, start.elapsed());
        Ok(document)
    }
}

impl VisionEngine {
    async fn transcribe(&self, page: PageImage) -> (usize, Result<String, PageError>) {
        let page_num = page.index + 1;
        let image = match vlm::encode_page(&page.image) {
            Ok(image) => image,
            Err(e) => {
                return (
                    page_num,
                    Err(PageError::EncodeFailed {
                        page: page_num,
                        detail: e.to_string(),
                    }),
                )
            }
        };
        drop(page);
        let result = vlm::transcribe_page(&self.provider, page_num, image, &self.config)
            .await
            .map(|markdown| cleanup::clean_page(&markdown));
        (page_num, result)
    }
}

/// Order page outcomes and join them into one document.
///
/// Fails only when every page failed.
fn assemble(
    mut outcomes: Vec<(usize, Result<String, PageError>)>,
    retries: u32,
) -> Result<RenderedDocument, ConversionError> {
    outcomes.sort_by_key(|(page_num, _)| *page_num);

    let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
    if failed == outcomes.len() {
        let first_error = outcomes
            .iter()
            .find_map(|(_, r)| r.as_ref().err())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(ConversionError::AllPagesFailed {
            total: outcomes.len(),
            retries,
            first_error,
        });
    }

    let pages: Vec<RenderedPage> = outcomes
        .into_iter()
        .map(|(page_num, result)| {
            let markdown = result.unwrap_or_else(|e| {
                warn!("{}", e);
                String::new()
            });
            RenderedPage { page_num, markdown }
        })
        .collect();

    let body = pages
        .iter()
        .map(|p| p.markdown.trim_end())
        .filter(|md| !md.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    let markdown = if body.is_empty() {
        body
    } else {
        format!("{body}\n")
    };

    Ok(RenderedDocument {
        markdown: Some(markdown),
        pages: Some(pages),
    })
}

/// Find the PDFium library, downloading it into the cache if needed.
fn locate_pdfium() -> Result<PathBuf, ConstructionError> {
    const STEP: u64 = 5 * 1024 * 1024;
    let reported = Cell::new(0u64);
    let progress = |downloaded: u64, total: Option<u64>| {
        if downloaded >= reported.get() + STEP {
            reported.set(downloaded);
            match total {
                Some(t) => debug!("Downloading PDFium: {}/{} bytes", downloaded, t),
                None => debug!("Downloading PDFium: {} bytes", downloaded),
            }
        }
    };

    if !pdfium_auto::is_pdfium_cached() {
        info!("PDFium not cached; downloading to {}", pdfium_auto::pdfium_cache_dir().display());
    }
    pdfium_auto::ensure_pdfium_library(Some(&progress))
        .map_err(|e| ConstructionError::PdfiumUnavailable(e.to_string()))
}

/// Which provider to build, decided before anything is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ProviderChoice {
    Named { provider: String, model: String },
    AutoDetect,
}

/// Pick the VLM provider, from most-specific to least-specific.
///
/// 1. Named provider (`provider_name`) with the configured model or
///    [`DEFAULT_MODEL`].
/// 2. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, only when both are set.
///    A provider without a model falls through, since the default model
///    belongs to OpenAI.
/// 3. OpenAI when `OPENAI_API_KEY` is set.
/// 4. `ProviderFactory::from_env()` auto-detection.
fn choose_provider<F>(config: &EngineConfig, env: F) -> ProviderChoice
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());
    let model = || config.model.as_deref().unwrap_or(DEFAULT_MODEL).to_string();

    if let Some(ref name) = config.provider_name {
        return ProviderChoice::Named {
            provider: name.clone(),
            model: model(),
        };
    }

    if let (Some(provider), Some(env_model)) =
        (var("EDGEQUAKE_LLM_PROVIDER"), var("EDGEQUAKE_MODEL"))
    {
        return ProviderChoice::Named {
            provider,
            model: env_model,
        };
    }

    if var("OPENAI_API_KEY").is_some() {
        return ProviderChoice::Named {
            provider: "openai".to_string(),
            model: model(),
        };
    }

    ProviderChoice::AutoDetect
}

fn resolve_provider(config: &EngineConfig) -> Result<Arc<dyn LLMProvider>, ConstructionError> {
    match choose_provider(config, |key| std::env::var(key).ok()) {
        ProviderChoice::Named { provider, model } => {
            info!(provider = %provider, model = %model, "Vision provider selected");
            create_vision_provider(&provider, &model)
        }
        ProviderChoice::AutoDetect => {
            let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(|e| {
                ConstructionError::ProviderNotConfigured {
                    provider: "auto".to_string(),
                    hint: format!(
                        "No LLM provider could be auto-detected from environment.\n\
                        Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, or both \
                        EDGEQUAKE_LLM_PROVIDER and EDGEQUAKE_MODEL.\n\
                        Error: {e}"
                    ),
                }
            })?;
            info!("Vision provider auto-detected from environment");
            Ok(llm_provider)
        }
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ConstructionError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ConstructionError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(page: usize) -> Result<String, PageError> {
        Err(PageError::LlmFailed {
            page,
            retries: 3,
            detail: "503".into(),
        })
    }

    #[test]
    fn assemble_orders_pages_and_joins() {
        let outcomes = vec![
            (2, Ok("## Methods\n".to_string())),
            (1, Ok("# Paper\n".to_string())),
            (3, Ok("### Results\n".to_string())),
        ];
        let doc = assemble(outcomes, 3).unwrap();
        assert_eq!(
            doc.markdown.as_deref(),
            Some("# Paper\n\n## Methods\n\n### Results\n")
        );
        let numbers: Vec<usize> = doc.pages.unwrap().iter().map(|p| p.page_num).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn assemble_keeps_failed_pages_empty() {
        let outcomes = vec![(1, Ok("# Only\n".to_string())), (2, failed(2))];
        let doc = assemble(outcomes, 3).unwrap();
        assert_eq!(doc.markdown.as_deref(), Some("# Only\n"));
        assert_eq!(doc.page_count(), Some(2));
    }

    #[test]
    fn assemble_fails_when_every_page_fails() {
        let err = assemble(vec![(1, failed(1)), (2, failed(2))], 3).unwrap_err();
        match err {
            ConversionError::AllPagesFailed {
                total, first_error, ..
            } => {
                assert_eq!(total, 2);
                assert!(first_error.contains("Page 1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    fn named(provider: &str, model: &str) -> ProviderChoice {
        ProviderChoice::Named {
            provider: provider.into(),
            model: model.into(),
        }
    }

    #[test]
    fn configured_provider_wins() {
        let config = EngineConfig::builder()
            .provider_name("ollama")
            .model("llava")
            .build()
            .unwrap();
        let choice = choose_provider(
            &config,
            env(&[
                ("EDGEQUAKE_LLM_PROVIDER", "anthropic"),
                ("EDGEQUAKE_MODEL", "claude-sonnet-4-20250514"),
                ("OPENAI_API_KEY", "sk-test"),
            ]),
        );
        assert_eq!(choice, named("ollama", "llava"));
    }

    #[test]
    fn configured_provider_without_model_uses_default() {
        let config = EngineConfig::builder().provider_name("openai").build().unwrap();
        assert_eq!(
            choose_provider(&config, env(&[])),
            named("openai", DEFAULT_MODEL)
        );
    }

    #[test]
    fn env_provider_needs_env_model() {
        let config = EngineConfig::default();
        let choice = choose_provider(
            &config,
            env(&[
                ("EDGEQUAKE_LLM_PROVIDER", "anthropic"),
                ("EDGEQUAKE_MODEL", "claude-sonnet-4-20250514"),
                ("OPENAI_API_KEY", "sk-test"),
            ]),
        );
        assert_eq!(choice, named("anthropic", "claude-sonnet-4-20250514"));
    }

    #[test]
    fn env_provider_alone_falls_through_to_auto_detection() {
        let config = EngineConfig::default();
        let choice = choose_provider(
            &config,
            env(&[
                ("EDGEQUAKE_LLM_PROVIDER", "anthropic"),
                ("ANTHROPIC_API_KEY", "dummy"),
            ]),
        );
        assert_eq!(choice, ProviderChoice::AutoDetect);
    }

    #[test]
    fn env_provider_alone_with_openai_key_uses_openai() {
        let config = EngineConfig::default();
        let choice = choose_provider(
            &config,
            env(&[
                ("EDGEQUAKE_LLM_PROVIDER", "anthropic"),
                ("OPENAI_API_KEY", "sk-test"),
            ]),
        );
        assert_eq!(choice, named("openai", DEFAULT_MODEL));
    }

    #[test]
    fn openai_key_uses_configured_model() {
        let config = EngineConfig::builder().model("gpt-4.1-mini").build().unwrap();
        let choice = choose_provider(&config, env(&[("OPENAI_API_KEY", "sk-test")]));
        assert_eq!(choice, named("openai", "gpt-4.1-mini"));
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = EngineConfig::default();
        let choice = choose_provider(
            &config,
            env(&[
                ("EDGEQUAKE_LLM_PROVIDER", "anthropic"),
                ("EDGEQUAKE_MODEL", "  "),
                ("OPENAI_API_KEY", ""),
            ]),
        );
        assert_eq!(choice, ProviderChoice::AutoDetect);
    }

    #[test]
    fn factory_reports_engine_name() {
        let factory = VisionEngineFactory::new(EngineConfig::default());
        assert_eq!(factory.engine_name(), ENGINE_NAME);
    }
}
