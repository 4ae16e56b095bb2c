//! # edgequake-pdf2md-server
//!
//! An HTTP service that converts PDF documents to Markdown and reports how
//! much heading structure the result carries.
//!
//! ## Request flow
//!
//! ```text
//! POST /convert
//!  │
//!  ├─ 1. Input      multipart 'file' or a URL (http/https, downloaded)
//!  ├─ 2. Stage      bytes written to a uniquely named *.pdf temp file
//!  ├─ 3. Engine     shared converter, built once on first use
//!  ├─ 4. Convert    engine reads the staged file → Markdown
//!  ├─ 5. Stats      count #, ##, ### headings
//!  └─ 6. Cleanup    temp file removed on every path
//! ```
//!
//! ## Engine lifecycle
//!
//! Building the engine is expensive (PDFium download, provider setup), so the
//! process holds a single [`ConverterLifecycle`]. It is built lazily by the
//! first request that needs it, or eagerly with `PRELOAD_MODELS=true`.
//! Concurrent callers share one construction attempt; a failed attempt is
//! retried by the next caller. `GET /health` reports readiness without ever
//! triggering construction.
//!
//! ## Embedding
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use edgequake_pdf2md_server::{server, ConverterLifecycle, ServerConfig, VisionEngineFactory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::from_env()?;
//!     let lifecycle = ConverterLifecycle::new(Arc::new(VisionEngineFactory::new(config.engine.clone())));
//!     let state = server::AppState::from_config(&config, lifecycle)?;
//!     let app = server::router(Arc::new(state), config.max_upload_bytes);
//!     let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
//!     server::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2md-server` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod converter;
pub mod engine;
pub mod error;
pub mod input;
pub mod lifecycle;
pub mod server;
pub mod service;
pub mod staging;
pub mod structure;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConfigError, EngineConfig, ServerConfig};
pub use converter::{
    ConverterFactory, ConverterHandle, DocumentConverter, RenderedDocument, RenderedPage,
};
pub use engine::VisionEngineFactory;
pub use error::{ConstructionError, ConversionError, ErrorKind, PageError, ServiceError};
pub use input::{InputRequest, PdfFetcher, UploadedFile};
pub use lifecycle::{ConverterLifecycle, LifecycleStatus};
pub use service::{ConversionResult, ConversionService};
pub use structure::StructureStats;
