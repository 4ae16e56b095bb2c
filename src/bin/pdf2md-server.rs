//! HTTP server binary for edgequake-pdf2md-server.
//!
//! Reads configuration from the environment (and `.env`), applies CLI
//! overrides, optionally preloads the conversion engine, then serves.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2md_server::server::{self, AppState};
use edgequake_pdf2md_server::{ConverterLifecycle, ServerConfig, VisionEngineFactory};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"ENDPOINTS:
  GET  /          Service description
  GET  /health    Liveness and engine readiness (never builds the engine)
  POST /convert   multipart 'file' field, or JSON {"url": "https://..."}

EXAMPLES:
  pdf2md-server --port 8080 --preload
  curl -F file=@paper.pdf http://localhost:5000/convert
  curl -H 'Content-Type: application/json' \
       -d '{"url":"https://arxiv.org/pdf/1706.03762"}' http://localhost:5000/convert

ENVIRONMENT:
  HOST, PORT, PRELOAD_MODELS, PDF2MD_DOWNLOAD_TIMEOUT, PDF2MD_MAX_UPLOAD_MB,
  PDF2MD_STAGING_DIR, EDGEQUAKE_MODEL, EDGEQUAKE_LLM_PROVIDER, PDF2MD_MAX_PIXELS,
  PDF2MD_CONCURRENCY, PDF2MD_TEMPERATURE, PDF2MD_MAX_TOKENS, PDF2MD_MAX_RETRIES,
  PDF2MD_RETRY_BACKOFF_MS, PDF2MD_SYSTEM_PROMPT
  Provider keys: OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, ...
"#;

/// Serve PDF to Markdown conversion over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2md-server",
    version,
    about = "Serve PDF to Markdown conversion over HTTP",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Listen address (overrides HOST).
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,

    /// Build the conversion engine before serving (same as PRELOAD_MODELS=true).
    #[arg(long)]
    preload: bool,

    /// Vision LLM model ID (overrides EDGEQUAKE_MODEL).
    #[arg(long)]
    model: Option<String>,

    /// LLM provider name, paired with --model (or EDGEQUAKE_MODEL, else gpt-4.1-nano).
    #[arg(long)]
    provider: Option<String>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = ServerConfig::from_env().context("Invalid configuration")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.preload {
        config.preload_models = true;
    }
    if let Some(model) = cli.model {
        config.engine.model = Some(model);
    }
    if let Some(provider) = cli.provider {
        config.engine.provider_name = Some(provider);
    }

    let factory = Arc::new(VisionEngineFactory::new(config.engine.clone()));
    let lifecycle = ConverterLifecycle::new(factory);

    if config.preload_models {
        preload(&lifecycle).await;
    } else {
        info!("Engine will be built on the first /convert request");
    }

    let state = AppState::from_config(&config, lifecycle)
        .context("Failed to initialise request handling")?;
    let app = server::router(Arc::new(state), config.max_upload_bytes);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    server::serve(listener, app).await.context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Build the engine up front. A failure is logged; the server still starts
/// and the next `/convert` request retries construction.
async fn preload(lifecycle: &ConverterLifecycle) {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    spinner.set_prefix("Engine");
    spinner.set_message(format!("Loading {}…", lifecycle.engine_name()));
    spinner.enable_steady_tick(Duration::from_millis(80));

    let start = Instant::now();
    match lifecycle.acquire().await {
        Ok(_) => {
            spinner.finish_with_message("ready ✓");
            info!("Engine preloaded in {:?}", start.elapsed());
        }
        Err(e) => {
            spinner.abandon_with_message("failed");
            warn!("Engine preload failed, will retry on first request: {e}");
        }
    }
}
