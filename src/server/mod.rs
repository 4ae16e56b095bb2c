//! HTTP surface: `GET /`, `GET /health`, `POST /convert`.
//!
//! Handlers share one [`AppState`] behind an `Arc`. The conversion engine is
//! not touched until a `/convert` request (or a preload) asks for it.

pub mod extract;
pub mod handlers;
pub mod response;

use crate::config::ServerConfig;
use crate::error::ServiceError;
use crate::input::PdfFetcher;
use crate::lifecycle::ConverterLifecycle;
use crate::service::ConversionService;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state for all handlers.
pub struct AppState {
    pub service: ConversionService,
    pub fetcher: PdfFetcher,
}

impl AppState {
    pub fn new(service: ConversionService, fetcher: PdfFetcher) -> Self {
        Self { service, fetcher }
    }

    /// Build state from config around an existing lifecycle.
    pub fn from_config(
        config: &ServerConfig,
        lifecycle: ConverterLifecycle,
    ) -> Result<Self, ServiceError> {
        let service =
            ConversionService::new(lifecycle).with_staging_dir(config.staging_dir.clone());
        let fetcher = PdfFetcher::new(config.download_timeout_secs)?;
        Ok(Self::new(service, fetcher))
    }
}

/// Routes plus body limit and request tracing.
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/convert", post(handlers::convert))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` on `listener` until Ctrl-C or SIGTERM.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{addr}");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
