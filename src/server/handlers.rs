//! Route handlers.

use crate::input::resolve_input;
use crate::server::extract::ConvertInput;
use crate::server::response::{ApiError, ConvertResponse, HealthResponse};
use crate::server::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// `GET /`: service description. Names the engine without building it.
pub async fn index(State(state): State<Arc<AppState>>) -> Json<Value> {
    let engine = state.service.lifecycle().engine_name();
    Json(json!({
        "service": "PDF to Markdown Converter",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Convert PDF documents to Markdown with heading structure preserved",
        "endpoints": {
            "GET /": "This page",
            "GET /health": "Service health and engine readiness",
            "POST /convert": "Convert a PDF to Markdown"
        },
        "input_methods": [
            "multipart/form-data with a 'file' field",
            "JSON body {\"url\": \"https://...\"} or a multipart 'url' field"
        ],
        "engine": engine,
        "response": {
            "source": format!("Name of the conversion engine that produced the Markdown (here '{engine}')")
        },
        "note": "The first /convert request may be slow while the conversion engine loads, unless PRELOAD_MODELS is set"
    }))
}

/// `GET /health`: reports readiness without triggering construction.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let lifecycle = state.service.lifecycle();
    Json(HealthResponse {
        status: "healthy",
        engine: lifecycle.engine_name().to_string(),
        models_loaded: lifecycle.is_ready(),
        state: lifecycle.status(),
    })
}

/// `POST /convert`: upload or URL in, Markdown out.
pub async fn convert(
    State(state): State<Arc<AppState>>,
    ConvertInput(input): ConvertInput,
) -> Result<Json<ConvertResponse>, ApiError> {
    let request = resolve_input(&state.fetcher, input).await?;
    info!("Converting {} ({} bytes)", request.source, request.bytes.len());

    let result = state.service.handle(&request.bytes).await?;
    let source = state.service.lifecycle().engine_name();
    Ok(Json(ConvertResponse::new(result, source)))
}
