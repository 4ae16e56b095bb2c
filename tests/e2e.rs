//! End-to-end test against the real vision engine.
//!
//! Downloads PDFium on first run and makes live LLM API calls, so it is
//! gated behind `E2E_ENABLED`. The PDF to convert is named by `E2E_PDF`.
//!
//! Run with:
//!   E2E_ENABLED=1 E2E_PDF=path/to/paper.pdf cargo test --test e2e -- --nocapture

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use edgequake_pdf2md_server::server::{self, AppState};
use edgequake_pdf2md_server::{ConverterLifecycle, ServerConfig, VisionEngineFactory};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

/// Skip this test if E2E_ENABLED is not set or `E2E_PDF` does not exist.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let Some(p) = std::env::var_os("E2E_PDF").map(PathBuf::from) else {
            println!("SKIP — set E2E_PDF to a PDF file");
            return;
        };
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

#[tokio::test]
async fn test_convert_upload_with_vision_engine() {
    let pdf = e2e_skip_unless_ready!();
    let data = std::fs::read(&pdf).unwrap();

    let config = ServerConfig::from_env().unwrap();
    let lifecycle = ConverterLifecycle::new(Arc::new(VisionEngineFactory::new(
        config.engine.clone(),
    )));
    let state = AppState::from_config(&config, lifecycle).unwrap();
    let app = server::router(Arc::new(state), config.max_upload_bytes);

    let boundary = "E2E-BOUNDARY";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"e2e.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(&data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let request = Request::post("/convert")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    println!("{}", serde_json::to_string_pretty(&json["structure_stats"]).unwrap());

    assert_eq!(status, StatusCode::OK, "response: {json}");
    assert_eq!(json["success"], true);
    assert_eq!(json["source"], "edgequake-vlm");
    let markdown = json["markdown"].as_str().unwrap();
    assert!(!markdown.trim().is_empty(), "Markdown is empty");
    assert!(
        !markdown.starts_with("```"),
        "Output must not start with a code fence"
    );
    assert!(json["pages_count"].as_u64().unwrap() >= 1);

    let health = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = to_bytes(health.into_body(), usize::MAX).await.unwrap();
    let health: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["models_loaded"], true);
}
