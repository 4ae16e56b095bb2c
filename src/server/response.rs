//! Response bodies and error mapping for the HTTP surface.

use crate::error::{ErrorKind, ServiceError};
use crate::lifecycle::LifecycleStatus;
use crate::service::ConversionResult;
use crate::structure::StructureStats;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

/// How to call `/convert`, returned with input errors.
pub const USAGE: &str =
    "Send a PDF as multipart/form-data field 'file', or a JSON body {\"url\": \"https://...\"}";

/// Successful `/convert` body.
#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub success: bool,
    pub markdown: String,
    pub source: String,
    pub has_structure: bool,
    pub pages_count: Option<usize>,
    pub processing_time_ms: u64,
    pub structure_stats: StructureStats,
}

impl ConvertResponse {
    pub fn new(result: ConversionResult, source: &str) -> Self {
        Self {
            success: true,
            has_structure: result.has_structure(),
            markdown: result.markdown,
            source: source.to_string(),
            pages_count: result.pages_count,
            processing_time_ms: result.processing_time_ms,
            structure_stats: result.stats,
        }
    }
}

/// `/health` body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub engine: String,
    pub models_loaded: bool,
    pub state: LifecycleStatus,
}

#[derive(Debug, Serialize)]
struct ClientErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ServerErrorBody {
    success: bool,
    error: String,
}

/// A [`ServiceError`] on its way out as an HTTP response.
///
/// Input errors become 400 `{error, usage?}`; everything else becomes
/// 500 `{success: false, error}`.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl<E> From<E> for ApiError
where
    E: Into<ServiceError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.0.to_string();
        match self.0.kind() {
            ErrorKind::InvalidInput => {
                warn!("Rejected convert request: {}", message);
                let usage = match self.0 {
                    ServiceError::EmptyFileName => None,
                    _ => Some(USAGE),
                };
                let body = ClientErrorBody {
                    error: message,
                    usage,
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            kind => {
                error!(?kind, "Convert request failed: {}", message);
                let body = ServerErrorBody {
                    success: false,
                    error: message,
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversionError;

    #[test]
    fn missing_input_is_bad_request_with_usage() {
        let response = ApiError(ServiceError::MissingInput).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn conversion_failure_is_server_error() {
        let response = ApiError::from(ConversionError::Engine("boom".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn convert_response_carries_stats() {
        let result = ConversionResult {
            markdown: "# A\n### B\n".into(),
            pages_count: Some(1),
            processing_time_ms: 12,
            stats: StructureStats::from_markdown("# A\n### B\n"),
        };
        let json = serde_json::to_value(ConvertResponse::new(result, "stub")).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["source"], "stub");
        assert_eq!(json["has_structure"], true);
        assert_eq!(json["structure_stats"]["h1_count"], 1);
        assert_eq!(json["structure_stats"]["h3_count"], 1);
    }
}
