//! Pull an [`InputRequest`] out of a `/convert` request.
//!
//! Multipart bodies may carry a `file` part and a `url` text part. A `file`
//! part only counts as an upload when it has a `filename` attribute. JSON
//! bodies may carry a `url` string. A JSON body that does not parse counts
//! as no input, so the caller gets the usage hint rather than a parse error.
//! Any other content type is treated as empty.

use crate::error::ServiceError;
use crate::input::{InputRequest, UploadedFile};
use crate::server::response::ApiError;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;

/// Extractor for the `/convert` inputs.
#[derive(Debug)]
pub struct ConvertInput(pub InputRequest);

#[derive(Debug, Deserialize)]
struct UrlBody {
    url: Option<String>,
}

impl<S> FromRequest<S> for ConvertInput
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state).await.map_err(|e| {
                ServiceError::MalformedBody {
                    reason: e.body_text(),
                }
            })?;
            return read_multipart(multipart).await.map(Self);
        }

        if content_type.contains("json") {
            let body = Bytes::from_request(req, state).await.map_err(|e| {
                ServiceError::MalformedBody {
                    reason: e.body_text(),
                }
            })?;
            return Ok(Self(parse_json(&body)));
        }

        debug!("Convert request without multipart or JSON body ({:?})", content_type);
        Ok(Self(InputRequest::default()))
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<InputRequest, ApiError> {
    let mut request = InputRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::MalformedBody {
            reason: e.body_text(),
        })?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                // A part without a filename attribute is a plain form field,
                // not an upload.
                let Some(filename) = field.file_name().map(str::to_string) else {
                    debug!("Ignoring 'file' part without a filename attribute");
                    let _ = field.bytes().await;
                    continue;
                };
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServiceError::MalformedBody {
                        reason: format!("Failed to read file data: {}", e.body_text()),
                    })?
                    .to_vec();
                request.file = Some(UploadedFile { filename, data });
            }
            "url" => {
                let url = field.text().await.map_err(|e| ServiceError::MalformedBody {
                    reason: format!("Failed to read url: {}", e.body_text()),
                })?;
                request.url = non_empty(url);
            }
            _ => {
                // Ignore unknown fields
                let _ = field.bytes().await;
            }
        }
    }

    Ok(request)
}

fn parse_json(body: &[u8]) -> InputRequest {
    let url = serde_json::from_slice::<UrlBody>(body)
        .ok()
        .and_then(|b| b.url)
        .and_then(non_empty);
    InputRequest { file: None, url }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
