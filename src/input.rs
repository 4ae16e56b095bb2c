//! Input acquisition: turn an upload or a URL into PDF bytes.
//!
//! A request may carry an uploaded file, a URL, or both. The file wins when
//! both are present. URLs are checked for an `http`/`https` scheme before any
//! network access, then downloaded with a generous timeout because PDFs can
//! be large.

use crate::error::ServiceError;
use reqwest::Url;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A file received in a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name. May be empty.
    pub filename: String,
    pub data: Vec<u8>,
}

/// Raw inputs extracted from a `/convert` request.
#[derive(Debug, Default)]
pub struct InputRequest {
    pub file: Option<UploadedFile>,
    pub url: Option<String>,
}

/// Where the PDF bytes came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfSource {
    Upload { filename: String },
    Url(String),
}

impl fmt::Display for PdfSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfSource::Upload { filename } => write!(f, "upload '{filename}'"),
            PdfSource::Url(url) => write!(f, "url '{url}'"),
        }
    }
}

/// PDF bytes plus their origin. Owned by a single request.
#[derive(Debug)]
pub struct ConversionRequest {
    pub bytes: Vec<u8>,
    pub source: PdfSource,
}

/// Downloads URL inputs.
///
/// Wraps one `reqwest::Client` so connections are pooled across requests.
#[derive(Debug, Clone)]
pub struct PdfFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl PdfFetcher {
    /// Build a fetcher whose downloads time out after `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Download `url`, which must already have passed [`validate_url`].
    pub async fn fetch(&self, url: &Url) -> Result<Vec<u8>, ServiceError> {
        info!("Downloading PDF from: {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.fetch_error(url, e))?;

        if !response.status().is_success() {
            return Err(ServiceError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.fetch_error(url, e))?;

        info!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }

    fn fetch_error(&self, url: &Url, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::DownloadTimeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            ServiceError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// Parse `input` and require an `http` or `https` scheme.
pub fn validate_url(input: &str) -> Result<Url, ServiceError> {
    let url = Url::parse(input.trim()).map_err(|e| ServiceError::InvalidUrl {
        url: input.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ServiceError::UnsupportedScheme {
            url: input.to_string(),
            scheme: scheme.to_string(),
        }),
    }
}

/// Resolve the request to PDF bytes.
///
/// # Errors
/// - [`ServiceError::MissingInput`] when neither a file nor a URL is given
/// - [`ServiceError::EmptyFileName`] when the uploaded file has no name
/// - [`ServiceError::InvalidUrl`] / [`ServiceError::UnsupportedScheme`]
/// - [`ServiceError::DownloadFailed`] / [`ServiceError::DownloadTimeout`]
pub async fn resolve_input(
    fetcher: &PdfFetcher,
    request: InputRequest,
) -> Result<ConversionRequest, ServiceError> {
    let resolved = match (request.file, request.url) {
        (Some(file), url) => {
            if url.is_some() {
                debug!("Both file and url supplied; using the file");
            }
            if file.filename.trim().is_empty() {
                return Err(ServiceError::EmptyFileName);
            }
            ConversionRequest {
                bytes: file.data,
                source: PdfSource::Upload {
                    filename: file.filename,
                },
            }
        }
        (None, Some(url)) => {
            let parsed = validate_url(&url)?;
            let bytes = fetcher.fetch(&parsed).await?;
            ConversionRequest {
                bytes,
                source: PdfSource::Url(url),
            }
        }
        (None, None) => return Err(ServiceError::MissingInput),
    };

    if !resolved.bytes.starts_with(b"%PDF") {
        warn!(
            "Input from {} does not start with %PDF ({} bytes)",
            resolved.source,
            resolved.bytes.len()
        );
    }

    Ok(resolved)
}
