//! Error types for the edgequake-pdf2md-server library.
//!
//! Four error types map onto the four places a request can go wrong:
//!
//! * [`ServiceError`] — **Per-request**: everything the convert endpoint can
//!   report to its caller. Its [`ErrorKind`] decides the HTTP status.
//!
//! * [`ConstructionError`] — **Shared**: the conversion engine could not be
//!   built. It is `Clone` because one failed attempt is reported to every
//!   request that was waiting on it. A later request starts a fresh attempt.
//!
//! * [`ConversionError`] — the engine was available but failed on this
//!   particular document.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed inside the vision
//!   engine. Logged and skipped unless every page fails.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself is missing or malformed (HTTP 400).
    InvalidInput,
    /// Downloading a URL input failed (HTTP 500).
    Fetch,
    /// The conversion engine could not be built (HTTP 500).
    Construction,
    /// The conversion engine failed on the document (HTTP 500).
    Conversion,
    /// Anything else, e.g. staging I/O (HTTP 500).
    Internal,
}

/// Every error a single conversion request can end with.
#[derive(Debug, Error)]
pub enum ServiceError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Neither a file nor a URL was supplied.
    #[error("No PDF supplied")]
    MissingInput,

    /// A file part was present but carried no file name.
    #[error("Empty file name")]
    EmptyFileName,

    /// The request body could not be read as multipart or JSON.
    #[error("Malformed request body: {reason}")]
    MalformedBody { reason: String },

    /// The URL could not be parsed.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The URL parsed but uses a scheme other than http/https.
    #[error("Unsupported URL scheme '{scheme}' in '{url}': only http and https are accepted")]
    UnsupportedScheme { url: String, scheme: String },

    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The download failed (network error or non-success HTTP status).
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Engine errors ─────────────────────────────────────────────────────
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    // ── Internal errors ───────────────────────────────────────────────────
    /// The uploaded bytes could not be written to a temporary file.
    #[error("Failed to stage PDF on disk: {0}")]
    Staging(#[source] std::io::Error),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Classify the error for status-code mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::MissingInput
            | ServiceError::EmptyFileName
            | ServiceError::MalformedBody { .. }
            | ServiceError::InvalidUrl { .. }
            | ServiceError::UnsupportedScheme { .. } => ErrorKind::InvalidInput,
            ServiceError::DownloadFailed { .. } | ServiceError::DownloadTimeout { .. } => {
                ErrorKind::Fetch
            }
            ServiceError::Construction(_) => ErrorKind::Construction,
            ServiceError::Conversion(_) => ErrorKind::Conversion,
            ServiceError::Staging(_) | ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// The conversion engine could not be constructed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConstructionError {
    /// The PDFium library could not be downloaded, located or bound.
    #[error(
        "PDFium is unavailable: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumUnavailable(String),

    /// No Vision LLM provider could be resolved from config or environment.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The construction task panicked or was cancelled.
    #[error("Engine construction aborted: {0}")]
    Aborted(String),

    /// Any other engine-specific failure.
    #[error("Engine construction failed: {0}")]
    Other(String),
}

/// The engine failed to convert one document.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF is encrypted; the service does not accept passwords.
    #[error("PDF '{path}' is encrypted and requires a password")]
    PasswordRequired { path: PathBuf },

    /// The document has no pages.
    #[error("PDF '{path}' has no pages")]
    EmptyDocument { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Every page failed after all retries; output would be empty.
    #[error("All {total} pages failed after {retries} retries each.\nFirst error: {first_error}")]
    AllPagesFailed {
        total: usize,
        retries: u32,
        first_error: String,
    },

    /// Engine-specific failure not covered above.
    #[error("{0}")]
    Engine(String),
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, Error)]
pub enum PageError {
    /// PNG/base64 encoding of the rendered page failed.
    #[error("Page {page}: image encoding failed: {detail}")]
    EncodeFailed { page: usize, detail: String },

    /// LLM call failed after retries.
    #[error("Page {page}: LLM call failed after {retries} retries: {detail}")]
    LlmFailed {
        page: usize,
        retries: u32,
        detail: String,
    },
}
