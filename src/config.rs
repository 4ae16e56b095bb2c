//! Configuration for the HTTP service and its vision engine.
//!
//! Two structs, one per concern:
//!
//! * [`ServerConfig`] — where to listen, whether to warm the engine at
//!   startup, how to fetch URL inputs and where to stage uploads.
//! * [`EngineConfig`] — how the vision engine renders pages and talks to
//!   the VLM provider.
//!
//! Both have documented defaults, a builder that clamps or validates each
//! knob, and an environment reader. [`ServerConfig::from_lookup`] takes the
//! lookup function as a parameter so tests never touch the process env.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Invalid configuration value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("Invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// A referenced file (e.g. system prompt) could not be read.
    #[error("Failed to read {key} file '{path}': {reason}")]
    Unreadable {
        key: &'static str,
        path: PathBuf,
        reason: String,
    },
}

// ── Server ───────────────────────────────────────────────────────────────

/// Configuration of the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address. Default: `0.0.0.0`.
    pub host: String,

    /// Listen port. Default: 5000.
    pub port: u16,

    /// Build the conversion engine before accepting requests. Default: false.
    ///
    /// Without preloading the first `/convert` call pays for the PDFium
    /// download and provider setup.
    pub preload_models: bool,

    /// Timeout for downloading URL inputs, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Maximum accepted request body, in bytes. Default: 200 MiB.
    pub max_upload_bytes: usize,

    /// Directory for staged PDFs. Default: the system temp dir.
    pub staging_dir: Option<PathBuf>,

    /// Vision engine settings.
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            preload_models: false,
            download_timeout_secs: 120,
            max_upload_bytes: 200 * 1024 * 1024,
            staging_dir: None,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, falling back to defaults
    /// for unset or empty variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(&lookup);
        let mut builder = Self::builder().engine(EngineConfig::from_lookup(&lookup)?);

        if let Some(host) = env.string("HOST") {
            builder = builder.host(host);
        }
        if let Some(port) = env.parse::<u16>("PORT", "a port number")? {
            builder = builder.port(port);
        }
        if let Some(flag) = env.string("PRELOAD_MODELS") {
            builder = builder.preload_models(parse_flag(&flag));
        }
        if let Some(secs) = env.parse::<u64>("PDF2MD_DOWNLOAD_TIMEOUT", "seconds")? {
            builder = builder.download_timeout_secs(secs);
        }
        if let Some(mb) = env.parse::<usize>("PDF2MD_MAX_UPLOAD_MB", "megabytes")? {
            builder = builder.max_upload_bytes(mb.saturating_mul(1024 * 1024));
        }
        if let Some(dir) = env.string("PDF2MD_STAGING_DIR") {
            builder = builder.staging_dir(dir);
        }

        builder.build()
    }

    /// `host:port` as a bindable address string.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn preload_models(mut self, v: bool) -> Self {
        self.config.preload_models = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = Some(dir.into());
        self
    }

    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.config.engine = engine;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        let c = &self.config;
        if c.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if c.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "maximum upload size must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Engine ───────────────────────────────────────────────────────────────

/// Configuration of the vision engine.
#[derive(Clone)]
pub struct EngineConfig {
    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None, the provider is auto-detected from the environment.
    ///
    /// Not read from `EDGEQUAKE_LLM_PROVIDER`: that variable only takes
    /// effect together with `EDGEQUAKE_MODEL`, at provider resolution.
    pub provider_name: Option<String>,

    /// Longest rendered edge in pixels. Default: 2000.
    ///
    /// Caps memory per page regardless of the physical page size.
    pub max_rendered_pixels: u32,

    /// Concurrent VLM calls per document. Default: 10.
    pub concurrency: usize,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts per page on VLM failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom system prompt. If None, uses the built-in prompt.
    pub system_prompt: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            max_rendered_pixels: 2000,
            concurrency: 10,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field(
                "system_prompt",
                &self.system_prompt.as_ref().map(|p| format!("<{} chars>", p.len())),
            )
            .finish()
    }
}

impl EngineConfig {
    /// Create a new builder for `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read engine settings through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(&lookup);
        let mut builder = Self::builder();

        if let Some(model) = env.string("EDGEQUAKE_MODEL") {
            builder = builder.model(model);
        }
        if let Some(px) = env.parse::<u32>("PDF2MD_MAX_PIXELS", "a pixel count")? {
            builder = builder.max_rendered_pixels(px);
        }
        if let Some(n) = env.parse::<usize>("PDF2MD_CONCURRENCY", "a positive integer")? {
            builder = builder.concurrency(n);
        }
        if let Some(t) = env.parse::<f32>("PDF2MD_TEMPERATURE", "a number between 0 and 2")? {
            builder = builder.temperature(t);
        }
        if let Some(n) = env.parse::<usize>("PDF2MD_MAX_TOKENS", "a token count")? {
            builder = builder.max_tokens(n);
        }
        if let Some(n) = env.parse::<u32>("PDF2MD_MAX_RETRIES", "a retry count")? {
            builder = builder.max_retries(n);
        }
        if let Some(ms) = env.parse::<u64>("PDF2MD_RETRY_BACKOFF_MS", "milliseconds")? {
            builder = builder.retry_backoff_ms(ms);
        }
        if let Some(path) = env.string("PDF2MD_SYSTEM_PROMPT") {
            let path = PathBuf::from(path);
            let prompt =
                std::fs::read_to_string(&path).map_err(|e| ConfigError::Unreadable {
                    key: "PDF2MD_SYSTEM_PROMPT",
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            builder = builder.system_prompt(prompt);
        }

        builder.build()
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        if self.config.max_tokens == 0 {
            return Err(ConfigError::Invalid("max tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// Interpret a boolean-like environment value.
///
/// `true`, `1`, `yes` and `on` (any case) are true; everything else is false.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

struct Lookup<'a, F>(&'a F);

impl<F> Lookup<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty, trimmed value of `key`.
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(
        &self,
        key: &'static str,
        expected: &'static str,
    ) -> Result<Option<T>, ConfigError> {
        match self.string(key) {
            None => Ok(None),
            Some(value) => value
                .parse::<T>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    key,
                    value,
                    expected,
                }),
        }
    }
}
