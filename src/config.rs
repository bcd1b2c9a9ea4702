//! Configuration for the relay.
//!
//! All runtime behaviour is controlled through [`RelayConfig`], built via its
//! [`RelayConfigBuilder`] (the binary maps CLI flags onto it) or loaded
//! directly from the process environment with [`RelayConfig::from_env`].
//!
//! Two settings are mandatory: the recognition endpoint and its access key.
//! [`RelayConfigBuilder::build`] refuses to produce a config without them, so
//! a misconfigured process fails at startup instead of on the first upload.

use crate::error::RelayError;
use std::fmt;
use std::path::PathBuf;

/// Environment variable holding the recognition endpoint URL.
pub const ENV_ENDPOINT: &str = "AZURE_ENDPOINT";
/// Environment variable holding the recognition access key.
pub const ENV_KEY: &str = "AZURE_KEY";
/// Environment variable pointing at an existing pdfium library file.
pub const ENV_PDFIUM_LIB: &str = "PDFIUM_LIB_PATH";

/// Prebuilt recognition model used for every upload.
pub const DEFAULT_MODEL_ID: &str = "prebuilt-invoice";
/// REST API version sent with every recognition call.
pub const DEFAULT_API_VERSION: &str = "2024-11-30";

/// Configuration for the relay.
///
/// # Example
/// ```rust
/// use invoice_relay::RelayConfig;
///
/// let config = RelayConfig::builder()
///     .endpoint("https://my-resource.cognitiveservices.azure.com/")
///     .api_key("secret")
///     .render_workers(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.render_workers, 2);
/// ```
#[derive(Clone)]
pub struct RelayConfig {
    /// Recognition service endpoint, e.g. `https://<resource>.cognitiveservices.azure.com/`.
    pub endpoint: String,

    /// Recognition service access key. Never logged.
    pub api_key: String,

    /// Recognition model identifier. Default: `prebuilt-invoice`.
    pub model_id: String,

    /// REST API version. Default: `2024-11-30`.
    pub api_version: String,

    /// Upscaling factor applied to page 1 when rendering the thumbnail. Range: 0.25–8.0. Default: 2.0.
    ///
    /// 2.0 keeps small print legible while the base64 payload stays well
    /// under a megabyte for a typical A4 invoice.
    pub render_scale: f32,

    /// Maximum number of thumbnails rasterised at once. Default: 4.
    pub render_workers: usize,

    /// Deadline for one recognition call (submit + polling) in seconds. Default: 120.
    pub extraction_timeout_secs: u64,

    /// Delay between two polls of the analysis operation in milliseconds. Default: 1000.
    pub poll_interval_ms: u64,

    /// Maximum number of polls before giving up. Default: 120.
    pub max_poll_attempts: u32,

    /// Maximum accepted request body size in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// Explicit pdfium library file. If None, the system library is used.
    pub pdfium_library: Option<PathBuf>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            render_scale: 2.0,
            render_workers: 4,
            extraction_timeout_secs: 120,
            poll_interval_ms: 1000,
            max_poll_attempts: 120,
            max_upload_bytes: 50 * 1024 * 1024,
            pdfium_library: None,
        }
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("model_id", &self.model_id)
            .field("api_version", &self.api_version)
            .field("render_scale", &self.render_scale)
            .field("render_workers", &self.render_workers)
            .field("extraction_timeout_secs", &self.extraction_timeout_secs)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("pdfium_library", &self.pdfium_library)
            .finish()
    }
}

impl RelayConfig {
    /// Create a new builder for `RelayConfig`.
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load the configuration from the process environment.
    ///
    /// A `.env` file in the working directory is honoured. Fails with
    /// [`RelayError::MissingEnv`] when `AZURE_ENDPOINT` or `AZURE_KEY` is
    /// absent or empty.
    pub fn from_env() -> Result<Self, RelayError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            builder = builder.endpoint(endpoint);
        }
        if let Some(key) = lookup(ENV_KEY) {
            builder = builder.api_key(key);
        }
        if let Some(path) = lookup(ENV_PDFIUM_LIB).filter(|p| !p.is_empty()) {
            builder = builder.pdfium_library(path);
        }
        builder.build()
    }
}

/// Builder for [`RelayConfig`].
#[derive(Debug)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into().trim().to_string();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into().trim().to_string();
        self
    }

    pub fn model_id(mut self, model: impl Into<String>) -> Self {
        self.config.model_id = model.into();
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.25, 8.0);
        self
    }

    pub fn render_workers(mut self, n: usize) -> Self {
        self.config.render_workers = n.max(1);
        self
    }

    pub fn extraction_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extraction_timeout_secs = secs.max(1);
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn max_poll_attempts(mut self, n: u32) -> Self {
        self.config.max_poll_attempts = n.max(1);
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RelayConfig, RelayError> {
        let c = &self.config;

        let mut missing = Vec::new();
        if c.endpoint.is_empty() {
            missing.push(ENV_ENDPOINT);
        }
        if c.api_key.is_empty() {
            missing.push(ENV_KEY);
        }
        if !missing.is_empty() {
            return Err(RelayError::MissingEnv(missing));
        }

        if !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://")) {
            return Err(RelayError::InvalidConfig(format!(
                "Endpoint must be an HTTP(S) URL, got '{}'",
                c.endpoint
            )));
        }
        if c.model_id.is_empty() {
            return Err(RelayError::InvalidConfig("Model id must not be empty".into()));
        }
        if c.max_upload_bytes == 0 {
            return Err(RelayError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}
