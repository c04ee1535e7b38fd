//! Configuration types for the enhancement workflow.
//!
//! All behaviour is controlled through [`EnhanceConfig`], built via its
//! [`EnhanceConfigBuilder`]. One struct holds every knob so configs can be
//! shared across tasks, logged, and compared between runs.
//!
//! Per-call switches that a UI may flip for an individual file live in
//! [`EnhanceOptions`] instead.

use crate::error::EnhanceError;
use crate::pipeline::poll::{PollPolicy, MAX_POLL_ATTEMPTS};
use crate::pipeline::validate::ValidationOptions;
use crate::progress::ProgressCallback;
use crate::service::{EnhanceService, DEFAULT_BASE_URL};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable consulted for the API key when none is configured.
pub const API_KEY_ENV: &str = "SUPERRES_API_KEY";
/// Environment variable consulted for the base URL when none is configured.
pub const BASE_URL_ENV: &str = "SUPERRES_BASE_URL";

/// Configuration for an [`crate::Enhancer`].
///
/// # Example
/// ```rust
/// use superres_client::EnhanceConfig;
///
/// let config = EnhanceConfig::builder()
///     .api_key("my-key")
///     .timeout_ms(30_000)
///     .max_retries(1)
///     .enable_fallback(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries, 1);
/// ```
#[derive(Clone)]
pub struct EnhanceConfig {
    /// Service root, e.g. `https://techhk.aoscdn.com`. If None, uses
    /// `SUPERRES_BASE_URL` or the built-in default.
    pub base_url: Option<String>,

    /// Credential sent as `X-API-KEY`. If None, uses `SUPERRES_API_KEY`.
    pub api_key: Option<String>,

    /// Pre-constructed service. Takes precedence over `base_url`/`api_key`.
    pub service: Option<Arc<dyn EnhanceService>>,

    /// Wall-clock budget for one upload-and-poll attempt. Default: 60 000.
    ///
    /// Must exceed the worst-case poll time
    /// (`poll_max_attempts × poll_interval_ms`) or long tasks always time out.
    pub timeout_ms: u64,

    /// Extra attempts after the first failure. Default: 2 (3 attempts total).
    pub max_retries: u32,

    /// Fixed pause before each retry. Default: 1000.
    pub retry_delay_ms: u64,

    /// Status checks allowed after the first one. Default: 15.
    pub poll_max_attempts: u32,

    /// Fixed pause between status checks. Default: 2000.
    pub poll_interval_ms: u64,

    /// Per-HTTP-request timeout in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Timeout for downloading URL inputs and result images. Default: 120.
    pub download_timeout_secs: u64,

    /// Return the original image unmodified when every attempt fails. Default: false.
    pub enable_fallback: bool,

    /// Decode the header and enforce 50–5000 px bounds before upload. Default: false.
    pub check_dimensions: bool,

    /// Spawn an advisory system diagnostic at the start of each call. Default: false.
    pub run_diagnostics: bool,

    /// Concurrent calls in batch and stream mode. Default: 4.
    pub concurrency: usize,

    /// Size and format limits.
    pub validation: ValidationOptions,

    /// Rolling JSON log of the last classified errors. Default: None.
    pub error_log_path: Option<PathBuf>,

    /// Workflow event observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            service: None,
            timeout_ms: 60_000,
            max_retries: 2,
            retry_delay_ms: 1000,
            poll_max_attempts: MAX_POLL_ATTEMPTS,
            poll_interval_ms: 2000,
            request_timeout_secs: 30,
            download_timeout_secs: 120,
            enable_fallback: false,
            check_dimensions: false,
            run_diagnostics: false,
            concurrency: 4,
            validation: ValidationOptions::default(),
            error_log_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for EnhanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnhanceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("service", &self.service.as_ref().map(|_| "<dyn EnhanceService>"))
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("poll_max_attempts", &self.poll_max_attempts)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("enable_fallback", &self.enable_fallback)
            .field("check_dimensions", &self.check_dimensions)
            .field("concurrency", &self.concurrency)
            .field("validation", &self.validation)
            .field("error_log_path", &self.error_log_path)
            .finish()
    }
}

impl EnhanceConfig {
    /// Create a new builder for `EnhanceConfig`.
    pub fn builder() -> EnhanceConfigBuilder {
        EnhanceConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            max_attempts: self.poll_max_attempts,
            interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    /// Calls in flight for batch and stream runs. Never below 1, even when
    /// `concurrency` was set to 0 directly on the struct.
    pub fn in_flight_limit(&self) -> usize {
        self.concurrency.max(1)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs.max(1))
    }

    /// Attempts per call: `max_retries + 1`.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Builder for [`EnhanceConfig`].
#[derive(Debug)]
pub struct EnhanceConfigBuilder {
    config: EnhanceConfig,
}

impl EnhanceConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn service(mut self, service: Arc<dyn EnhanceService>) -> Self {
        self.config.service = Some(service);
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(10);
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn poll_max_attempts(mut self, n: u32) -> Self {
        self.config.poll_max_attempts = n;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn enable_fallback(mut self, v: bool) -> Self {
        self.config.enable_fallback = v;
        self
    }

    pub fn check_dimensions(mut self, v: bool) -> Self {
        self.config.check_dimensions = v;
        self
    }

    pub fn run_diagnostics(mut self, v: bool) -> Self {
        self.config.run_diagnostics = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_size_mb(mut self, mb: f64) -> Self {
        self.config.validation.max_size_mb = mb;
        self
    }

    pub fn formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.validation.formats = formats
            .into_iter()
            .map(|f| f.into().trim().trim_start_matches('.').to_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
        self
    }

    pub fn error_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.error_log_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EnhanceConfig, EnhanceError> {
        let c = &self.config;
        if c.timeout_ms == 0 {
            return Err(EnhanceError::config("timeout_ms must be > 0"));
        }
        if !(c.validation.max_size_mb > 0.0) {
            return Err(EnhanceError::config(format!(
                "max_size_mb must be > 0, got {}",
                c.validation.max_size_mb
            )));
        }
        if c.validation.formats.is_empty() {
            return Err(EnhanceError::config("at least one accepted format is required"));
        }
        if let Some(ref url) = c.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(EnhanceError::config(format!(
                    "base_url must be an HTTP/HTTPS URL, got '{url}'"
                )));
            }
        }
        Ok(self.config)
    }
}

/// Per-call switches for [`crate::Enhancer::enhance`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnhanceOptions {
    /// Whether this call may fall back to the pass-through result when the
    /// config enables fallback. Default: true.
    pub allow_fallback: bool,
    /// Replace the configured validation limits for this call.
    pub validation: Option<ValidationOptions>,
}

impl Default for EnhanceOptions {
    fn default() -> Self {
        Self {
            allow_fallback: true,
            validation: None,
        }
    }
}

impl EnhanceOptions {
    /// Options that never use the degraded fallback.
    pub fn strict() -> Self {
        Self {
            allow_fallback: false,
            ..Self::default()
        }
    }
}

/// Resolved base URL: config, then `SUPERRES_BASE_URL`, then the default.
pub(crate) fn resolve_base_url(config: &EnhanceConfig) -> String {
    config
        .base_url
        .clone()
        .or_else(|| std::env::var(BASE_URL_ENV).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}
