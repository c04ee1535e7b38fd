//! Eager enhancement entry points.
//!
//! [`Enhancer::enhance`] validates one asset, then runs upload and poll under
//! a wall-clock timeout, retrying the whole sequence with a fixed pause. When
//! every attempt fails it either falls back to the original image (if
//! enabled) or returns the last classified error. Use
//! [`crate::stream::enhance_stream`] instead when you want results for many
//! assets as they finish.

use crate::asset::ImageAsset;
use crate::classify::classify;
use crate::config::{resolve_base_url, EnhanceConfig, EnhanceOptions, API_KEY_ENV};
use crate::diagnostics;
use crate::error::{EnhanceError, ErrorKind, Failure};
use crate::error_log::ErrorLog;
use crate::output::{BatchItem, EnhancementOutcome};
use crate::pipeline::validate::{probe_dimensions, readable_file_size, validate, validate_dimensions};
use crate::pipeline::{encode, input, poll, upload};
use crate::progress::{EnhanceProgressCallback, RetryContext};
use crate::service::{EnhanceService, HttpEnhanceService};
use crate::task::Task;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Drives enhancement calls against one service.
///
/// Cheap to clone; clones share the service, config, and error log.
///
/// # Example
/// ```rust,no_run
/// use superres_client::{EnhanceConfig, EnhanceOptions, Enhancer, ImageAsset};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = EnhanceConfig::builder().api_key("my-key").build()?;
/// let enhancer = Enhancer::from_config(config)?;
///
/// let asset = ImageAsset::new("photo.jpg", std::fs::read("photo.jpg")?);
/// let outcome = enhancer.enhance(&asset, &EnhanceOptions::default()).await?;
/// println!("{} ({}x{})", outcome.image_url, outcome.width, outcome.height);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Enhancer {
    service: Arc<dyn EnhanceService>,
    config: Arc<EnhanceConfig>,
    error_log: Option<Arc<ErrorLog>>,
}

impl fmt::Debug for Enhancer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enhancer")
            .field("config", &self.config)
            .field("error_log", &self.error_log.as_ref().map(|l| l.path()))
            .finish()
    }
}

impl Enhancer {
    /// Use `service` directly; `config.service` is ignored.
    pub fn new(service: Arc<dyn EnhanceService>, config: EnhanceConfig) -> Self {
        let error_log = config
            .error_log_path
            .as_ref()
            .map(|p| Arc::new(ErrorLog::open(p.clone())));
        Self {
            service,
            config: Arc::new(config),
            error_log,
        }
    }

    /// Resolve the service from `config`, from most to least specific:
    ///
    /// 1. **Pre-built service** (`config.service`), used as-is. This is how
    ///    tests and callers with custom transports plug in.
    /// 2. **Explicit API key** (`config.api_key`) with an HTTP service at the
    ///    configured base URL.
    /// 3. **`SUPERRES_API_KEY`** from the environment.
    ///
    /// With none of these the call fails with an `Internal` configuration
    /// error.
    pub fn from_config(config: EnhanceConfig) -> Result<Self, EnhanceError> {
        let service = resolve_service(&config)?;
        Ok(Self::new(service, config))
    }

    pub fn config(&self) -> &EnhanceConfig {
        &self.config
    }

    pub fn error_log(&self) -> Option<&ErrorLog> {
        self.error_log.as_deref()
    }

    /// Enhance one asset.
    ///
    /// # Errors
    /// - `Validation` when pre-flight checks fail; no network call is made.
    /// - The last attempt's classified error when every attempt fails and no
    ///   fallback applies.
    pub async fn enhance(
        &self,
        asset: &ImageAsset,
        options: &EnhanceOptions,
    ) -> Result<EnhancementOutcome, EnhanceError> {
        let start = Instant::now();
        let name = asset.name();
        let progress = self.config.progress_callback.as_deref();
        info!(
            "Enhancing '{}' ({})",
            name,
            readable_file_size(asset.size_bytes())
        );

        if self.config.run_diagnostics {
            diagnostics::spawn_advisory_check();
        }

        let result = self.run(asset, options, progress).await;

        match &result {
            Ok(outcome) => {
                info!(
                    "Enhanced '{}' in {}ms ({} attempt(s){})",
                    name,
                    start.elapsed().as_millis(),
                    outcome.attempts,
                    if outcome.degraded { ", degraded" } else { "" }
                );
                if let Some(cb) = progress {
                    cb.on_complete(name, outcome);
                }
            }
            Err(err) => {
                if let Some(cb) = progress {
                    cb.on_error(name, err);
                }
                self.record(err).await;
            }
        }
        result
    }

    /// Enhance `asset` and write the resulting image to `output_path`.
    ///
    /// The result is downloaded (or decoded from the fallback `data:` URI)
    /// and written atomically: temp file in the target directory, then
    /// rename. Partial files are never left behind.
    pub async fn enhance_to_file(
        &self,
        asset: &ImageAsset,
        output_path: impl AsRef<Path>,
        options: &EnhanceOptions,
    ) -> Result<EnhancementOutcome, EnhanceError> {
        let outcome = self.enhance(asset, options).await?;
        let path = output_path.as_ref();

        let bytes = if encode::is_data_uri(&outcome.image_url) {
            encode::decode_data_uri(&outcome.image_url)
                .map(|(_, data)| Bytes::from(data))
                .ok_or_else(|| {
                    EnhanceError::new(ErrorKind::Internal, "Fallback result is not a valid data URI")
                })?
        } else {
            input::fetch_bytes(
                &outcome.image_url,
                self.config.download_timeout(),
            )
            .await?
        };

        write_atomic(path, bytes).await.map_err(|e| {
            EnhanceError::new(
                ErrorKind::Internal,
                format!("Failed to write output file: {}", path.display()),
            )
            .with_cause(e)
        })?;
        info!("Wrote {}", path.display());
        Ok(outcome)
    }

    /// Enhance every asset with up to `config.concurrency` calls in flight.
    ///
    /// Results come back in input order; one asset failing does not stop the
    /// others.
    pub async fn enhance_batch(
        &self,
        assets: &[ImageAsset],
        options: &EnhanceOptions,
    ) -> Vec<BatchItem> {
        let concurrency = self.config.in_flight_limit();
        info!(
            "Enhancing {} asset(s), concurrency {}",
            assets.len(),
            concurrency
        );
        stream::iter(assets.iter().enumerate().map(|(index, asset)| async move {
            BatchItem {
                index,
                name: asset.name().to_string(),
                result: self.enhance(asset, options).await,
            }
        }))
        .buffered(concurrency)
        .collect()
        .await
    }

    async fn run(
        &self,
        asset: &ImageAsset,
        options: &EnhanceOptions,
        progress: Option<&dyn EnhanceProgressCallback>,
    ) -> Result<EnhancementOutcome, EnhanceError> {
        let name = asset.name();
        let limits = options.validation.as_ref().unwrap_or(&self.config.validation);

        let checked = validate(Some(asset), limits);
        if !checked.valid {
            return Err(classify(Failure::Validation(checked.errors)));
        }
        if self.config.check_dimensions {
            let dims = validate_dimensions(asset).await;
            if !dims.valid {
                return Err(classify(Failure::Validation(dims.errors)));
            }
        }
        if let Some(cb) = progress {
            cb.on_validated(name, asset.size_bytes());
        }

        let max_attempts = self.config.total_attempts();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let ctx = RetryContext {
                attempt,
                max_attempts,
            };
            if attempt > 1 {
                tokio::time::sleep(self.config.retry_delay()).await;
            }
            if let Some(cb) = progress {
                cb.on_attempt_start(name, ctx);
            }

            match self.attempt(asset, progress).await {
                Ok(task) => return Ok(EnhancementOutcome::from_task(task, attempt)),
                Err(err) => {
                    warn!(
                        "Attempt {}/{} for '{}' failed ({}): {}",
                        attempt, max_attempts, name, err.kind, err
                    );
                    if let Some(cb) = progress {
                        cb.on_attempt_failed(name, ctx, &err);
                    }
                    last_error = Some(err);
                }
            }
        }

        let err = last_error.unwrap_or_else(|| classify(Failure::Message(String::new())));
        if self.config.enable_fallback && options.allow_fallback {
            warn!(
                "All {} attempt(s) for '{}' failed; returning the original image",
                max_attempts, name
            );
            if let Some(cb) = progress {
                cb.on_fallback(name, &err);
            }
            return Ok(fallback(asset, max_attempts).await);
        }
        Err(err)
    }

    /// One upload-and-poll sequence under the configured timeout.
    async fn attempt(
        &self,
        asset: &ImageAsset,
        progress: Option<&dyn EnhanceProgressCallback>,
    ) -> Result<Task, EnhanceError> {
        let name = asset.name();
        let service = self.service.as_ref();
        let work = async {
            let task_id = upload::upload(service, asset).await?;
            if let Some(cb) = progress {
                cb.on_uploaded(name, task_id.as_str());
            }
            poll::poll(service, task_id, self.config.poll_policy(), name, progress).await
        };

        match tokio::time::timeout(self.config.timeout(), work).await {
            Ok(result) => result,
            Err(_) => Err(EnhanceError::process_timeout(self.config.timeout_ms)),
        }
    }

    async fn record(&self, err: &EnhanceError) {
        if let Some(log) = &self.error_log {
            if let Err(e) = log.record(err).await {
                warn!("Failed to write error log {}: {}", log.path().display(), e);
            }
        }
    }
}

/// Synchronous wrapper around [`Enhancer::enhance`].
///
/// Creates a temporary tokio runtime internally.
pub fn enhance_sync(
    config: &EnhanceConfig,
    asset: &ImageAsset,
) -> Result<EnhancementOutcome, EnhanceError> {
    let runtime = tokio::runtime::Runtime::new().map_err(|e| {
        EnhanceError::new(ErrorKind::Internal, "Failed to create tokio runtime").with_cause(e)
    })?;
    let enhancer = Enhancer::from_config(config.clone())?;
    runtime.block_on(enhancer.enhance(asset, &EnhanceOptions::default()))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn resolve_service(config: &EnhanceConfig) -> Result<Arc<dyn EnhanceService>, EnhanceError> {
    if let Some(ref service) = config.service {
        return Ok(Arc::clone(service));
    }

    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
        .ok_or_else(|| {
            EnhanceError::config(format!(
                "no API key configured; pass one explicitly or set {API_KEY_ENV}"
            ))
        })?;

    let base_url = resolve_base_url(config);
    debug!("Using enhancement service at {}", base_url);
    let service = HttpEnhanceService::new(
        base_url,
        api_key,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    Ok(Arc::new(service))
}

/// The pass-through result: original bytes, header dimensions when readable.
async fn fallback(asset: &ImageAsset, attempts: u32) -> EnhancementOutcome {
    let (width, height) = probe_dimensions(asset).await.unwrap_or((0, 0));
    EnhancementOutcome {
        image_url: encode::to_data_uri(asset),
        width,
        height,
        task_id: None,
        degraded: true,
        attempts,
    }
}

async fn write_atomic(path: &Path, bytes: Bytes) -> std::io::Result<()> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)?
}
