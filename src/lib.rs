//! # superres-client
//!
//! Client for a remote image super-resolution service.
//!
//! The service is asynchronous: an image is uploaded, a task id comes back,
//! and the task is polled until the enhanced image URL is ready. This crate
//! wraps that protocol with pre-flight validation, a bounded poll loop,
//! whole-sequence retries under a wall-clock timeout, an optional
//! pass-through fallback, and a closed error taxonomy so callers only ever
//! see an [`EnhancementOutcome`] or one classified [`EnhanceError`].
//!
//! ## Workflow
//!
//! ```text
//! ImageAsset
//!  │
//!  ├─ 1. Validate  format, MIME type, size (and optionally dimensions)
//!  ├─ 2. Upload    multipart POST → task id
//!  ├─ 3. Poll      GET status every 2 s, at most 16 fetches
//!  ├─ 4. Retry     whole upload+poll again on failure (default 2 retries)
//!  └─ 5. Outcome   result URL + dimensions, or fallback / classified error
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use superres_client::{EnhanceConfig, EnhanceOptions, Enhancer, ImageAsset};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from SUPERRES_API_KEY when not set explicitly
//!     let enhancer = Enhancer::from_config(EnhanceConfig::default())?;
//!     let asset = ImageAsset::new("photo.jpg", std::fs::read("photo.jpg")?);
//!     match enhancer.enhance(&asset, &EnhanceOptions::default()).await {
//!         Ok(out) => println!("{} ({}x{})", out.image_url, out.width, out.height),
//!         Err(e) => eprintln!("[{}] {}", e.kind, e),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `superres` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `testing` | off   | Exposes `testing::ScriptedService` for downstream tests |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! superres-client = { version = "0.1", default-features = false }
//! ```
//!
//! ## Testing
//!
//! With the `testing` feature, `testing::ScriptedService` implements
//! [`EnhanceService`] from queued responses, so the full workflow runs
//! without a network.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod asset;
pub mod classify;
pub mod config;
pub mod diagnostics;
pub mod enhance;
pub mod error;
pub mod error_log;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod service;
pub mod stream;
pub mod task;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use asset::ImageAsset;
pub use classify::{api_message, classify};
pub use config::{EnhanceConfig, EnhanceConfigBuilder, EnhanceOptions};
pub use diagnostics::{diagnose_system, SystemDiagnostics};
pub use enhance::{enhance_sync, Enhancer};
pub use error::{EnhanceError, ErrorKind, Failure, TransportError};
pub use error_log::{ErrorLog, ErrorLogEntry};
pub use output::{BatchItem, EnhancementOutcome};
pub use pipeline::input::load_asset;
pub use pipeline::validate::{validate, validate_dimensions, ValidationOptions, ValidationResult};
pub use progress::{EnhanceProgressCallback, NoopProgressCallback, ProgressCallback, RetryContext};
pub use service::{EnhanceService, HttpEnhanceService};
pub use stream::{enhance_stream, EnhanceStream};
pub use task::{Task, TaskId, TaskState};
