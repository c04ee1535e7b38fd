//! Progress-callback trait for enhancement workflow events.
//!
//! Inject an [`Arc<dyn EnhanceProgressCallback>`] via
//! [`crate::config::EnhanceConfigBuilder::progress_callback`] to receive
//! events as each call validates, uploads, polls, retries, and finishes.
//!
//! # Example
//!
//! ```rust
//! use superres_client::{EnhanceConfig, EnhanceProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
//!
//! struct PollCounter {
//!     polls: AtomicU32,
//! }
//!
//! impl EnhanceProgressCallback for PollCounter {
//!     fn on_poll(&self, _name: &str, _task_id: &str, attempt: u32, max_attempts: u32) {
//!         self.polls.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("still processing ({attempt}/{max_attempts})");
//!     }
//! }
//!
//! let counter = Arc::new(PollCounter { polls: AtomicU32::new(0) });
//!
//! let config = EnhanceConfig::builder()
//!     .api_key("key")
//!     .progress_callback(counter as Arc<dyn EnhanceProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::EnhanceError;
use crate::output::EnhancementOutcome;
use std::sync::Arc;

/// Attempt bookkeeping for one orchestrated call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryContext {
    /// 1-based attempt number.
    pub attempt: u32,
    /// `max_retries + 1`.
    pub max_attempts: u32,
}

impl RetryContext {
    pub fn is_last(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// Called by the workflow as each enhancement call progresses.
///
/// Every method has a no-op default. When several calls run concurrently
/// (batch or stream), methods may be invoked from different tasks at once;
/// `name` identifies which asset the event belongs to.
pub trait EnhanceProgressCallback: Send + Sync {
    /// Validation passed; the network workflow is about to start.
    fn on_validated(&self, name: &str, size_bytes: u64) {
        let _ = (name, size_bytes);
    }

    /// An upload-and-poll attempt is starting.
    fn on_attempt_start(&self, name: &str, ctx: RetryContext) {
        let _ = (name, ctx);
    }

    /// The service accepted the upload.
    fn on_uploaded(&self, name: &str, task_id: &str) {
        let _ = (name, task_id);
    }

    /// The task is still pending after poll number `attempt` (0-based).
    fn on_poll(&self, name: &str, task_id: &str, attempt: u32, max_attempts: u32) {
        let _ = (name, task_id, attempt, max_attempts);
    }

    /// An attempt failed; another may follow.
    fn on_attempt_failed(&self, name: &str, ctx: RetryContext, error: &EnhanceError) {
        let _ = (name, ctx, error);
    }

    /// Every attempt failed and the degraded pass-through result is used.
    fn on_fallback(&self, name: &str, error: &EnhanceError) {
        let _ = (name, error);
    }

    /// The call finished with an outcome.
    fn on_complete(&self, name: &str, outcome: &EnhancementOutcome) {
        let _ = (name, outcome);
    }

    /// The call finished with an error.
    fn on_error(&self, name: &str, error: &EnhanceError) {
        let _ = (name, error);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl EnhanceProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::EnhanceConfig`].
pub type ProgressCallback = Arc<dyn EnhanceProgressCallback>;
