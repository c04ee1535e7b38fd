//! Pipeline stages for one enhancement call.
//!
//! Each submodule implements exactly one step so it can be tested against a
//! scripted service in isolation. The orchestrator in [`crate::enhance`]
//! strings them together and owns retries, timeouts, and fallback.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ validate ──▶ upload ──▶ poll ──▶ outcome
//! (path/URL)  (limits)    (task id)  (bounded)   │
//!                                                └─▶ encode (fallback data URI)
//! ```
//!
//! 1. [`input`]: read a local file or download a URL into an `ImageAsset`
//! 2. [`validate`]: pure pre-flight checks (format, MIME, size) plus the
//!    optional header-only dimension check in `spawn_blocking`
//! 3. [`upload`]: multipart submit; returns the service task id
//! 4. [`poll`]: fixed-interval status loop capped at `max_attempts + 1`
//!    fetches
//! 5. [`encode`]: inline the original bytes as a `data:` URI when the
//!    degraded fallback is used

pub mod encode;
pub mod input;
pub mod poll;
pub mod upload;
pub mod validate;
