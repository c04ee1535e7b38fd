//! Error types for the superres-client library.
//!
//! Two layers of errors exist, one per side of the transport boundary:
//!
//! * [`TransportError`] (raw): a tagged description of what went wrong on
//!   the wire (HTTP status, no response, timeout, undecodable body). Produced
//!   only by [`crate::service::EnhanceService`] implementations.
//!
//! * [`EnhanceError`] (classified): the only error callers ever see. It
//!   carries a stable [`ErrorKind`], a short user-facing message, and the raw
//!   cause for diagnostics. Built by [`crate::classify`] or directly by the
//!   pipeline stages that know their own kind (upload, poll).
//!
//! [`Failure`] is the closed input set of the classifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Boxed underlying error kept for logs.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    Api,
    Upload,
    Processing,
    Network,
    Timeout,
    Memory,
    Internal,
    Unknown,
}

impl ErrorKind {
    /// Lowercase tag, stable across releases.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Api => "api",
            ErrorKind::Upload => "upload",
            ErrorKind::Processing => "processing",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Memory => "memory",
            ErrorKind::Internal => "internal",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified enhancement failure.
///
/// `Display` renders only the user-facing message. The raw cause is
/// reachable through [`std::error::Error::source`] and [`EnhanceError::detail`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EnhanceError {
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP status when the failure came from a non-2xx response.
    pub status: Option<u16>,
    #[source]
    pub cause: Option<BoxError>,
}

impl EnhanceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// The underlying cause rendered for logs, if any.
    pub fn detail(&self) -> Option<String> {
        self.cause.as_ref().map(|c| c.to_string())
    }

    /// Invalid or incomplete configuration.
    pub fn config(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(ErrorKind::Internal, format!("Invalid configuration: {reason}"))
    }

    /// The whole upload-and-poll attempt exceeded its wall-clock budget.
    pub(crate) fn process_timeout(timeout_ms: u64) -> Self {
        Self::new(ErrorKind::Timeout, "Enhancement process timed out").with_cause(
            TransportError::Timeout {
                after_ms: Some(timeout_ms),
            },
        )
    }
}

/// What went wrong on the wire, as a closed set of tags.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request was sent (or could not be sent) and no response arrived.
    #[error("no response from service: {reason}")]
    NoResponse { reason: String },

    /// The request exceeded its client-side timeout.
    #[error("request timed out{}", after_suffix(.after_ms))]
    Timeout { after_ms: Option<u64> },

    /// A response arrived but its body could not be understood.
    #[error("could not decode service response: {reason}")]
    Decode { reason: String },
}

fn after_suffix(after_ms: &Option<u64>) -> String {
    after_ms.map(|ms| format!(" after {ms}ms")).unwrap_or_default()
}

/// Input of the error classifier.
#[derive(Debug)]
pub enum Failure {
    /// Pre-flight validation rejected the asset.
    Validation(Vec<String>),
    /// The transport reported a tagged failure.
    Transport(TransportError),
    /// Anything else, described only by a message.
    Message(String),
}

impl From<TransportError> for Failure {
    fn from(e: TransportError) -> Self {
        Failure::Transport(e)
    }
}

impl From<TransportError> for EnhanceError {
    fn from(e: TransportError) -> Self {
        crate::classify::classify(Failure::Transport(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn display_shows_only_user_message() {
        let e = EnhanceError::new(ErrorKind::Api, "Authentication failed.")
            .with_status(401)
            .with_cause(TransportError::Status {
                status: 401,
                message: "bad key sk-123".into(),
            });
        assert_eq!(e.to_string(), "Authentication failed.");
        assert!(e.source().is_some());
        assert!(e.detail().unwrap().contains("sk-123"));
    }

    #[test]
    fn kind_tags_are_lowercase() {
        assert_eq!(ErrorKind::Validation.as_str(), "validation");
        assert_eq!(ErrorKind::Timeout.to_string(), "timeout");
        let json = serde_json::to_string(&ErrorKind::Memory).unwrap();
        assert_eq!(json, "\"memory\"");
    }

    #[test]
    fn timeout_display_with_and_without_duration() {
        let with = TransportError::Timeout {
            after_ms: Some(5000),
        };
        assert_eq!(with.to_string(), "request timed out after 5000ms");
        let without = TransportError::Timeout { after_ms: None };
        assert_eq!(without.to_string(), "request timed out");
    }

    #[test]
    fn process_timeout_is_timeout_kind() {
        let e = EnhanceError::process_timeout(60_000);
        assert_eq!(e.kind, ErrorKind::Timeout);
        assert!(e.detail().unwrap().contains("60000ms"));
    }
}
