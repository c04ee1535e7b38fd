//! Failure classification and user-facing messages.
//!
//! Rules are applied in priority order:
//!
//! | # | Input | Kind |
//! |---|-------|------|
//! | 1 | validation errors | `Validation` |
//! | 2 | HTTP status | `Api` (message from the status table) |
//! | 3 | request sent, no response | `Network` |
//! | 4 | client timeout, or message mentions "timeout" | `Timeout` |
//! | 5 | message mentions "memory" / "allocation" | `Memory` |
//! | 6 | anything else | `Internal`, or `Unknown` when there is no message |
//!
//! The raw failure always travels along as the error's `cause`; only the
//! canned message is meant for end users.

use crate::error::{EnhanceError, ErrorKind, Failure, TransportError};

pub const NETWORK_MESSAGE: &str = "Network error. Please check your connection and try again.";
pub const TIMEOUT_MESSAGE: &str = "The request timed out. Please check your connection and try again.";
pub const MEMORY_MESSAGE: &str = "Out of memory while processing image";
pub const INTERNAL_MESSAGE: &str = "An unexpected error occurred. Please try again later.";
pub const UNKNOWN_MESSAGE: &str = "An unknown error occurred. Please try again.";

/// Map a raw failure into a classified [`EnhanceError`].
pub fn classify(failure: Failure) -> EnhanceError {
    match failure {
        Failure::Validation(errors) => {
            let message = if errors.is_empty() {
                "Invalid image. Please check file requirements and try again.".to_string()
            } else {
                errors.join("\n")
            };
            EnhanceError::new(ErrorKind::Validation, message)
        }
        Failure::Transport(err) => classify_transport(err),
        Failure::Message(msg) => classify_message(msg),
    }
}

fn classify_transport(err: TransportError) -> EnhanceError {
    match &err {
        TransportError::Status { status, .. } => {
            let status = *status;
            EnhanceError::new(ErrorKind::Api, api_message(status))
                .with_status(status)
                .with_cause(err)
        }
        TransportError::NoResponse { .. } => {
            EnhanceError::new(ErrorKind::Network, NETWORK_MESSAGE).with_cause(err)
        }
        TransportError::Timeout { .. } => {
            EnhanceError::new(ErrorKind::Timeout, TIMEOUT_MESSAGE).with_cause(err)
        }
        TransportError::Decode { .. } => {
            EnhanceError::new(ErrorKind::Internal, INTERNAL_MESSAGE).with_cause(err)
        }
    }
}

fn classify_message(msg: String) -> EnhanceError {
    let lower = msg.to_lowercase();
    let kind = if lower.contains("timeout") || lower.contains("timed out") {
        ErrorKind::Timeout
    } else if lower.contains("memory") || lower.contains("allocation") {
        ErrorKind::Memory
    } else if lower.trim().is_empty() {
        ErrorKind::Unknown
    } else {
        ErrorKind::Internal
    };

    let message = match kind {
        ErrorKind::Timeout => TIMEOUT_MESSAGE,
        ErrorKind::Memory => MEMORY_MESSAGE,
        ErrorKind::Unknown => return EnhanceError::new(kind, UNKNOWN_MESSAGE),
        _ => INTERNAL_MESSAGE,
    };
    EnhanceError::new(kind, message).with_cause(msg)
}

/// User-facing sentence for an HTTP status returned by the service.
pub fn api_message(status: u16) -> String {
    match status {
        400 => "The request was invalid. Please check your image and try again.".into(),
        401 => "Authentication failed. Please check your API key.".into(),
        403 => "You don't have permission to perform this operation.".into(),
        404 => "The image enhancing service couldn't be found. Please try again later.".into(),
        413 => "The image is too large. Please try a smaller image.".into(),
        429 => "Too many requests. Please wait a moment and try again.".into(),
        500..=599 => {
            "The image enhancement server is currently unavailable. Please try again later.".into()
        }
        other => format!("Server error ({other}). Please try again later."),
    }
}
