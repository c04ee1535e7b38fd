//! Rolling on-disk log of classified failures.
//!
//! The file is a JSON array of the most recent [`MAX_ENTRIES`] errors, newest
//! last. Writes go through a temp file in the same directory and a rename so
//! a crash mid-write never leaves a truncated log. Recording is best-effort
//! from the workflow's point of view: failures to persist are logged and
//! swallowed by [`crate::Enhancer`], never surfaced to the caller.

use crate::error::{EnhanceError, ErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Entries kept; older ones are dropped first.
pub const MAX_ENTRIES: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorLogEntry {
    pub fn from_error(err: &EnhanceError) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: err.kind,
            message: err.message.clone(),
            detail: err.detail(),
        }
    }
}

/// A JSON-file error log shared by concurrent calls.
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ErrorLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one error, trimming the log to [`MAX_ENTRIES`].
    pub async fn record(&self, err: &EnhanceError) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = read_entries(&self.path).await?;
        entries.push(ErrorLogEntry::from_error(err));
        if entries.len() > MAX_ENTRIES {
            let excess = entries.len() - MAX_ENTRIES;
            entries.drain(..excess);
        }
        write_entries(&self.path, entries).await?;
        debug!("Recorded {} error in {}", err.kind, self.path.display());
        Ok(())
    }

    /// All stored entries, oldest first. A missing file is an empty log.
    pub async fn entries(&self) -> std::io::Result<Vec<ErrorLogEntry>> {
        let _guard = self.lock.lock().await;
        read_entries(&self.path).await
    }

    /// Remove every entry.
    pub async fn clear(&self) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

async fn read_entries(path: &Path) -> std::io::Result<Vec<ErrorLogEntry>> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&raw).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

async fn write_entries(path: &Path, entries: Vec<ErrorLogEntry>) -> std::io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;
        let json = serde_json::to_vec_pretty(&entries)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(&json)?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)?
}
