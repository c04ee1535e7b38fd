//! Advisory host diagnostics.
//!
//! Reports conditions that commonly explain failed or slow enhancement runs:
//! low free memory for decoding large images, too little temp-dir space for
//! result downloads, and no visible GPU device. Nothing here affects the
//! workflow; the orchestrator only logs the issues.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use sysinfo::{Disks, System};
use tracing::{debug, warn};

/// Below this much available memory the host is flagged.
pub const MIN_AVAILABLE_MEMORY_MB: u64 = 500;
/// Below this much free space in the temp dir the host is flagged.
pub const MIN_TEMP_SPACE_MB: u64 = 100;

const GPU_DEVICE_PATHS: &[&str] = &["/dev/dri", "/proc/driver/nvidia", "/dev/nvidia0"];

#[derive(Debug, Clone, Serialize)]
pub struct SystemDiagnostics {
    pub timestamp: DateTime<Utc>,
    pub total_memory_mb: u64,
    pub available_memory_mb: u64,
    /// Free space on the volume holding the temp dir; None if unknown.
    pub temp_space_mb: Option<u64>,
    pub gpu_detected: bool,
    pub issues: Vec<String>,
}

impl SystemDiagnostics {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Probe the host. Runs the blocking sysinfo calls off the executor.
pub async fn diagnose_system() -> SystemDiagnostics {
    let temp_dir = std::env::temp_dir();
    match tokio::task::spawn_blocking(move || collect(&temp_dir)).await {
        Ok(diag) => diag,
        Err(e) => {
            warn!("System diagnostics task failed: {}", e);
            SystemDiagnostics {
                timestamp: Utc::now(),
                total_memory_mb: 0,
                available_memory_mb: 0,
                temp_space_mb: None,
                gpu_detected: false,
                issues: vec![format!("Diagnostics unavailable: {e}")],
            }
        }
    }
}

/// Spawn [`diagnose_system`] detached and log every issue it finds.
pub(crate) fn spawn_advisory_check() {
    tokio::spawn(async {
        let diag = diagnose_system().await;
        debug!(
            available_memory_mb = diag.available_memory_mb,
            temp_space_mb = ?diag.temp_space_mb,
            gpu_detected = diag.gpu_detected,
            "System diagnostics"
        );
        for issue in &diag.issues {
            warn!("System check: {}", issue);
        }
    });
}

fn collect(temp_dir: &Path) -> SystemDiagnostics {
    let mut system = System::new();
    system.refresh_memory();
    let total_memory_mb = to_mb(system.total_memory());
    let available_memory_mb = to_mb(system.available_memory());

    let temp_space_mb = free_space_for(temp_dir).map(to_mb);
    let gpu_detected = GPU_DEVICE_PATHS.iter().any(|p| Path::new(p).exists());

    let issues = assess(available_memory_mb, temp_space_mb, gpu_detected);

    SystemDiagnostics {
        timestamp: Utc::now(),
        total_memory_mb,
        available_memory_mb,
        temp_space_mb,
        gpu_detected,
        issues,
    }
}

/// Available bytes on the disk with the longest mount point containing `path`.
fn free_space_for(path: &Path) -> Option<u64> {
    let path: PathBuf = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let disks = Disks::new_with_refreshed_list();
    disks
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

fn assess(available_memory_mb: u64, temp_space_mb: Option<u64>, gpu_detected: bool) -> Vec<String> {
    let mut issues = Vec::new();
    if available_memory_mb < MIN_AVAILABLE_MEMORY_MB {
        issues.push(format!(
            "Low available memory: {available_memory_mb}MB (recommended at least {MIN_AVAILABLE_MEMORY_MB}MB)"
        ));
    }
    if let Some(space) = temp_space_mb {
        if space < MIN_TEMP_SPACE_MB {
            issues.push(format!(
                "Low temporary disk space: {space}MB (recommended at least {MIN_TEMP_SPACE_MB}MB)"
            ));
        }
    }
    if !gpu_detected {
        issues.push("No GPU device detected; local image decoding will use the CPU".to_string());
    }
    issues
}

fn to_mb(bytes: u64) -> u64 {
    bytes / (1024 * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_host_has_no_issues() {
        assert!(assess(4096, Some(10_000), true).is_empty());
    }

    #[test]
    fn low_memory_is_flagged() {
        let issues = assess(499, Some(10_000), true);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("Low available memory: 499MB"));
    }

    #[test]
    fn unknown_temp_space_is_not_flagged() {
        let issues = assess(4096, None, false);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("No GPU"));
    }

    #[test]
    fn low_disk_is_flagged() {
        let issues = assess(4096, Some(10), true);
        assert!(issues[0].contains("Low temporary disk space: 10MB"));
    }

    #[test]
    fn to_mb_truncates() {
        assert_eq!(to_mb(1024 * 1024 * 3 + 5), 3);
    }

    #[tokio::test]
    async fn diagnose_reports_memory() {
        let diag = diagnose_system().await;
        assert!(diag.total_memory_mb >= diag.available_memory_mb);
        assert_eq!(diag.is_healthy(), diag.issues.is_empty());
    }
}
