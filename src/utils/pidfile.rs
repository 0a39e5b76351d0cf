//! PID files for running services.
//!
//! `service run` holds a PID file next to the installed service directory
//! (`<services>/<name>.pid`) for as long as the service runs; `service status`
//! reads it back.
//!
//! # Design
//!
//! This is an advisory mechanism, not a hard lock. Liveness is checked through
//! `/proc/<pid>`, so on systems without `/proc` every recorded PID looks stale.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{HoneycombError, Result};

/// PID file guard that removes the file on drop.
#[derive(Debug)]
pub struct PidFileGuard {
    path: PathBuf,
}

impl PidFileGuard {
    /// Write the current PID to `path`.
    ///
    /// Fails if the file names a process that is still running. A stale file
    /// (dead process or unreadable content) is replaced.
    pub fn acquire_at(path: PathBuf) -> Result<Self> {
        match read_status(&path) {
            ServiceStatus::Running(pid) => {
                return Err(HoneycombError::Runtime(format!(
                    "Service already running with PID {}. \
                     If this is incorrect, remove {} and try again.",
                    pid,
                    path.display()
                )));
            }
            ServiceStatus::Stale => {
                warn!(path = %path.display(), "Found stale PID file, cleaning up");
                let _ = fs::remove_file(&path);
            }
            ServiceStatus::NotRunning => {}
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pid = std::process::id();
        fs::write(&path, pid.to_string())?;
        debug!(path = %path.display(), pid, "Wrote PID file");

        Ok(Self { path })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove PID file {}: {}", self.path.display(), e);
        }
    }
}

/// State of a service according to its PID file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Running(u32),
    /// A PID file exists but its process is gone.
    Stale,
    NotRunning,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running(pid) => write!(f, "running (pid: {})", pid),
            Self::Stale => f.write_str("not running (stale pidfile)"),
            Self::NotRunning => f.write_str("not running"),
        }
    }
}

/// Read the PID file at `path` and check whether its process is alive.
pub fn read_status(path: &Path) -> ServiceStatus {
    if !path.exists() {
        return ServiceStatus::NotRunning;
    }
    match fs::read_to_string(path)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok())
    {
        Some(pid) if is_process_running(pid) => ServiceStatus::Running(pid),
        _ => ServiceStatus::Stale,
    }
}

/// Best-effort liveness check through `/proc/<pid>`.
fn is_process_running(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}
