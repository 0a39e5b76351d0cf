//! Honeycomb home directory and on-disk layout.
//!
//! The home is resolved from the `--home` flag, then the `HONEYCOMB_HOME`
//! environment variable, then `~/.honeycomb`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::plugins::defs::{PluginKind, DEBUG_LOG_FILE};

/// Environment variable overriding the default home.
pub const HOME_ENV: &str = "HONEYCOMB_HOME";
/// Default home directory name under the user's home.
pub const DEFAULT_HOME_DIR: &str = ".honeycomb";
/// Environment variable that turns on debug console output.
pub const DEBUG_ENV: &str = "DEBUG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub home: PathBuf,
}

impl Config {
    /// Default home: `~/.honeycomb` (falls back to `./.honeycomb` without a user home).
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_HOME_DIR)
    }

    /// Resolve the home from the flag value and the process environment.
    pub fn resolve(home_flag: Option<PathBuf>) -> Self {
        Self::resolve_with(home_flag, std::env::var(HOME_ENV).ok())
    }

    /// Resolution with an explicit environment value.
    pub fn resolve_with(home_flag: Option<PathBuf>, home_env: Option<String>) -> Self {
        let home = home_flag
            .or_else(|| home_env.filter(|h| !h.is_empty()).map(PathBuf::from))
            .unwrap_or_else(Self::dir);
        Self { home }
    }

    /// Create the home with its `services/` and `integrations/` directories.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [self.services_dir(), self.integrations_dir()] {
            if !dir.is_dir() {
                debug!(dir = %dir.display(), "Creating directory");
                fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }

    pub fn services_dir(&self) -> PathBuf {
        self.plugins_dir(PluginKind::Service)
    }

    pub fn integrations_dir(&self) -> PathBuf {
        self.plugins_dir(PluginKind::Integration)
    }

    pub fn plugins_dir(&self, kind: PluginKind) -> PathBuf {
        self.home.join(kind.dir_name())
    }

    pub fn debug_log_path(&self) -> PathBuf {
        self.home.join(DEBUG_LOG_FILE)
    }

    /// Directory of an installed plugin, or `name` itself when `editable`.
    pub fn plugin_path(&self, kind: PluginKind, name: &str, editable: bool) -> PathBuf {
        if editable {
            PathBuf::from(name)
        } else {
            self.plugins_dir(kind).join(name)
        }
    }

    /// PID file of a running service: `<service_path>.pid`.
    pub fn pid_path(service_path: &Path) -> PathBuf {
        let mut name = service_path.as_os_str().to_owned();
        name.push(".pid");
        PathBuf::from(name)
    }
}

/// Whether `DEBUG` is set to anything but an empty string.
pub fn debug_env_enabled() -> bool {
    std::env::var(DEBUG_ENV).map(|v| !v.is_empty()).unwrap_or(false)
}

/// Whether the current process runs as root (uid 0).
///
/// Reads `/proc/self/status`; where that is unavailable the check passes.
pub fn is_running_as_root() -> bool {
    fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| parse_uid(&status))
        .map(|uid| uid == 0)
        .unwrap_or(false)
}

/// Real uid from the `Uid:` line of a `/proc/<pid>/status` file.
fn parse_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}
