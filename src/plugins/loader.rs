//! Manifest loading and plugin discovery
//!
//! This module resolves plugin directories, reads their `config.json`
//! manifests as raw JSON and walks an install directory registering every
//! plugin found there.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{HoneycombError, Result};

use super::defs::{PluginKind, CONFIG_FILE_NAME, PARAMETERS};
use super::integration::{register_integration, Integration};
use super::service::{register_service, ServiceType};

/// A registered plugin of either kind.
#[derive(Debug, Clone)]
pub enum Plugin {
    Service(ServiceType),
    Integration(Integration),
}

impl Plugin {
    /// Register the plugin at `dir` as a plugin of `kind`.
    pub fn register(kind: PluginKind, dir: &Path) -> Result<Self> {
        match kind {
            PluginKind::Service => register_service(dir).map(Self::Service),
            PluginKind::Integration => register_integration(dir).map(Self::Integration),
        }
    }

    pub fn kind(&self) -> PluginKind {
        match self {
            Self::Service(_) => PluginKind::Service,
            Self::Integration(_) => PluginKind::Integration,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Service(s) => &s.name,
            Self::Integration(i) => &i.name,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Service(s) => &s.label,
            Self::Integration(i) => &i.label,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Service(s) => &s.path,
            Self::Integration(i) => &i.path,
        }
    }
}

/// Resolve a plugin directory to an absolute path.
///
/// # Errors
/// - `HoneycombError::PluginNotFound` if nothing exists at `dir`
pub fn resolve_plugin_dir(kind: PluginKind, dir: &Path) -> Result<PathBuf> {
    dir.canonicalize().map_err(|e| {
        debug!(kind = %kind, dir = %dir.display(), error = %e, "Plugin directory not found");
        HoneycombError::PluginNotFound {
            kind: kind.to_string(),
            name: basename(dir),
        }
    })
}

/// Read `<dir>/config.json` as raw JSON.
///
/// Nothing is validated here; see `schema::validate_config` and
/// `params::validate_parameters`.
///
/// # Errors
/// - `HoneycombError::ConfigFileNotFound` if the manifest does not exist
/// - `HoneycombError::MalformedConfigFile` if it is not valid JSON
pub fn load_manifest(dir: &Path) -> Result<Value> {
    let manifest_path = dir.join(CONFIG_FILE_NAME);
    if !manifest_path.is_file() {
        return Err(HoneycombError::ConfigFileNotFound(manifest_path));
    }

    let content = fs::read(&manifest_path)?;
    serde_json::from_slice(&content).map_err(|source| HoneycombError::MalformedConfigFile {
        path: manifest_path,
        source,
    })
}

/// Raw `parameters` array of the manifest in `dir` (empty when absent).
pub fn get_config_parameters(dir: &Path) -> Result<Vec<Value>> {
    let manifest = load_manifest(dir)?;
    match manifest.get(PARAMETERS) {
        Some(Value::Array(entries)) => Ok(entries.clone()),
        _ => Ok(Vec::new()),
    }
}

/// Register every plugin installed under `dir`.
///
/// Subdirectories without a `config.json` are ignored. Plugins that fail
/// registration are logged as warnings and skipped; the overall discovery
/// only fails if `dir` cannot be read.
pub fn discover_plugins(kind: PluginKind, dir: &Path) -> Result<Vec<Plugin>> {
    let mut plugins = Vec::new();

    if !dir.is_dir() {
        info!(kind = %kind, dir = %dir.display(), "Plugin directory does not exist, skipping");
        return Ok(plugins);
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir() && path.join(CONFIG_FILE_NAME).exists())
        .collect();
    entries.sort();

    for entry_path in entries {
        match Plugin::register(kind, &entry_path) {
            Ok(plugin) => {
                debug!(kind = %kind, plugin = %plugin.name(), "Discovered plugin");
                plugins.push(plugin);
            }
            Err(e) => {
                warn!(
                    dir = %entry_path.display(),
                    error = %e,
                    "Failed to register plugin, skipping"
                );
            }
        }
    }

    Ok(plugins)
}

pub(crate) fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn service_manifest(name: &str) -> Value {
        json!({
            "service": {
                "name": name,
                "label": "Simple HTTP",
                "allow_many": false,
                "supported_os_families": "All",
                "ports": [{"port": 8888, "protocol": "TCP"}]
            },
            "event_types": [{
                "name": format!("{}_request", name),
                "label": "HTTP request",
                "policy": "Alert",
                "fields": ["originating_ip", "originating_port", "request"]
            }],
            "parameters": [
                {"value": "port", "label": "Port", "type": "integer", "default": 8888, "required": true}
            ]
        })
    }

    fn write_manifest(dir: &Path, manifest: &Value) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(CONFIG_FILE_NAME), manifest.to_string()).unwrap();
    }

    // ---- load_manifest tests ----

    #[test]
    fn test_load_manifest_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = load_manifest(tmp.path()).unwrap_err();
        assert!(matches!(err, HoneycombError::ConfigFileNotFound(ref p) if p.ends_with("config.json")));
    }

    #[test]
    fn test_load_manifest_malformed_json() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();
        let err = load_manifest(tmp.path()).unwrap_err();
        assert!(matches!(err, HoneycombError::MalformedConfigFile { .. }));
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_load_manifest_invalid_utf8() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), b"{\"a\": \"\xff\"}").unwrap();
        let err = load_manifest(tmp.path()).unwrap_err();
        assert!(matches!(err, HoneycombError::MalformedConfigFile { .. }));
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_load_manifest_valid() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), &service_manifest("simple_http"));
        let manifest = load_manifest(tmp.path()).unwrap();
        assert_eq!(manifest["service"]["name"], "simple_http");
    }

    #[test]
    fn test_get_config_parameters() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), &service_manifest("simple_http"));
        let params = get_config_parameters(tmp.path()).unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0]["value"], "port");

        let bare = TempDir::new().unwrap();
        write_manifest(bare.path(), &json!({}));
        assert!(get_config_parameters(bare.path()).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_missing_plugin_dir() {
        let tmp = TempDir::new().unwrap();
        let err = resolve_plugin_dir(PluginKind::Service, &tmp.path().join("ghost")).unwrap_err();
        assert_eq!(err.to_string(), "Cannot find service named ghost, try installing it?");
    }

    // ---- discover_plugins tests ----

    #[test]
    fn test_discover_plugins_skips_invalid() {
        let tmp = TempDir::new().unwrap();
        write_manifest(&tmp.path().join("simple_http"), &service_manifest("simple_http"));
        write_manifest(&tmp.path().join("telnet"), &service_manifest("telnet"));
        write_manifest(&tmp.path().join("broken"), &json!({"service": {}}));
        fs::create_dir(tmp.path().join("no-manifest")).unwrap();
        fs::write(tmp.path().join("stray.txt"), "hello").unwrap();

        let plugins = discover_plugins(PluginKind::Service, tmp.path()).unwrap();
        let names: Vec<&str> = plugins.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["simple_http", "telnet"]);
        assert!(plugins.iter().all(|p| p.kind() == PluginKind::Service));
    }

    #[test]
    fn test_discover_plugins_nonexistent_directory() {
        let plugins =
            discover_plugins(PluginKind::Integration, Path::new("/nonexistent/honeycomb")).unwrap();
        assert!(plugins.is_empty());
    }
}
