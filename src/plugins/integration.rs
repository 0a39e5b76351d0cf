//! Integration descriptors and integration registration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{HoneycombError, Result};

use super::defs::{
    IntegrationType, PluginKind, DESCRIPTION, DISPLAY_NAME, INTEGRATION_ALLOWED_PARAMETER_KEYS,
    INTEGRATION_ALLOWED_PARAMETER_TYPES, INTEGRATION_TYPE, MAX_SEND_RETRIES,
    MAX_SEND_RETRIES_CAP, POLLING_DURATION, POLLING_ENABLED, REQUIRED_FIELDS,
    SUPPORTED_EVENT_TYPES, TEST_CONNECTION_ENABLED,
};
use super::loader::{load_manifest, resolve_plugin_dir};
use super::params::{parse_parameters, validate_parameters, ParameterSpec};
use super::schema::{validate_config, INTEGRATION_CONFIG_TABLE};

/// Validated descriptor of an output integration.
#[derive(Debug, Clone)]
pub struct Integration {
    /// `display_name` lowercased with spaces replaced by underscores.
    pub name: String,
    pub display_name: String,
    /// Same as `description`; shown by `list`.
    pub label: String,
    pub description: String,
    pub integration_type: IntegrationType,
    pub supported_event_types: Vec<String>,
    pub required_fields: Vec<String>,
    pub max_send_retries: u32,
    pub polling_enabled: bool,
    /// Only set when `polling_enabled` is true.
    pub polling_duration: Option<Duration>,
    pub test_connection_enabled: bool,
    pub parameters: Vec<ParameterSpec>,
    pub path: PathBuf,
}

impl Integration {
    /// Whether alerts of `event_type` should be delivered here.
    /// An empty `supported_event_types` list accepts everything.
    pub fn supports_event_type(&self, event_type: &str) -> bool {
        self.supported_event_types.is_empty()
            || self.supported_event_types.iter().any(|t| t == event_type)
    }

    /// Send attempts actually made, capped at [`MAX_SEND_RETRIES_CAP`].
    pub fn send_retries(&self) -> u32 {
        self.max_send_retries.min(MAX_SEND_RETRIES_CAP)
    }
}

/// Internal name of an integration: `"Syslog Output"` -> `"syslog_output"`.
pub fn integration_name(display_name: &str) -> String {
    display_name.to_lowercase().replace(' ', "_")
}

/// Register the integration in `dir`.
pub fn register_integration(dir: &Path) -> Result<Integration> {
    debug!(dir = %dir.display(), "Registering integration");
    let dir = resolve_plugin_dir(PluginKind::Integration, dir)?;
    let manifest = load_manifest(&dir)?;

    validate_config(&manifest, &INTEGRATION_CONFIG_TABLE)?;
    let polling_duration = validate_polling(&manifest)?;
    validate_parameters(
        &manifest,
        INTEGRATION_ALLOWED_PARAMETER_KEYS,
        INTEGRATION_ALLOWED_PARAMETER_TYPES,
    )?;

    let integration = build_integration(&manifest, polling_duration, dir)?;
    info!(
        integration = %integration.name,
        polling = integration.polling_enabled,
        "Registered integration"
    );
    Ok(integration)
}

fn validate_polling(manifest: &Value) -> Result<Option<Duration>> {
    if !manifest[POLLING_ENABLED].as_bool().unwrap_or(false) {
        return Ok(None);
    }
    match manifest.get(POLLING_DURATION) {
        None | Some(Value::Null) => {
            debug!(field = POLLING_DURATION, "Config field missing");
            Err(HoneycombError::ConfigFieldMissing(POLLING_DURATION.to_string()))
        }
        Some(value) => value.as_u64().map(|s| Some(Duration::from_secs(s))).ok_or_else(|| {
            HoneycombError::validation(
                POLLING_DURATION,
                value,
                "Config error: 'polling_duration' is not a valid number of seconds",
            )
        }),
    }
}

fn build_integration(
    manifest: &Value,
    polling_duration: Option<Duration>,
    path: PathBuf,
) -> Result<Integration> {
    let display_name = str_field(manifest, DISPLAY_NAME);
    let description = str_field(manifest, DESCRIPTION);
    let max_send_retries = manifest[MAX_SEND_RETRIES]
        .as_u64()
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or_default();

    Ok(Integration {
        name: integration_name(&display_name),
        display_name,
        label: description.clone(),
        description,
        integration_type: manifest[INTEGRATION_TYPE]
            .as_str()
            .and_then(IntegrationType::from_name)
            .unwrap_or(IntegrationType::EventOutput),
        supported_event_types: string_list(&manifest[SUPPORTED_EVENT_TYPES]),
        required_fields: string_list(&manifest[REQUIRED_FIELDS]),
        max_send_retries,
        polling_enabled: polling_duration.is_some(),
        polling_duration,
        test_connection_enabled: manifest[TEST_CONNECTION_ENABLED].as_bool().unwrap_or(false),
        parameters: parse_parameters(manifest)?,
        path,
    })
}

fn str_field(manifest: &Value, key: &str) -> String {
    manifest[key].as_str().unwrap_or_default().to_string()
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}
