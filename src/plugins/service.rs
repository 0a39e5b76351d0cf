//! Service descriptors and service registration.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{HoneycombError, Result};

use super::defs::{
    AlertPolicy, OsFamily, PluginKind, Protocol, ALLOW_MANY, CONFLICTS_WITH, EVENT_TYPES_SECTION,
    FIELDS, LABEL, NAME, POLICY, PORT, PORTS, PROTOCOL, SERVICE_ALLOWED_PARAMETER_KEYS,
    SERVICE_ALLOWED_PARAMETER_TYPES, SERVICE_SECTION, SUPPORTED_OS_FAMILIES, WILDCARD_PORT,
};
use super::loader::{load_manifest, resolve_plugin_dir};
use super::params::{parse_parameters, validate_parameters, ParameterSpec};
use super::schema::{
    validate_config, ALERT_CONFIG_TABLE, SERVICE_ALERT_TABLE, SERVICE_CONFIG_TABLE,
};

/// Port number of a declared listener; `*` lets the service pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortNumber {
    Number(u16),
    Wildcard,
}

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Wildcard => f.write_str(WILDCARD_PORT),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port {
    pub port: PortNumber,
    pub protocol: Protocol,
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.protocol, self.port)
    }
}

/// One event type a service can emit. Compared and hashed by `name`.
#[derive(Debug, Clone)]
pub struct AlertType {
    pub name: String,
    pub label: String,
    /// Name of the owning service.
    pub service: String,
    pub policy: AlertPolicy,
    pub fields: Vec<String>,
}

impl PartialEq for AlertType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for AlertType {}

impl Hash for AlertType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Validated descriptor of a honeypot service.
#[derive(Debug, Clone)]
pub struct ServiceType {
    pub name: String,
    pub label: String,
    pub ports: Vec<Port>,
    pub allow_many: bool,
    pub supported_os_families: OsFamily,
    pub conflicts_with: Vec<String>,
    pub alert_types: Vec<AlertType>,
    pub parameters: Vec<ParameterSpec>,
    /// Absolute plugin directory the descriptor was registered from.
    pub path: PathBuf,
}

impl ServiceType {
    pub fn alert_type(&self, name: &str) -> Option<&AlertType> {
        self.alert_types.iter().find(|a| a.name == name)
    }

    /// Concrete TCP ports (wildcards excluded).
    pub fn tcp_ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.ports.iter().filter_map(|p| match (p.protocol, p.port) {
            (Protocol::Tcp, PortNumber::Number(n)) => Some(n),
            _ => None,
        })
    }
}

/// Register the service in `dir` against the running host's platform.
///
/// Every step is a hard gate: the first failure is returned and nothing is
/// built.
pub fn register_service(dir: &Path) -> Result<ServiceType> {
    register_service_for_host(dir, &OsFamily::host_name())
}

/// Register the service in `dir` as if running on `host`
/// (`Linux`, `Darwin`, `Windows`).
pub fn register_service_for_host(dir: &Path, host: &str) -> Result<ServiceType> {
    debug!(dir = %dir.display(), "Registering service");
    let dir = resolve_plugin_dir(PluginKind::Service, dir)?;
    let manifest = load_manifest(&dir)?;

    validate_config(&manifest, &SERVICE_ALERT_TABLE)?;
    let section = &manifest[SERVICE_SECTION];
    validate_config(section, &SERVICE_CONFIG_TABLE)?;
    let family = validate_supported_platform(section, host)?;
    validate_alert_configs(&manifest)?;
    validate_parameters(
        &manifest,
        SERVICE_ALLOWED_PARAMETER_KEYS,
        SERVICE_ALLOWED_PARAMETER_TYPES,
    )?;

    let service = build_service(&manifest, family, dir)?;
    info!(
        service = %service.name,
        alert_types = service.alert_types.len(),
        parameters = service.parameters.len(),
        "Registered service"
    );
    Ok(service)
}

fn validate_supported_platform(section: &Value, host: &str) -> Result<OsFamily> {
    let declared = section[SUPPORTED_OS_FAMILIES].as_str().unwrap_or_default();
    match OsFamily::from_name(declared) {
        Some(family) if family.supports_host(host) => Ok(family),
        _ => {
            debug!(declared, host, "Service platform not supported");
            Err(HoneycombError::UnsupportedOs {
                required: declared.to_string(),
                actual: host.to_string(),
            })
        }
    }
}

fn validate_alert_configs(manifest: &Value) -> Result<()> {
    let mut seen = HashSet::new();
    for entry in manifest[EVENT_TYPES_SECTION].as_array().into_iter().flatten() {
        validate_config(entry, &ALERT_CONFIG_TABLE)?;
        let name = &entry[NAME];
        if !seen.insert(name.as_str().unwrap_or_default()) {
            debug!(alert_type = %name, "Duplicate alert type name");
            return Err(HoneycombError::validation(
                NAME,
                name,
                "alert type name already used",
            ));
        }
    }
    Ok(())
}

fn build_service(manifest: &Value, family: OsFamily, path: PathBuf) -> Result<ServiceType> {
    let section = &manifest[SERVICE_SECTION];
    let name = str_field(section, NAME);

    let ports = section[PORTS]
        .as_array()
        .into_iter()
        .flatten()
        .map(|entry| parse_port(entry, &section[PORTS]))
        .collect::<Result<Vec<_>>>()?;

    let alert_types = manifest[EVENT_TYPES_SECTION]
        .as_array()
        .into_iter()
        .flatten()
        .map(|entry| AlertType {
            name: str_field(entry, NAME),
            label: str_field(entry, LABEL),
            service: name.clone(),
            policy: entry[POLICY]
                .as_str()
                .and_then(AlertPolicy::from_name)
                .unwrap_or(AlertPolicy::Alert),
            fields: string_list(&entry[FIELDS]),
        })
        .collect();

    Ok(ServiceType {
        label: str_field(section, LABEL),
        ports,
        allow_many: section[ALLOW_MANY].as_bool().unwrap_or(false),
        supported_os_families: family,
        conflicts_with: string_list(&section[CONFLICTS_WITH]),
        alert_types,
        parameters: parse_parameters(manifest)?,
        path,
        name,
    })
}

fn parse_port(entry: &Value, ports: &Value) -> Result<Port> {
    let protocol = entry[PROTOCOL].as_str().and_then(Protocol::from_name);
    let port = match &entry[PORT] {
        Value::String(s) if s == WILDCARD_PORT => Some(PortNumber::Wildcard),
        other => other
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .map(PortNumber::Number),
    };
    match (port, protocol) {
        (Some(port), Some(protocol)) => Ok(Port { port, protocol }),
        _ => Err(HoneycombError::validation(
            PORTS,
            ports,
            format!("port {} is out of range", entry[PORT]),
        )),
    }
}

fn str_field(section: &Value, key: &str) -> String {
    section[key].as_str().unwrap_or_default().to_string()
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}
