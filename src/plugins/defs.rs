//! Manifest keys, closed vocabularies and the small enums built from them.
//!
//! These are plain lookup tables built once; nothing here is mutated after
//! startup.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Manifest file inside every plugin directory.
pub const CONFIG_FILE_NAME: &str = "config.json";
/// Snapshot of the coerced arguments written after `run`/`configure`.
pub const ARGS_JSON: &str = ".args.json";
/// JSON debug log inside the honeycomb home.
pub const DEBUG_LOG_FILE: &str = "honeycomb.debug.log";

// ---------------------------------------------------------------------------
// Generic keys
// ---------------------------------------------------------------------------

pub const NAME: &str = "name";
pub const LABEL: &str = "label";
pub const DESCRIPTION: &str = "description";
pub const PARAMETERS: &str = "parameters";

pub const VALUE: &str = "value";
pub const TYPE: &str = "type";
pub const DEFAULT: &str = "default";
pub const REQUIRED: &str = "required";
pub const HELP_TEXT: &str = "help_text";
pub const MIN: &str = "min";
pub const MAX: &str = "max";
pub const ITEMS: &str = "items";
pub const VALIDATOR: &str = "validator";

// ---------------------------------------------------------------------------
// Service manifest keys
// ---------------------------------------------------------------------------

pub const SERVICE_SECTION: &str = "service";
pub const EVENT_TYPES_SECTION: &str = "event_types";
pub const EVENT_TYPE: &str = "event_type";

pub const PORT: &str = "port";
pub const PORTS: &str = "ports";
pub const PROTOCOL: &str = "protocol";
pub const WILDCARD_PORT: &str = "*";
pub const ALLOW_MANY: &str = "allow_many";
pub const CONFLICTS_WITH: &str = "conflicts_with";
pub const SUPPORTED_OS_FAMILIES: &str = "supported_os_families";
pub const POLICY: &str = "policy";
pub const FIELDS: &str = "fields";

// ---------------------------------------------------------------------------
// Integration manifest keys
// ---------------------------------------------------------------------------

pub const DISPLAY_NAME: &str = "display_name";
pub const INTEGRATION_TYPE: &str = "integration_type";
pub const REQUIRED_FIELDS: &str = "required_fields";
pub const MAX_SEND_RETRIES: &str = "max_send_retries";
pub const POLLING_ENABLED: &str = "polling_enabled";
pub const POLLING_DURATION: &str = "polling_duration";
pub const SUPPORTED_EVENT_TYPES: &str = "supported_event_types";
pub const TEST_CONNECTION_ENABLED: &str = "test_connection_enabled";

/// Upper bound on delivery attempts regardless of the manifest value.
pub const MAX_SEND_RETRIES_CAP: u32 = 5;
/// Pause between two delivery attempts of the same alert.
pub const SEND_ALERT_DATA_INTERVAL: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Parameter keys and types per plugin kind
// ---------------------------------------------------------------------------

pub const SERVICE_ALLOWED_PARAMETER_KEYS: &[&str] =
    &[VALUE, DEFAULT, TYPE, LABEL, HELP_TEXT, REQUIRED];

pub const SERVICE_ALLOWED_PARAMETER_TYPES: &[&str] = &["text", "integer", "boolean", "file"];

pub const INTEGRATION_ALLOWED_PARAMETER_KEYS: &[&str] = &[
    VALUE, LABEL, DEFAULT, TYPE, HELP_TEXT, REQUIRED, MIN, MAX, VALIDATOR, ITEMS,
];

pub const INTEGRATION_ALLOWED_PARAMETER_TYPES: &[&str] = &["string", "integer", "boolean", "select"];

/// Kind of plugin package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Service,
    Integration,
}

impl PluginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Integration => "integration",
        }
    }

    /// Directory under the honeycomb home holding installed plugins of this kind.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Service => "services",
            Self::Integration => "integrations",
        }
    }

    pub fn allowed_parameter_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Service => SERVICE_ALLOWED_PARAMETER_KEYS,
            Self::Integration => INTEGRATION_ALLOWED_PARAMETER_KEYS,
        }
    }

    pub fn allowed_parameter_types(&self) -> &'static [&'static str] {
        match self {
            Self::Service => SERVICE_ALLOWED_PARAMETER_TYPES,
            Self::Integration => INTEGRATION_ALLOWED_PARAMETER_TYPES,
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Text,
    String,
    Boolean,
    Integer,
    Password,
    File,
    Select,
}

impl ParamType {
    pub const ALL: [ParamType; 7] = [
        Self::Text,
        Self::String,
        Self::Boolean,
        Self::Integer,
        Self::Password,
        Self::File,
        Self::Select,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Password => "password",
            Self::File => "file",
            Self::Select => "select",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating system families a service may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OsFamily {
    Linux,
    Darwin,
    Windows,
    All,
}

impl OsFamily {
    pub const ALL_FAMILIES: [OsFamily; 4] = [Self::Linux, Self::Darwin, Self::Windows, Self::All];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "Linux",
            Self::Darwin => "Darwin",
            Self::Windows => "Windows",
            Self::All => "All",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL_FAMILIES.into_iter().find(|f| f.as_str() == name)
    }

    pub fn all_names() -> Vec<&'static str> {
        Self::ALL_FAMILIES.iter().map(|f| f.as_str()).collect()
    }

    /// Platform name of the running host, in manifest spelling
    /// (`Linux`, `Darwin`, `Windows`); other targets keep their Rust name.
    pub fn host_name() -> String {
        match std::env::consts::OS {
            "linux" => "Linux".to_string(),
            "macos" => "Darwin".to_string(),
            "windows" => "Windows".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether a service declaring `self` may run on `host`.
    ///
    /// `Linux` services are accepted on macOS as well.
    pub fn supports_host(&self, host: &str) -> bool {
        match self {
            Self::All => true,
            Self::Linux => host == Self::Linux.as_str() || host == Self::Darwin.as_str(),
            Self::Windows => host == Self::Windows.as_str(),
            Self::Darwin => host == Self::Darwin.as_str(),
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport protocol of a declared port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub const NAMES: &'static [&'static str] = &["TCP", "UDP"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "TCP" => Some(Self::Tcp),
            "UDP" => Some(Self::Udp),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to alerts of an event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertPolicy {
    /// Logged, never sent to integrations.
    Ignore,
    /// Sent only to integrations that accept muted alerts.
    Mute,
    /// Sent to every subscribed integration.
    Alert,
}

impl AlertPolicy {
    pub const NAMES: &'static [&'static str] = &["Ignore", "Mute", "Alert"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "Ignore",
            Self::Mute => "Mute",
            Self::Alert => "Alert",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Ignore" => Some(Self::Ignore),
            "Mute" => Some(Self::Mute),
            "Alert" => Some(Self::Alert),
            _ => None,
        }
    }
}

/// Integration categories. Only event output exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationType {
    EventOutput,
}

impl IntegrationType {
    pub const NAMES: &'static [&'static str] = &["event_output"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventOutput => "event_output",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "event_output" => Some(Self::EventOutput),
            _ => None,
        }
    }
}

/// Field names an event type may list under `fields`.
pub const ALERT_FIELDS: &[&str] = &[
    // alert metadata
    "id",
    "timestamp",
    "end_timestamp",
    "status",
    "severity",
    "is_resolved",
    "event_type",
    "event_description",
    "manufacturer",
    "num_aggregated_events",
    "attack_story",
    "additional_fields",
    // network
    "request",
    "dest_ip",
    "dest_port",
    "originating_ip",
    "originating_port",
    "originating_hostname",
    "originating_mac_address",
    "transport_protocol",
    "domain",
    "address",
    "target_endpoint",
    "poisoned_hostname",
    "netstat",
    "net_capture",
    "session_video",
    // credentials
    "username",
    "password",
    "password_from_breadcrumb",
    "breadcrumb_name",
    // process
    "cmd",
    "pid",
    "ppid",
    "uid",
    "process_list",
    // forensics
    "file_accessed",
    "file_list",
    "image_file",
    "image_path",
    "image_md5",
    "image_sha256",
    "mem_dump",
    // decoy
    "decoy",
    "service",
    "endpoint",
    "decoy_os",
    "decoy_ipv4",
    "decoy_name",
    "decoy_hostname",
];

static ALERT_FIELD_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ALERT_FIELDS.iter().copied().collect());

/// Whether `name` belongs to the alert field vocabulary.
pub fn is_alert_field(name: &str) -> bool {
    ALERT_FIELD_SET.contains(name)
}

/// Whether `name` can be used as a single directory under a plugins root.
///
/// Rejects empty names, `.`/`..`, path separators and NUL.
pub fn is_plugin_dir_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| c == '/' || c == '\\' || c == '\0')
}
