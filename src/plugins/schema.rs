//! Declarative schema tables for plugin manifests.
//!
//! A [`SchemaTable`] is an ordered list of [`SchemaRule`]s, one per manifest
//! field. [`validate_config`] walks a table in order and stops at the first
//! field that is missing or fails its rule, so the table order decides which
//! error a broken manifest reports.

use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::error::{HoneycombError, Result};

use super::integration::integration_name;

use super::defs::{
    self, AlertPolicy, IntegrationType, OsFamily, Protocol, ALLOW_MANY, CONFLICTS_WITH,
    DESCRIPTION, DISPLAY_NAME, EVENT_TYPES_SECTION, FIELDS, INTEGRATION_TYPE, LABEL,
    MAX_SEND_RETRIES, NAME, PARAMETERS, POLICY, POLLING_ENABLED, PORT, PORTS, PROTOCOL,
    REQUIRED_FIELDS, SERVICE_SECTION, SUPPORTED_EVENT_TYPES, SUPPORTED_OS_FAMILIES,
    TEST_CONNECTION_ENABLED, WILDCARD_PORT,
};

/// JSON shape accepted by [`FieldRule::TypeCheck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    Boolean,
    Integer,
    String,
    List,
    Object,
}

impl JsonType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Boolean => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::String => value.is_string(),
            Self::List => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "bool",
            Self::Integer => "int",
            Self::String => "str",
            Self::List => "list",
            Self::Object => "dict",
        }
    }
}

/// How a single field is checked.
#[derive(Clone, Copy)]
pub enum FieldRule {
    /// Value must have this JSON shape.
    TypeCheck(JsonType),
    /// Value must be one of these strings.
    OneOf(&'static [&'static str]),
    /// Arbitrary predicate with its fixed error message.
    Predicate(fn(&Value) -> bool, &'static str),
}

impl fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeCheck(kind) => f.debug_tuple("TypeCheck").field(kind).finish(),
            Self::OneOf(choices) => f.debug_tuple("OneOf").field(choices).finish(),
            Self::Predicate(_, message) => f.debug_tuple("Predicate").field(message).finish(),
        }
    }
}

/// A field name bound to its rule.
#[derive(Debug, Clone, Copy)]
pub struct SchemaRule {
    pub field: &'static str,
    pub rule: FieldRule,
    /// Absent optional fields are skipped instead of reported missing.
    pub required: bool,
}

impl SchemaRule {
    pub const fn required(field: &'static str, rule: FieldRule) -> Self {
        Self {
            field,
            rule,
            required: true,
        }
    }

    pub const fn optional(field: &'static str, rule: FieldRule) -> Self {
        Self {
            field,
            rule,
            required: false,
        }
    }

    /// Apply the rule to a present value.
    pub fn validator(&self, value: &Value) -> bool {
        match self.rule {
            FieldRule::TypeCheck(kind) => kind.matches(value),
            FieldRule::OneOf(choices) => value
                .as_str()
                .map(|s| choices.contains(&s))
                .unwrap_or(false),
            FieldRule::Predicate(check, _) => check(value),
        }
    }

    /// Error text for this field. Depends only on the rule, never on the value.
    pub fn error(&self) -> String {
        match self.rule {
            FieldRule::TypeCheck(kind) => {
                format!("Config error: '{}' is not a valid {}", self.field, kind.as_str())
            }
            FieldRule::OneOf(choices) => {
                format!("{} must be one of: {}", self.field, choices.join(", "))
            }
            FieldRule::Predicate(_, message) => message.to_string(),
        }
    }
}

/// Ordered rules for one manifest section.
#[derive(Debug)]
pub struct SchemaTable {
    pub name: &'static str,
    pub rules: &'static [SchemaRule],
}

impl SchemaTable {
    pub fn fields(&self) -> impl Iterator<Item = &'static str> {
        self.rules.iter().map(|r| r.field)
    }
}

/// Validate one manifest section against a table, failing on the first bad field.
///
/// A field that is absent or `null` counts as missing. Non-object input has
/// no fields at all, so its first required field is reported missing.
pub fn validate_config(section: &Value, table: &SchemaTable) -> Result<()> {
    for rule in table.rules {
        let value = match section.get(rule.field) {
            Some(Value::Null) | None => {
                if rule.required {
                    debug!(table = table.name, field = rule.field, "Config field missing");
                    return Err(HoneycombError::ConfigFieldMissing(rule.field.to_string()));
                }
                continue;
            }
            Some(value) => value,
        };

        if !rule.validator(value) {
            debug!(
                table = table.name,
                field = rule.field,
                value = %value,
                "Config field failed validation"
            );
            return Err(HoneycombError::validation(rule.field, value, rule.error()));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

fn is_non_empty_string(value: &Value) -> bool {
    value.as_str().map(|s| !s.is_empty()).unwrap_or(false)
}

/// Service names become the install directory name.
fn is_plugin_name(value: &Value) -> bool {
    value.as_str().map(defs::is_plugin_dir_name).unwrap_or(false)
}

/// The derived integration name becomes the install directory name.
fn is_integration_display_name(value: &Value) -> bool {
    value
        .as_str()
        .map(|s| defs::is_plugin_dir_name(&integration_name(s)))
        .unwrap_or(false)
}

fn is_string_list(value: &Value) -> bool {
    value
        .as_array()
        .map(|items| items.iter().all(Value::is_string))
        .unwrap_or(false)
}

fn is_valid_port_list(value: &Value) -> bool {
    let Some(ports) = value.as_array() else {
        return false;
    };
    ports.iter().all(|entry| {
        let protocol_ok = entry
            .get(PROTOCOL)
            .and_then(Value::as_str)
            .map(|p| Protocol::from_name(p).is_some())
            .unwrap_or(false);
        let port_ok = match entry.get(PORT) {
            Some(port) => JsonType::Integer.matches(port) || port.as_str() == Some(WILDCARD_PORT),
            None => false,
        };
        protocol_ok && port_ok
    })
}

fn is_alert_field_list(value: &Value) -> bool {
    value
        .as_array()
        .map(|fields| {
            fields
                .iter()
                .all(|f| f.as_str().map(defs::is_alert_field).unwrap_or(false))
        })
        .unwrap_or(false)
}

fn is_os_family(value: &Value) -> bool {
    value.as_str().and_then(OsFamily::from_name).is_some()
}

fn is_non_negative_integer(value: &Value) -> bool {
    value.is_u64()
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Top level of a service manifest: both sections must exist.
pub static SERVICE_ALERT_TABLE: SchemaTable = SchemaTable {
    name: "service_manifest",
    rules: &[
        SchemaRule::required(SERVICE_SECTION, FieldRule::TypeCheck(JsonType::Object)),
        SchemaRule::required(EVENT_TYPES_SECTION, FieldRule::TypeCheck(JsonType::List)),
    ],
};

/// The `service` section.
pub static SERVICE_CONFIG_TABLE: SchemaTable = SchemaTable {
    name: "service",
    rules: &[
        SchemaRule::required(ALLOW_MANY, FieldRule::TypeCheck(JsonType::Boolean)),
        SchemaRule::required(
            SUPPORTED_OS_FAMILIES,
            FieldRule::Predicate(
                is_os_family,
                "Operating system family must be one of the following: Linux,Darwin,Windows,All",
            ),
        ),
        SchemaRule::required(
            PORTS,
            FieldRule::Predicate(
                is_valid_port_list,
                "Ports configuration invalid, please consult docs.",
            ),
        ),
        SchemaRule::required(
            NAME,
            FieldRule::Predicate(
                is_plugin_name,
                "Config error: 'name' is not a valid plugin name",
            ),
        ),
        SchemaRule::required(
            LABEL,
            FieldRule::Predicate(
                is_non_empty_string,
                "Config error: 'label' is not a valid non-empty str",
            ),
        ),
        SchemaRule::optional(
            CONFLICTS_WITH,
            FieldRule::Predicate(
                is_string_list,
                "Config error: 'conflicts_with' is not a valid list of strings",
            ),
        ),
    ],
};

/// One entry of the `event_types` list.
pub static ALERT_CONFIG_TABLE: SchemaTable = SchemaTable {
    name: "event_type",
    rules: &[
        SchemaRule::required(
            NAME,
            FieldRule::Predicate(
                is_non_empty_string,
                "Config error: alert 'name' is not a valid non-empty str",
            ),
        ),
        SchemaRule::required(
            LABEL,
            FieldRule::Predicate(
                is_non_empty_string,
                "Config error: alert 'label' is not a valid non-empty str",
            ),
        ),
        SchemaRule::required(POLICY, FieldRule::OneOf(AlertPolicy::NAMES)),
        SchemaRule::required(
            FIELDS,
            FieldRule::Predicate(
                is_alert_field_list,
                "Alert fields must be a list of known alert field names",
            ),
        ),
    ],
};

/// Top level of an integration manifest.
pub static INTEGRATION_CONFIG_TABLE: SchemaTable = SchemaTable {
    name: "integration_manifest",
    rules: &[
        SchemaRule::required(
            DISPLAY_NAME,
            FieldRule::Predicate(
                is_integration_display_name,
                "Config error: 'display_name' is not a valid plugin name",
            ),
        ),
        SchemaRule::required(INTEGRATION_TYPE, FieldRule::OneOf(IntegrationType::NAMES)),
        SchemaRule::required(
            SUPPORTED_EVENT_TYPES,
            FieldRule::Predicate(
                is_string_list,
                "Config error: 'supported_event_types' is not a valid list of strings",
            ),
        ),
        SchemaRule::required(
            REQUIRED_FIELDS,
            FieldRule::Predicate(
                is_string_list,
                "Config error: 'required_fields' is not a valid list of strings",
            ),
        ),
        SchemaRule::required(
            MAX_SEND_RETRIES,
            FieldRule::Predicate(
                is_non_negative_integer,
                "Config error: 'max_send_retries' is not a valid non-negative int",
            ),
        ),
        SchemaRule::required(POLLING_ENABLED, FieldRule::TypeCheck(JsonType::Boolean)),
        SchemaRule::required(PARAMETERS, FieldRule::TypeCheck(JsonType::List)),
        SchemaRule::required(
            TEST_CONNECTION_ENABLED,
            FieldRule::TypeCheck(JsonType::Boolean),
        ),
        SchemaRule::optional(DESCRIPTION, FieldRule::TypeCheck(JsonType::String)),
    ],
};
