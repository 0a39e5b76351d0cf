//! Parameter declarations (`parameters` array of a manifest).
//!
//! Entries are validated as raw JSON first ([`validate_parameters`]) because
//! the set of allowed keys and types depends on the plugin kind. Only then are
//! they converted into typed [`ParameterSpec`]s.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{HoneycombError, Result};

use super::defs::{ParamType, DEFAULT, ITEMS, LABEL, MAX, MIN, PARAMETERS, TYPE, VALUE};

static FIELD_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w-]+$").unwrap());

/// One declared parameter of a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Identifier used as the CLI key (`value=...`).
    pub value: String,

    #[serde(default)]
    pub label: String,

    #[serde(rename = "type")]
    pub param_type: ParamType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,

    /// Lower bound, integer parameters only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,

    /// Upper bound, integer parameters only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,

    /// `[{value, label}, ...]` options of a select parameter. Kept raw so a
    /// malformed list is reported when it is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,

    /// Free-form validator hint passed through to integrations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<Value>,
}

impl ParameterSpec {
    pub fn constraints(&self) -> TypeConstraints<'_> {
        TypeConstraints {
            items: self.items.as_ref(),
            min: self.min,
            max: self.max,
        }
    }

    /// Check a candidate value against this parameter's type and bounds.
    pub fn check(&self, value: &Value) -> Result<()> {
        validate_field_matches_type(&self.value, value, self.param_type, &self.constraints())
    }
}

/// Extra constraints applied by [`validate_field_matches_type`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeConstraints<'a> {
    pub items: Option<&'a Value>,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl<'a> TypeConstraints<'a> {
    /// Read `items`/`min`/`max` from a raw parameter entry.
    pub fn from_entry(entry: &'a Value) -> Result<Self> {
        Ok(Self {
            items: entry.get(ITEMS).filter(|v| !v.is_null()),
            min: bound(entry, MIN)?,
            max: bound(entry, MAX)?,
        })
    }
}

fn bound(entry: &Value, key: &str) -> Result<Option<i64>> {
    match entry.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HoneycombError::parameters_field(display_value(v), key)),
    }
}

/// Identifier syntax for parameter names.
///
/// Word characters and hyphens only, and the first character may not be a
/// digit, hyphen or underscore.
pub fn is_valid_field_name(value: &str) -> bool {
    let Some(first) = value.chars().next() else {
        return false;
    };
    if first.is_numeric() || first == '-' || first == '_' {
        return false;
    }
    FIELD_NAME_RE.is_match(value)
}

/// Check every key of one raw parameter entry.
pub fn validate_field(
    entry: &Value,
    allowed_keys: &[&str],
    allowed_types: &[&str],
) -> Result<()> {
    let Some(fields) = entry.as_object() else {
        return Err(HoneycombError::parameters_field(
            display_value(entry),
            "parameter entry",
        ));
    };

    for (key, value) in fields {
        if !allowed_keys.contains(&key.as_str()) {
            debug!(key = %key, "Parameter uses a disallowed property");
            return Err(HoneycombError::parameters_field(key.as_str(), "property"));
        }
        if key == TYPE && !value.as_str().map(|t| allowed_types.contains(&t)).unwrap_or(false) {
            debug!(value = %value, "Parameter uses a disallowed type");
            return Err(HoneycombError::parameters_field(display_value(value), TYPE));
        }
        if key == VALUE && !value.as_str().map(is_valid_field_name).unwrap_or(false) {
            debug!(value = %value, "Parameter has an invalid identifier");
            return Err(HoneycombError::parameters_field(
                display_value(value),
                "field name",
            ));
        }
    }

    Ok(())
}

/// Validate the `parameters` array of a manifest against the plugin kind's
/// allowed keys and types. An absent array is treated as empty.
pub fn validate_parameters(
    manifest: &Value,
    allowed_keys: &[&str],
    allowed_types: &[&str],
) -> Result<()> {
    for entry in parameter_entries(manifest)? {
        validate_field(entry, allowed_keys, allowed_types)?;

        let name = required_str(entry, VALUE)?;
        let type_name = required_str(entry, TYPE)?;
        let param_type = ParamType::from_name(type_name)
            .ok_or_else(|| HoneycombError::parameters_field(type_name, TYPE))?;

        if let Some(default) = entry.get(DEFAULT).filter(|v| !v.is_null()) {
            let constraints = TypeConstraints::from_entry(entry)?;
            validate_field_matches_type(name, default, param_type, &constraints)?;
        }
    }

    Ok(())
}

/// Convert a validated manifest's `parameters` array into typed specs.
pub fn parse_parameters(manifest: &Value) -> Result<Vec<ParameterSpec>> {
    parameter_entries(manifest)?
        .into_iter()
        .map(|entry| {
            serde_json::from_value(entry.clone()).map_err(|e| {
                debug!(entry = %entry, error = %e, "Parameter entry could not be parsed");
                HoneycombError::parameters_field(display_value(entry), "parameter entry")
            })
        })
        .collect()
}

fn parameter_entries(manifest: &Value) -> Result<Vec<&Value>> {
    match manifest.get(PARAMETERS) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(entries)) => Ok(entries.iter().collect()),
        Some(other) => Err(HoneycombError::validation(
            PARAMETERS,
            other,
            "Config error: 'parameters' is not a valid list",
        )),
    }
}

fn required_str<'a>(entry: &'a Value, key: &str) -> Result<&'a str> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| HoneycombError::ConfigFieldMissing(key.to_string()))
}

/// Check that `value` agrees with a declared parameter type.
///
/// `password` and `file` parameters accept any value.
pub fn validate_field_matches_type(
    field: &str,
    value: &Value,
    field_type: ParamType,
    constraints: &TypeConstraints<'_>,
) -> Result<()> {
    let type_ok = match field_type {
        ParamType::Text | ParamType::String => value.is_string(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Integer => value.is_i64() || value.is_u64(),
        ParamType::Password | ParamType::File | ParamType::Select => true,
    };
    if !type_ok {
        debug!(field, value = %value, expected = %field_type, "Parameter type mismatch");
        return Err(HoneycombError::type_mismatch(field, value, field_type.as_str()));
    }

    match field_type {
        ParamType::Integer => {
            // u64 values beyond i64 are above any declarable max
            let number = value.as_i64().unwrap_or(i64::MAX);
            if let Some(min) = constraints.min {
                if number < min {
                    return Err(HoneycombError::type_mismatch(
                        field,
                        value,
                        format!("must be higher than {}", min),
                    ));
                }
            }
            if let Some(max) = constraints.max {
                if number > max {
                    return Err(HoneycombError::type_mismatch(
                        field,
                        value,
                        format!("must be lower than {}", max),
                    ));
                }
            }
        }
        ParamType::Select => {
            let options = select_items(constraints.items)?;
            if !options.contains(value) {
                let names: Vec<String> = options.iter().map(display_value).collect();
                return Err(HoneycombError::type_mismatch(
                    field,
                    value,
                    format!("one of: {}", names.join(", ")),
                ));
            }
        }
        _ => {}
    }

    Ok(())
}

/// Option values of a select parameter.
///
/// `items` must be a list of `{value, label}` objects.
pub fn select_items(items: Option<&Value>) -> Result<Vec<Value>> {
    let Some(Value::Array(entries)) = items else {
        return Err(HoneycombError::parameters_field(ITEMS, "list"));
    };

    entries
        .iter()
        .map(|item| match (item.get(VALUE), item.get(LABEL)) {
            (Some(value), Some(_)) if item.is_object() => Ok(value.clone()),
            _ => Err(HoneycombError::parameters_field(
                display_value(item),
                format!("a dictionary with {} and {}", LABEL, VALUE),
            )),
        })
        .collect()
}

/// Strings without quotes, everything else as JSON.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::defs::{
        INTEGRATION_ALLOWED_PARAMETER_KEYS, INTEGRATION_ALLOWED_PARAMETER_TYPES,
        SERVICE_ALLOWED_PARAMETER_KEYS, SERVICE_ALLOWED_PARAMETER_TYPES,
    };
    use serde_json::json;

    fn validate_service(params: Value) -> Result<()> {
        validate_parameters(
            &json!({ "parameters": params }),
            SERVICE_ALLOWED_PARAMETER_KEYS,
            SERVICE_ALLOWED_PARAMETER_TYPES,
        )
    }

    fn validate_integration(params: Value) -> Result<()> {
        validate_parameters(
            &json!({ "parameters": params }),
            INTEGRATION_ALLOWED_PARAMETER_KEYS,
            INTEGRATION_ALLOWED_PARAMETER_TYPES,
        )
    }

    fn protocol_items() -> Value {
        json!([{"value": "udp", "label": "UDP"}, {"value": "tcp", "label": "TCP"}])
    }

    // ---- is_valid_field_name ----

    #[test]
    fn test_field_name_examples() {
        assert!(is_valid_field_name("api_key"));
        assert!(is_valid_field_name("valid-name2"));
        assert!(!is_valid_field_name("-bad"));
        assert!(!is_valid_field_name("1abc"));
        assert!(!is_valid_field_name("has space"));
    }

    #[test]
    fn test_field_name_edge_cases() {
        assert!(!is_valid_field_name(""));
        assert!(!is_valid_field_name("_private"));
        assert!(!is_valid_field_name("dollar$"));
        assert!(!is_valid_field_name("dotted.name"));
        assert!(is_valid_field_name("port"));
    }

    // ---- validate_parameters ----

    #[test]
    fn test_absent_parameters_is_empty() {
        assert!(validate_parameters(
            &json!({}),
            SERVICE_ALLOWED_PARAMETER_KEYS,
            SERVICE_ALLOWED_PARAMETER_TYPES
        )
        .is_ok());
    }

    #[test]
    fn test_valid_service_parameters() {
        let params = json!([
            {"value": "port", "label": "Port", "type": "integer", "default": 8888, "required": true},
            {"value": "banner", "label": "Banner", "type": "text", "help_text": "Server banner"},
            {"value": "debug", "label": "Debug", "type": "boolean", "default": false}
        ]);
        assert!(validate_service(params).is_ok());
    }

    #[test]
    fn test_disallowed_key_rejected() {
        let params = json!([{"value": "port", "type": "integer", "min": 1}]);
        let err = validate_service(params).unwrap_err();
        assert_eq!(err.to_string(), "Parameters: 'min' is not a valid property");
    }

    #[test]
    fn test_disallowed_type_rejected() {
        let params = json!([{"value": "proto", "type": "select"}]);
        let err = validate_service(params).unwrap_err();
        assert_eq!(err.to_string(), "Parameters: 'select' is not a valid type");
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let params = json!([{"value": "1port", "type": "integer"}]);
        let err = validate_service(params).unwrap_err();
        assert_eq!(err.to_string(), "Parameters: '1port' is not a valid field name");
    }

    #[test]
    fn test_default_type_mismatch() {
        let params = json!([{"value": "port", "type": "integer", "default": "8888"}]);
        let err = validate_service(params).unwrap_err();
        assert!(matches!(
            err,
            HoneycombError::ConfigFieldTypeMismatch { ref field, .. } if field == "port"
        ));
    }

    #[test]
    fn test_boolean_default_must_be_boolean() {
        let params = json!([{"value": "debug", "type": "boolean", "default": "true"}]);
        assert!(validate_service(params).is_err());
    }

    #[test]
    fn test_missing_type_reported() {
        let params = json!([{"value": "port"}]);
        let err = validate_service(params).unwrap_err();
        assert!(matches!(err, HoneycombError::ConfigFieldMissing(ref f) if f == "type"));
    }

    #[test]
    fn test_non_object_entry_rejected() {
        let err = validate_service(json!(["port"])).unwrap_err();
        assert!(matches!(err, HoneycombError::ParametersField { .. }));
    }

    #[test]
    fn test_integration_select_default_checked_against_items() {
        let ok = json!([{"value": "protocol", "type": "select", "default": "udp", "items": protocol_items()}]);
        assert!(validate_integration(ok).is_ok());

        let bad = json!([{"value": "protocol", "type": "select", "default": "icmp", "items": protocol_items()}]);
        assert!(validate_integration(bad).is_err());
    }

    #[test]
    fn test_integration_integer_default_bounds() {
        let ok = json!([{"value": "port", "type": "integer", "default": 514, "min": 1, "max": 65535}]);
        assert!(validate_integration(ok).is_ok());

        let bad = json!([{"value": "port", "type": "integer", "default": 70000, "min": 1, "max": 65535}]);
        let err = validate_integration(bad).unwrap_err();
        assert!(err.to_string().contains("must be lower than 65535"));
    }

    #[test]
    fn test_first_bad_entry_wins() {
        let params = json!([
            {"value": "ok", "type": "text"},
            {"value": "bad name", "type": "text"},
            {"value": "port", "type": "float"}
        ]);
        let err = validate_service(params).unwrap_err();
        assert!(err.to_string().contains("'bad name'"));
    }

    // ---- validate_field_matches_type ----

    #[test]
    fn test_select_value_in_items() {
        let items = protocol_items();
        let constraints = TypeConstraints {
            items: Some(&items),
            ..Default::default()
        };
        assert!(
            validate_field_matches_type("protocol", &json!("udp"), ParamType::Select, &constraints)
                .is_ok()
        );
        let err =
            validate_field_matches_type("protocol", &json!("icmp"), ParamType::Select, &constraints)
                .unwrap_err();
        assert!(matches!(err, HoneycombError::ConfigFieldTypeMismatch { .. }));
        assert!(err.to_string().contains("one of: udp, tcp"));
    }

    #[test]
    fn test_select_without_items_list() {
        let constraints = TypeConstraints::default();
        let err = validate_field_matches_type("protocol", &json!("udp"), ParamType::Select, &constraints)
            .unwrap_err();
        assert_eq!(err.to_string(), "Parameters: 'items' is not a valid list");
    }

    #[test]
    fn test_select_items_must_be_dicts() {
        let items = json!(["udp", "tcp"]);
        let err = select_items(Some(&items)).unwrap_err();
        assert!(err
            .to_string()
            .contains("is not a valid a dictionary with label and value"));
    }

    #[test]
    fn test_zero_bound_is_enforced() {
        let constraints = TypeConstraints {
            min: Some(0),
            ..Default::default()
        };
        assert!(
            validate_field_matches_type("retries", &json!(-1), ParamType::Integer, &constraints)
                .is_err()
        );
        assert!(
            validate_field_matches_type("retries", &json!(0), ParamType::Integer, &constraints)
                .is_ok()
        );
    }

    #[test]
    fn test_text_requires_string() {
        let none = TypeConstraints::default();
        assert!(validate_field_matches_type("banner", &json!(42), ParamType::Text, &none).is_err());
        assert!(validate_field_matches_type("banner", &json!("hi"), ParamType::String, &none).is_ok());
    }

    #[test]
    fn test_file_and_password_accept_anything() {
        let none = TypeConstraints::default();
        assert!(validate_field_matches_type("cert", &json!(12), ParamType::File, &none).is_ok());
        assert!(validate_field_matches_type("secret", &json!(true), ParamType::Password, &none).is_ok());
    }

    // ---- parse_parameters ----

    #[test]
    fn test_parse_parameters_typed() {
        let manifest = json!({"parameters": [
            {"value": "port", "label": "Port", "type": "integer", "default": 8888, "required": true, "min": 1},
            {"value": "protocol", "label": "Protocol", "type": "select", "items": protocol_items()}
        ]});
        let specs = parse_parameters(&manifest).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].param_type, ParamType::Integer);
        assert_eq!(specs[0].default, Some(json!(8888)));
        assert!(specs[0].required);
        assert_eq!(specs[0].min, Some(1));
        assert!(!specs[1].required);
        assert!(specs[1].check(&json!("tcp")).is_ok());
    }

    #[test]
    fn test_non_integer_bound_rejected() {
        let params = json!([{"value": "port", "type": "integer", "default": 1, "min": "low"}]);
        let err = validate_integration(params).unwrap_err();
        assert_eq!(err.to_string(), "Parameters: 'low' is not a valid min");
    }
}
