//! Command-line `key=value` arguments for plugins.
//!
//! Raw values are coerced with a loose heuristic ([`get_truetype`]) before the
//! declared parameter type is consulted; the type check in
//! [`parse_plugin_args`] is what actually accepts or rejects a value.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{HoneycombError, Result};

use super::defs::{ParamType, ARGS_JSON};
use super::params::{display_value, select_items, ParameterSpec};

/// Validated arguments handed to a plugin, keyed by parameter identifier.
pub type PluginArgs = Map<String, Value>;

const TRUE_WORDS: &[&str] = &["true", "True", "y", "Y", "yes"];
const FALSE_WORDS: &[&str] = &["false", "False", "n", "N", "no"];

/// Coerce a raw CLI string: boolean words become booleans, all-digit strings
/// become integers, anything else stays a string.
pub fn get_truetype(raw: &str) -> Value {
    if TRUE_WORDS.contains(&raw) {
        return Value::Bool(true);
    }
    if FALSE_WORDS.contains(&raw) {
        return Value::Bool(false);
    }
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(number) = raw.parse::<u64>() {
            return Value::from(number);
        }
    }
    Value::String(raw.to_string())
}

/// Split `key=value` on the first `=`.
fn split_arg(arg: &str) -> Result<(&str, &str)> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(HoneycombError::InvalidArgument(arg.to_string())),
    }
}

/// Turn CLI `key=value` tokens into the validated argument map of a plugin.
///
/// Supplied values are checked against their declared type, defaults fill in
/// the rest, and a required parameter with neither fails the whole call.
/// Optional parameters without a default are left out of the map.
pub fn parse_plugin_args<S: AsRef<str>>(
    command_args: &[S],
    params: &[ParameterSpec],
) -> Result<PluginArgs> {
    let mut parsed = PluginArgs::new();
    for arg in command_args {
        let (key, raw) = split_arg(arg.as_ref())?;
        parsed.insert(key.to_string(), get_truetype(raw));
    }

    for spec in params {
        if let Some(value) = parsed.get(&spec.value) {
            spec.check(value)?;
        } else if let Some(default) = &spec.default {
            parsed.insert(spec.value.clone(), default.clone());
        } else if spec.required {
            debug!(parameter = %spec.value, "Required parameter not supplied");
            return Err(HoneycombError::RequiredFieldMissing(spec.value.clone()));
        }
    }

    for key in parsed.keys() {
        if !params.iter().any(|p| &p.value == key) {
            debug!(parameter = %key, "Passing through undeclared parameter");
        }
    }

    Ok(parsed)
}

/// Persist the validated arguments as `<plugin_dir>/.args.json`.
pub fn write_args_snapshot(plugin_dir: &Path, args: &PluginArgs) -> Result<PathBuf> {
    let path = plugin_dir.join(ARGS_JSON);
    let data = serde_json::to_string(args)?;
    debug!(path = %path.display(), args = %data, "Writing args snapshot");
    fs::write(&path, data)?;
    Ok(path)
}

/// Load `<plugin_dir>/.args.json` written by a previous `run`/`configure`.
pub fn read_args_snapshot(plugin_dir: &Path) -> Result<PluginArgs> {
    let path = plugin_dir.join(ARGS_JSON);
    let content = fs::read_to_string(&path).map_err(|e| {
        debug!(path = %path.display(), error = %e, "Args snapshot unavailable");
        HoneycombError::ArgsNotFound(plugin_name(plugin_dir))
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn plugin_name(plugin_dir: &Path) -> String {
    plugin_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| plugin_dir.display().to_string())
}

/// Render the parameter table shown by `--show-args`.
pub fn format_plugin_args(params: &[ParameterSpec]) -> Result<String> {
    let mut lines = Vec::with_capacity(params.len() + 2);
    let title = format!(
        "{:20} {:10} {:^15} {:^10} {:25}",
        "NAME", "TYPE", "DEFAULT", "REQUIRED", "DESCRIPTION"
    );
    let rule = "-".repeat(title.len());
    lines.push(title);
    lines.push(rule);

    for spec in params {
        let options = if spec.param_type == ParamType::Select {
            let values: Vec<String> = select_items(spec.items.as_ref())?
                .iter()
                .map(display_value)
                .collect();
            format!(" (valid options: {})", values.join(", "))
        } else {
            String::new()
        };
        let help = spec
            .help_text
            .as_ref()
            .map(|h| format!(" ({})", h))
            .unwrap_or_default();
        let default = spec
            .default
            .as_ref()
            .map(display_value)
            .unwrap_or_else(|| "None".to_string());

        lines.push(format!(
            "{:20} {:10} {:^15} {:^10} {:25}",
            spec.value,
            spec.param_type.as_str(),
            default,
            spec.required,
            format!("{}{}{}", spec.label, options, help)
        ));
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn spec(value: Value) -> ParameterSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_get_truetype_examples() {
        assert_eq!(get_truetype("True"), json!(true));
        assert_eq!(get_truetype("42"), json!(42));
        assert_eq!(get_truetype("hello"), json!("hello"));
    }

    #[test]
    fn test_get_truetype_words() {
        for word in ["true", "y", "Y", "yes"] {
            assert_eq!(get_truetype(word), json!(true));
        }
        for word in ["false", "False", "n", "N", "no"] {
            assert_eq!(get_truetype(word), json!(false));
        }
        assert_eq!(get_truetype("YES"), json!("YES"));
        assert_eq!(get_truetype("-5"), json!("-5"));
        assert_eq!(get_truetype(""), json!(""));
    }

    #[test]
    fn test_required_without_default_fails() {
        let port = spec(json!({"value": "port", "type": "integer", "required": true}));
        let err = parse_plugin_args::<&str>(&[], &[port]).unwrap_err();
        assert!(matches!(err, HoneycombError::RequiredFieldMissing(ref p) if p == "port"));
    }

    #[test]
    fn test_defaults_injected_and_optional_omitted() {
        let params = vec![
            spec(json!({"value": "port", "type": "integer", "default": 8888, "required": true})),
            spec(json!({"value": "banner", "type": "text"})),
        ];
        let args = parse_plugin_args::<&str>(&[], &params).unwrap();
        assert_eq!(args.get("port"), Some(&json!(8888)));
        assert!(!args.contains_key("banner"));
    }

    #[test]
    fn test_supplied_value_overrides_default() {
        let params =
            vec![spec(json!({"value": "port", "type": "integer", "default": 8888, "required": true}))];
        let args = parse_plugin_args(&["port=9999"], &params).unwrap();
        assert_eq!(args.get("port"), Some(&json!(9999)));
    }

    #[test]
    fn test_supplied_value_type_checked() {
        let params = vec![spec(json!({"value": "port", "type": "integer", "required": true}))];
        let err = parse_plugin_args(&["port=http"], &params).unwrap_err();
        assert!(matches!(err, HoneycombError::ConfigFieldTypeMismatch { .. }));
    }

    #[test]
    fn test_heuristic_applies_before_type_check() {
        // A text parameter cannot take the literal "yes": it is coerced first.
        let params = vec![spec(json!({"value": "answer", "type": "text"}))];
        let err = parse_plugin_args(&["answer=yes"], &params).unwrap_err();
        assert!(matches!(err, HoneycombError::ConfigFieldTypeMismatch { .. }));
    }

    #[test]
    fn test_select_value_checked() {
        let params = vec![spec(json!({
            "value": "protocol",
            "type": "select",
            "items": [{"value": "udp", "label": "UDP"}, {"value": "tcp", "label": "TCP"}]
        }))];
        assert!(parse_plugin_args(&["protocol=udp"], &params).is_ok());
        let err = parse_plugin_args(&["protocol=icmp"], &params).unwrap_err();
        assert!(matches!(err, HoneycombError::ConfigFieldTypeMismatch { .. }));
    }

    #[test]
    fn test_malformed_argument_rejected() {
        let err = parse_plugin_args(&["port"], &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'port', must be in key=value format"
        );
        assert!(parse_plugin_args(&["=8080"], &[]).is_err());
    }

    #[test]
    fn test_split_on_first_equals() {
        let params = vec![spec(json!({"value": "query", "type": "text"}))];
        let args = parse_plugin_args(&["query=a=b"], &params).unwrap();
        assert_eq!(args.get("query"), Some(&json!("a=b")));
    }

    #[test]
    fn test_args_snapshot_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let mut args = PluginArgs::new();
        args.insert("port".into(), json!(8888));
        args.insert("debug".into(), json!(true));

        let path = write_args_snapshot(tmp.path(), &args).unwrap();
        assert!(path.ends_with(".args.json"));
        assert_eq!(read_args_snapshot(tmp.path()).unwrap(), args);
    }

    #[test]
    fn test_missing_args_snapshot() {
        let tmp = TempDir::new().unwrap();
        let err = read_args_snapshot(tmp.path()).unwrap_err();
        assert!(matches!(err, HoneycombError::ArgsNotFound(_)));
    }

    #[test]
    fn test_format_plugin_args_table() {
        let params = vec![
            spec(json!({"value": "port", "label": "Port", "type": "integer", "default": 514, "required": true})),
            spec(json!({
                "value": "protocol",
                "label": "Protocol",
                "type": "select",
                "help_text": "transport",
                "items": [{"value": "udp", "label": "UDP"}, {"value": "tcp", "label": "TCP"}]
            })),
        ];
        let table = format_plugin_args(&params).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[2].contains("514"));
        assert!(lines[2].contains("true"));
        assert!(lines[3].contains("Protocol (valid options: udp, tcp) (transport)"));
        assert!(lines[3].contains("None"));
    }
}
