//! Error types for Honeycomb
//!
//! Every validation failure in the manifest pipeline surfaces as one of the
//! variants below and propagates unchanged to the CLI boundary. Uses
//! `thiserror` for `Display` and `Error` implementations; the messages are the
//! user-facing text printed by the CLI.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// The primary error type for Honeycomb operations.
#[derive(Error, Debug)]
pub enum HoneycombError {
    /// The plugin directory has no `config.json`.
    #[error("Missing file {}", .0.display())]
    ConfigFileNotFound(PathBuf),

    /// `config.json` exists but is not valid JSON.
    #[error("config.json is not a valid json file ({}): {source}", path.display())]
    MalformedConfigFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A required manifest field is absent (or `null`).
    #[error("field {0} is missing from config file")]
    ConfigFieldMissing(String),

    /// A manifest field is present but fails its rule.
    #[error("Failed to import config. error in field {field} with value {value}: {message}")]
    ConfigFieldValidation {
        field: String,
        value: Value,
        message: String,
    },

    /// A parameter default or a CLI value disagrees with its declared type or bound.
    #[error("Parameters: Bad value for {field}={value} (must be {expected})")]
    ConfigFieldTypeMismatch {
        field: String,
        value: Value,
        expected: String,
    },

    /// A parameter entry uses a disallowed key, type or identifier.
    #[error("Parameters: '{value}' is not a valid {kind}")]
    ParametersField { value: String, kind: String },

    /// A required parameter has neither a CLI value nor a default.
    #[error("Parameters: '{0}' is missing (use --show-args to see all parameters)")]
    RequiredFieldMissing(String),

    /// The manifest declares a platform the host cannot run.
    #[error("Service requires running on {required} and you are using {actual}")]
    UnsupportedOs { required: String, actual: String },

    /// No plugin at the resolved path.
    #[error("Cannot find {kind} named {name}, try installing it?")]
    PluginNotFound { kind: String, name: String },

    /// Install target already exists.
    #[error("{0} is already installed")]
    PluginAlreadyInstalled(String),

    /// A CLI argument is not in `key=value` form.
    #[error("Invalid parameter '{0}', must be in key=value format")]
    InvalidArgument(String),

    /// No `.args.json` snapshot for a plugin that needs one.
    #[error("Cannot load {0} args, please configure it first")]
    ArgsNotFound(String),

    /// Sending an alert to an integration failed (retryable by the hub).
    #[error("Error sending integration event: {0}")]
    IntegrationSendEvent(String),

    /// Polling an integration for updates failed (try again later).
    #[error("Error polling integration: {0}")]
    IntegrationPollEvent(String),

    /// An integration answered with output the hub could not interpret.
    #[error("Integration output format error: {0}")]
    IntegrationOutputFormat(String),

    /// The alert lacks fields the integration needs.
    #[error("Integration missing required field: {0}")]
    IntegrationMissingRequiredField(String),

    /// The integration does not implement the requested action.
    #[error("Integration does not implement {0}")]
    IntegrationNoMethodImplementation(String),

    /// `integration test` reported a failure.
    #[error("Integration test failed, details: {0}")]
    IntegrationTestFailed(String),

    /// A service or integration process could not be driven.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors outside manifest loading
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HoneycombError {
    /// Errors about plugin packages (missing, installed, unsupported, parameters).
    pub fn is_plugin_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigFileNotFound(_)
                | Self::RequiredFieldMissing(_)
                | Self::PluginAlreadyInstalled(_)
                | Self::PluginNotFound { .. }
                | Self::UnsupportedOs { .. }
                | Self::IntegrationSendEvent(_)
                | Self::IntegrationPollEvent(_)
                | Self::IntegrationOutputFormat(_)
                | Self::IntegrationMissingRequiredField(_)
                | Self::IntegrationNoMethodImplementation(_)
                | Self::IntegrationTestFailed(_)
        )
    }

    /// Errors raised while validating a manifest's contents.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedConfigFile { .. }
                | Self::ConfigFieldMissing(_)
                | Self::ConfigFieldValidation { .. }
                | Self::ConfigFieldTypeMismatch { .. }
                | Self::ParametersField { .. }
        )
    }

    pub(crate) fn validation(field: &str, value: &Value, message: impl Into<String>) -> Self {
        Self::ConfigFieldValidation {
            field: field.to_string(),
            value: value.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn type_mismatch(field: &str, value: &Value, expected: impl Into<String>) -> Self {
        Self::ConfigFieldTypeMismatch {
            field: field.to_string(),
            value: value.clone(),
            expected: expected.into(),
        }
    }

    pub(crate) fn parameters_field(value: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::ParametersField {
            value: value.into(),
            kind: kind.into(),
        }
    }
}

/// A specialized `Result` type for Honeycomb operations.
pub type Result<T> = std::result::Result<T, HoneycombError>;
