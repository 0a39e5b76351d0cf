//! Plugin manifests, validation and registration
//!
//! A plugin is a directory holding a `config.json` manifest plus the
//! executables the runtime starts. Services are honeypots that emit alerts;
//! integrations receive those alerts. Every manifest is untrusted input and
//! goes through the same fail-fast pipeline before anything typed is built
//! from it.
//!
//! # Architecture
//!
//! - **defs**: manifest keys, closed vocabularies (OS families, policies, alert fields)
//! - **schema**: `FieldRule` / `SchemaRule` tables and `validate_config`
//! - **params**: `ParameterSpec`, `validate_parameters` and the shared type-match rule
//! - **args**: `key=value` coercion (`parse_plugin_args`) and the `.args.json` snapshot
//! - **loader**: manifest loading and discovery of installed plugins
//! - **service** / **integration**: registrars producing validated descriptors
//! - **registry**: installed plugins by name, alert type lookup, conflicts
//! - **install**: install from a local directory, uninstall
//!
//! # Plugin Directory Structure
//!
//! ```text
//! ~/.honeycomb/
//! ├── services/
//! │   └── simple_http/
//! │       ├── config.json
//! │       ├── simple_http_service
//! │       └── .args.json
//! └── integrations/
//!     └── syslog/
//!         ├── config.json
//!         ├── integration
//!         └── .args.json
//! ```
//!
//! # Example config.json (service)
//!
//! ```json
//! {
//!   "service": {
//!     "name": "simple_http",
//!     "label": "Simple HTTP",
//!     "allow_many": false,
//!     "supported_os_families": "All",
//!     "ports": [{"port": 8888, "protocol": "TCP"}]
//!   },
//!   "event_types": [
//!     {
//!       "name": "simple_http",
//!       "label": "HTTP request",
//!       "policy": "Alert",
//!       "fields": ["originating_ip", "originating_port", "request"]
//!     }
//!   ],
//!   "parameters": [
//!     {"value": "port", "label": "Port", "type": "integer", "default": 8888, "required": true}
//!   ]
//! }
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use honeycomb::plugins::{parse_plugin_args, register_service};
//!
//! let service = register_service(Path::new("/home/user/.honeycomb/services/simple_http")).unwrap();
//! let args = parse_plugin_args(&["port=8080"], &service.parameters).unwrap();
//! println!("{} will listen on {}", service.name, args["port"]);
//! ```

pub mod args;
pub mod defs;
pub mod install;
pub mod integration;
mod loader;
pub mod params;
pub mod registry;
pub mod schema;
pub mod service;

pub use args::{
    format_plugin_args, get_truetype, parse_plugin_args, read_args_snapshot, write_args_snapshot,
    PluginArgs,
};
pub use defs::{AlertPolicy, IntegrationType, OsFamily, ParamType, PluginKind, Protocol};
pub use install::{install_plugin, uninstall_plugin};
pub use integration::{register_integration, Integration};
pub use loader::{
    discover_plugins, get_config_parameters, load_manifest, resolve_plugin_dir, Plugin,
};
pub use params::{is_valid_field_name, validate_field_matches_type, validate_parameters, ParameterSpec};
pub use registry::PluginRegistry;
pub use schema::{validate_config, FieldRule, SchemaRule, SchemaTable};
pub use service::{register_service, register_service_for_host, AlertType, Port, PortNumber, ServiceType};
