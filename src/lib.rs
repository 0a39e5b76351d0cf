//! Honeycomb - honeypot framework: plugin manifests, argument coercion and
//! alert delivery for pluggable honeypot services and output integrations.

pub mod alerts;
pub mod config;
pub mod error;
pub mod plugins;
pub mod runtime;
pub mod utils;

pub use config::Config;
pub use error::{HoneycombError, Result};
