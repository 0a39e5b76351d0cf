//! Plugin runtime for Honeycomb
//!
//! Registration hands the runtime a resolved plugin directory and a validated
//! descriptor; a [`PluginLoader`] turns those into live objects implementing
//! the service or integration capability:
//! - [`HoneypotService`]: start / stop, emitting [`Alert`]s on a channel
//! - [`OutputIntegration`]: send_event / poll_for_updates / test_connection
//!
//! [`ProcessLoader`] is the implementation shipped with the crate: plugins
//! are executables speaking JSON over stdio.

pub mod process;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::alerts::Alert;
use crate::error::{HoneycombError, Result};
use crate::plugins::{Integration, PluginArgs, ServiceType};

pub use process::{ProcessIntegration, ProcessLoader, ProcessService};

/// A running honeypot.
#[async_trait]
pub trait HoneypotService: Send {
    fn name(&self) -> &str;

    /// Start the service. Alerts are sent on `alerts` until the service
    /// exits; the sender is dropped then, closing the channel.
    async fn start(&mut self, alerts: mpsc::Sender<Alert>) -> Result<()>;

    async fn stop(&mut self) -> Result<()>;
}

/// An integration receiving alerts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutputIntegration: Send + Sync {
    /// Deliver one alert event. The returned value is kept as the alert's
    /// output data and passed to [`poll_for_updates`](Self::poll_for_updates).
    async fn send_event(&self, event: &Map<String, Value>) -> Result<Value>;

    async fn poll_for_updates(&self, _output_data: &Value) -> Result<Value> {
        Err(HoneycombError::IntegrationNoMethodImplementation(
            "poll_for_updates".into(),
        ))
    }

    /// Check connectivity with the given arguments; returns success and a
    /// human-readable response.
    async fn test_connection(&self, _args: &PluginArgs) -> Result<(bool, String)> {
        Err(HoneycombError::IntegrationNoMethodImplementation(
            "test_connection".into(),
        ))
    }
}

/// Builds live plugins from validated descriptors.
pub trait PluginLoader: Send + Sync {
    fn load_service(
        &self,
        dir: &Path,
        service: &ServiceType,
        args: PluginArgs,
    ) -> Result<Box<dyn HoneypotService>>;

    fn load_integration(
        &self,
        dir: &Path,
        integration: &Integration,
        args: PluginArgs,
    ) -> Result<Arc<dyn OutputIntegration>>;
}
