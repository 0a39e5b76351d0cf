//! Subprocess plugins.
//!
//! # Service protocol
//!
//! The service executable `<dir>/<name>_service` is started once with its
//! arguments as JSON in `HONEYCOMB_ARGS`. Every stdout line is one alert:
//!
//! ```json
//! {"event_type": "simple_http", "originating_ip": "10.0.0.7", "request": "GET /"}
//! ```
//!
//! Lines naming an event type the manifest does not declare are logged and
//! dropped. Stderr lines are forwarded to the debug log.
//!
//! # Integration protocol
//!
//! The integration executable `<dir>/integration` is spawned per call with the
//! action as its only argument (`send_event`, `poll_for_updates`,
//! `test_connection`), its arguments in `HONEYCOMB_ARGS`, a JSON request on
//! stdin and a JSON response on stdout. A non-zero exit fails the action;
//! exit code 3 means the action is not implemented.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::alerts::Alert;
use crate::error::{HoneycombError, Result};
use crate::plugins::defs::EVENT_TYPE;
use crate::plugins::{AlertType, Integration, PluginArgs, ServiceType};

use super::{HoneypotService, OutputIntegration, PluginLoader};

/// Environment variable carrying the plugin's arguments as JSON.
pub const ARGS_ENV: &str = "HONEYCOMB_ARGS";
/// Integration executable name inside its plugin directory.
pub const INTEGRATION_EXECUTABLE: &str = "integration";
/// Suffix of the service executable: `<name>_service`.
pub const SERVICE_EXECUTABLE_SUFFIX: &str = "_service";
/// Exit code an integration uses for an action it does not implement.
pub const EXIT_NOT_IMPLEMENTED: i32 = 3;
/// Upper bound for a single integration call.
pub const INTEGRATION_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// [`PluginLoader`] starting plugins as child processes.
#[derive(Debug, Default, Clone)]
pub struct ProcessLoader;

impl ProcessLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn service_executable(dir: &Path) -> PathBuf {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        dir.join(format!("{}{}", name, SERVICE_EXECUTABLE_SUFFIX))
    }

    pub fn integration_executable(dir: &Path) -> PathBuf {
        dir.join(INTEGRATION_EXECUTABLE)
    }
}

impl PluginLoader for ProcessLoader {
    fn load_service(
        &self,
        dir: &Path,
        service: &ServiceType,
        args: PluginArgs,
    ) -> Result<Box<dyn HoneypotService>> {
        let executable = Self::service_executable(dir);
        if !executable.is_file() {
            return Err(HoneycombError::Runtime(format!(
                "Service executable not found: {}",
                executable.display()
            )));
        }
        Ok(Box::new(ProcessService::new(
            service,
            executable,
            dir.to_path_buf(),
            args,
        )))
    }

    fn load_integration(
        &self,
        dir: &Path,
        integration: &Integration,
        args: PluginArgs,
    ) -> Result<Arc<dyn OutputIntegration>> {
        let executable = Self::integration_executable(dir);
        if !executable.is_file() {
            return Err(HoneycombError::Runtime(format!(
                "Integration executable not found: {}",
                executable.display()
            )));
        }
        Ok(Arc::new(ProcessIntegration {
            name: integration.name.clone(),
            executable,
            dir: dir.to_path_buf(),
            args,
        }))
    }
}

// ---- Service ----

/// A service running as a child process.
pub struct ProcessService {
    name: String,
    executable: PathBuf,
    dir: PathBuf,
    args: PluginArgs,
    alert_types: Arc<Vec<AlertType>>,
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
}

impl ProcessService {
    pub fn new(service: &ServiceType, executable: PathBuf, dir: PathBuf, args: PluginArgs) -> Self {
        Self {
            name: service.name.clone(),
            executable,
            dir,
            args,
            alert_types: Arc::new(service.alert_types.clone()),
            child: None,
            reader: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }
}

impl std::fmt::Debug for ProcessService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessService")
            .field("name", &self.name)
            .field("executable", &self.executable)
            .field("running", &self.is_running())
            .finish()
    }
}

#[async_trait]
impl HoneypotService for ProcessService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&mut self, alerts: mpsc::Sender<Alert>) -> Result<()> {
        if self.child.is_some() {
            info!(service = %self.name, "Service already running");
            return Ok(());
        }

        let mut child = Command::new(&self.executable)
            .env(ARGS_ENV, serde_json::to_string(&self.args)?)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                HoneycombError::Runtime(format!(
                    "Failed to spawn service '{}' ({}): {}",
                    self.name,
                    self.executable.display(),
                    e
                ))
            })?;

        if let Some(stderr) = child.stderr.take() {
            let name = self.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(service = %name, "{}", line);
                }
            });
        }

        let stdout = child.stdout.take().ok_or_else(|| {
            HoneycombError::Runtime(format!("Service '{}' stdout not available", self.name))
        })?;
        let name = self.name.clone();
        let alert_types = Arc::clone(&self.alert_types);
        self.reader = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                match parse_alert_line(&line, &alert_types) {
                    Ok(alert) => {
                        debug!(service = %name, event_type = %alert.event_type, "Alert emitted");
                        if alerts.send(alert).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(service = %name, error = %e, "Dropping service output"),
                }
            }
            debug!(service = %name, "Service output closed");
        }));

        info!(service = %self.name, pid = ?child.id(), "Service started");
        self.child = Some(child);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            info!(service = %self.name, "Service already stopped");
            return Ok(());
        };

        info!(service = %self.name, "Stopping service");
        if let Err(e) = child.kill().await {
            warn!(service = %self.name, error = %e, "Failed to kill service");
        }
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                warn!(service = %self.name, error = %e, "Alert reader failed");
            }
        }
        Ok(())
    }
}

/// Turn one stdout line of a service into an [`Alert`].
///
/// The line must be a JSON object whose `event_type` is one of the service's
/// declared alert types; the remaining keys become the alert fields.
pub fn parse_alert_line(line: &str, alert_types: &[AlertType]) -> Result<Alert> {
    let mut fields: Map<String, Value> = match serde_json::from_str(line)? {
        Value::Object(fields) => fields,
        other => {
            return Err(HoneycombError::Runtime(format!(
                "Expected a JSON object, got {}",
                other
            )))
        }
    };

    let event_type = match fields.remove(EVENT_TYPE) {
        Some(Value::String(event_type)) => event_type,
        _ => {
            return Err(HoneycombError::Runtime(
                "Alert line has no event_type".to_string(),
            ))
        }
    };

    let alert_type = alert_types
        .iter()
        .find(|a| a.name == event_type)
        .ok_or_else(|| HoneycombError::Runtime(format!("Undeclared event type '{}'", event_type)))?;

    Ok(Alert::new(alert_type, fields))
}

// ---- Integration ----

/// An integration executable invoked once per action.
#[derive(Debug, Clone)]
pub struct ProcessIntegration {
    name: String,
    executable: PathBuf,
    dir: PathBuf,
    args: PluginArgs,
}

/// Which error an integration action maps failures to.
#[derive(Debug, Clone, Copy)]
enum Action {
    SendEvent,
    PollForUpdates,
    TestConnection,
}

impl Action {
    fn as_str(&self) -> &'static str {
        match self {
            Self::SendEvent => "send_event",
            Self::PollForUpdates => "poll_for_updates",
            Self::TestConnection => "test_connection",
        }
    }

    fn failure(&self, message: String) -> HoneycombError {
        match self {
            Self::SendEvent => HoneycombError::IntegrationSendEvent(message),
            Self::PollForUpdates => HoneycombError::IntegrationPollEvent(message),
            Self::TestConnection => HoneycombError::IntegrationTestFailed(message),
        }
    }
}

impl ProcessIntegration {
    async fn invoke(&self, action: Action, request: &Value) -> Result<Value> {
        let mut child = Command::new(&self.executable)
            .arg(action.as_str())
            .env(ARGS_ENV, serde_json::to_string(&self.args)?)
            .current_dir(&self.dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                action.failure(format!(
                    "failed to spawn {}: {}",
                    self.executable.display(),
                    e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let mut payload = serde_json::to_vec(request)?;
            payload.push(b'\n');
            if let Err(e) = stdin.write_all(&payload).await {
                // The integration may exit without reading its input.
                debug!(integration = %self.name, error = %e, "Integration closed stdin early");
            }
        }

        let output = tokio::time::timeout(INTEGRATION_CALL_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                action.failure(format!(
                    "timed out after {}s",
                    INTEGRATION_CALL_TIMEOUT.as_secs()
                ))
            })??;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(0) => {}
            Some(EXIT_NOT_IMPLEMENTED) => {
                return Err(HoneycombError::IntegrationNoMethodImplementation(
                    action.as_str().to_string(),
                ))
            }
            code => {
                debug!(integration = %self.name, action = action.as_str(), ?code, %stderr, "Integration action failed");
                return Err(action.failure(if stderr.is_empty() {
                    format!("exit status {:?}", code)
                } else {
                    stderr
                }));
            }
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(stdout.trim()).map_err(|e| {
            HoneycombError::IntegrationOutputFormat(format!(
                "{} returned invalid JSON: {}",
                action.as_str(),
                e
            ))
        })
    }
}

#[async_trait]
impl OutputIntegration for ProcessIntegration {
    async fn send_event(&self, event: &Map<String, Value>) -> Result<Value> {
        self.invoke(Action::SendEvent, &Value::Object(event.clone()))
            .await
    }

    async fn poll_for_updates(&self, output_data: &Value) -> Result<Value> {
        self.invoke(Action::PollForUpdates, output_data).await
    }

    /// Expects `{"success": bool, "response": str}` on stdout.
    async fn test_connection(&self, args: &PluginArgs) -> Result<(bool, String)> {
        let response = self
            .invoke(Action::TestConnection, &Value::Object(args.clone()))
            .await?;
        let success = response.get("success").and_then(Value::as_bool);
        match success {
            Some(success) => {
                let message = match response.get("response") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                Ok((success, message))
            }
            None => Err(HoneycombError::IntegrationOutputFormat(format!(
                "test_connection returned {}",
                response
            ))),
        }
    }
}
