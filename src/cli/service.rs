//! `honeycomb service ...` handlers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use honeycomb::alerts::{Alert, ConfiguredIntegration, IntegrationHub};
use honeycomb::plugins::{
    discover_plugins, format_plugin_args, parse_plugin_args, read_args_snapshot,
    register_integration, register_service, write_args_snapshot, Plugin, PluginKind,
    PluginRegistry, ServiceType,
};
use honeycomb::runtime::{PluginLoader, ProcessLoader};
use honeycomb::utils::{read_status, PidFileGuard, ServiceStatus};
use honeycomb::Config;

use super::{install_all, print_info, print_ok, read_requirements, uninstall_all};

/// Alerts buffered between the service reader and delivery.
const ALERT_QUEUE_SIZE: usize = 256;
/// How often queued alerts are polled for updates.
const POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Connect timeout of `service test`.
const PORT_TEST_TIMEOUT: Duration = Duration::from_secs(3);

pub(crate) fn cmd_service_install(config: &Config, sources: &[String]) -> Result<()> {
    install_all(config, PluginKind::Service, sources)
}

pub(crate) fn cmd_service_uninstall(config: &Config, names: &[String], yes: bool) -> Result<()> {
    uninstall_all(config, PluginKind::Service, names, yes)
}

pub(crate) fn cmd_service_list(config: &Config) -> Result<()> {
    print_info("Installed services:");
    let plugins = discover_plugins(PluginKind::Service, &config.services_dir())?;
    let mut found = false;
    for plugin in &plugins {
        if let Plugin::Service(service) = plugin {
            println!("{}", service_summary(service));
            found = true;
        }
    }
    if !found {
        print_info(
            "You do not have any services installed, try installing one with `honeycomb service install`",
        );
    }
    Ok(())
}

fn ports_summary(service: &ServiceType) -> String {
    if service.ports.is_empty() {
        return "Undefined".to_string();
    }
    service
        .ports
        .iter()
        .map(|p| format!("{}/{}", p.port, p.protocol))
        .collect::<Vec<_>>()
        .join(", ")
}

fn alerts_summary(service: &ServiceType) -> String {
    service
        .alert_types
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `name (Ports: 8888/TCP) [Alerts: a, b]` line of `service list`.
fn service_summary(service: &ServiceType) -> String {
    format!(
        "{} (Ports: {}) [Alerts: {}]",
        service.name,
        ports_summary(service),
        alerts_summary(service)
    )
}

pub(crate) fn cmd_service_show(config: &Config, name: &str) -> Result<()> {
    let path = config.plugin_path(PluginKind::Service, name, false);
    let service = register_service(&path)?;

    println!("Name: {}", service.name);
    println!("Installed: true");
    println!("Summary: {}", service.label);
    println!("Location: {}", service.path.display());
    println!("Requires: {}", read_requirements(&service.path));
    println!("Ports: {}", ports_summary(&service));
    println!("Alerts: {}", alerts_summary(&service));
    if !service.conflicts_with.is_empty() {
        println!("Conflicts with: {}", service.conflicts_with.join(", "));
    }
    Ok(())
}

/// Register, configure and run a service in the foreground until Ctrl+C or
/// until the service exits.
pub(crate) async fn cmd_service_run(
    config: &Config,
    name: &str,
    args: &[String],
    editable: bool,
    show_args: bool,
    integrations: &[String],
) -> Result<()> {
    let service_path = config.plugin_path(PluginKind::Service, name, editable);
    debug!(service = name, path = %service_path.display(), "Loading service");
    let service = register_service(&service_path)?;

    if show_args {
        println!("{}", format_plugin_args(&service.parameters)?);
        return Ok(());
    }

    check_conflicts(config, &service)?;

    let service_args = parse_plugin_args(args, &service.parameters)?;
    let _pid_guard = PidFileGuard::acquire_at(Config::pid_path(&service_path))?;

    let loader = ProcessLoader::new();
    let mut hub = IntegrationHub::new();
    for integration_name in integrations {
        let path = config.plugin_path(PluginKind::Integration, integration_name, editable);
        let integration = register_integration(&path)?;
        let integration_args = read_args_snapshot(&path)?;
        let handle = loader.load_integration(&path, &integration, integration_args.clone())?;
        hub.configure(ConfiguredIntegration::new(integration, integration_args, handle));
    }

    let hub = Arc::new(hub);

    write_args_snapshot(&service_path, &service_args)?;
    let mut running = loader.load_service(&service_path, &service, service_args)?;

    print_ok(format!("Launching {}", service.name));
    let (tx, mut rx) = mpsc::channel(ALERT_QUEUE_SIZE);
    running
        .start(tx)
        .await
        .with_context(|| format!("Failed to start {}", service.name))?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut poll_ticker = tokio::time::interval(POLL_INTERVAL);
    let mut deliveries = JoinSet::new();
    let mut interrupted = false;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(service = %service.name, "Interrupted, shutting down");
                interrupted = true;
                break;
            }
            alert = rx.recv() => match alert {
                Some(alert) => spawn_delivery(&mut deliveries, &hub, alert),
                None => {
                    info!(service = %service.name, "Service exited");
                    break;
                }
            },
            Some(finished) = deliveries.join_next(), if !deliveries.is_empty() => {
                log_join(finished);
            }
            _ = poll_ticker.tick() => {
                let hub = Arc::clone(&hub);
                deliveries.spawn(async move {
                    for delivery in hub.poll_pending().await {
                        info!(alert = %delivery, id = %delivery.alert.id, "Polling finished");
                    }
                });
            }
        }
    }

    // Alerts already raised are still delivered when the service exits on
    // its own; Ctrl+C during this drain aborts what is left.
    if !interrupted {
        while !deliveries.is_empty() {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(finished) = deliveries.join_next() => log_join(finished),
            }
        }
    }
    deliveries.shutdown().await;

    running.stop().await?;
    print_info(format!("{} has stopped", service.name));
    Ok(())
}

/// Log the alert and deliver it in the background.
fn spawn_delivery(deliveries: &mut JoinSet<()>, hub: &Arc<IntegrationHub>, alert: Alert) {
    let hub = Arc::clone(hub);
    deliveries.spawn(async move { handle_alert(&hub, &alert).await });
}

fn log_join(finished: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        warn!(error = %e, "Alert delivery task failed");
    }
}

async fn handle_alert(hub: &IntegrationHub, alert: &Alert) {
    info!(
        event_type = %alert.event_type,
        id = %alert.id,
        status = %alert.status.as_str(),
        fields = %serde_json::Value::Object(alert.fields.clone()),
        "Alert raised"
    );
    for delivery in hub.dispatch(alert).await {
        if delivery.status.is_error() {
            warn!(alert = %delivery, "Alert delivery failed");
        } else {
            debug!(alert = %delivery, "Alert delivered");
        }
    }
}

/// Refuse to start next to a running service that either side declares a
/// conflict with.
fn check_conflicts(config: &Config, service: &ServiceType) -> Result<()> {
    let registry = PluginRegistry::from_dirs(&config.services_dir(), &config.integrations_dir())?;
    for other in registry.conflicts_of(service) {
        let pid_path = Config::pid_path(&config.services_dir().join(&other.name));
        if let ServiceStatus::Running(pid) = read_status(&pid_path) {
            bail!(
                "{} conflicts with running service {} (pid: {})",
                service.name,
                other.name,
                pid
            );
        }
    }
    Ok(())
}

pub(crate) fn cmd_service_status(config: &Config, names: &[String], show_all: bool) -> Result<()> {
    let services_dir = config.services_dir();
    let names: Vec<String> = if show_all {
        let mut installed = Vec::new();
        for entry in std::fs::read_dir(&services_dir)
            .with_context(|| format!("Failed to read {}", services_dir.display()))?
        {
            let entry = entry?;
            if entry.path().is_dir() {
                installed.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        installed.sort();
        installed
    } else if !names.is_empty() {
        names.to_vec()
    } else {
        bail!("You must specify a service name or use --show-all");
    };

    for name in &names {
        println!("{}", status_line(&services_dir, name));
    }
    Ok(())
}

/// `name - status` line of `service status`.
fn status_line(services_dir: &Path, name: &str) -> String {
    let service_dir = services_dir.join(name);
    let status = if service_dir.is_dir() {
        read_status(&Config::pid_path(&service_dir)).to_string()
    } else {
        "no such service".to_string()
    };
    format!("{} - {}", name, status)
}

/// Check that a running service accepts connections on its TCP ports.
pub(crate) async fn cmd_service_test(
    config: &Config,
    names: &[String],
    force: bool,
    editable: bool,
) -> Result<()> {
    for name in names {
        let service_path = config.plugin_path(PluginKind::Service, name, editable);
        let service = register_service(&service_path)?;

        if !force {
            match read_status(&Config::pid_path(&service_path)) {
                ServiceStatus::Running(pid) => debug!(service = %service.name, pid, "Service is running"),
                status => {
                    debug!(service = %service.name, %status, "Service is not running");
                    bail!("Unable to test {} because it is not running", service.name);
                }
            }
        }

        let ports: Vec<u16> = service.tcp_ports().collect();
        if ports.is_empty() {
            print_info(format!("{} declares no TCP ports to test", service.name));
            continue;
        }

        print_ok("Testing that service ports are open");
        for port in ports {
            test_port(port)
                .await
                .with_context(|| format!("Unable to connect to service port {}", port))?;
            print_ok(format!("{} port {} is open", service.name, port));
        }
    }
    Ok(())
}

async fn test_port(port: u16) -> Result<()> {
    tokio::time::timeout(PORT_TEST_TIMEOUT, TcpStream::connect(("127.0.0.1", port)))
        .await
        .with_context(|| "Connection timed out")??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use honeycomb::plugins::{
        AlertPolicy, AlertType, Integration, IntegrationType, OsFamily, Port, PortNumber,
        Protocol,
    };
    use honeycomb::runtime::OutputIntegration;
    use serde_json::Map;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn service(ports: Vec<Port>) -> ServiceType {
        ServiceType {
            name: "simple_http".into(),
            label: "Simple HTTP".into(),
            ports,
            allow_many: false,
            supported_os_families: OsFamily::All,
            conflicts_with: vec![],
            alert_types: vec![AlertType {
                name: "simple_http".into(),
                label: "HTTP request".into(),
                service: "simple_http".into(),
                policy: AlertPolicy::Alert,
                fields: vec![],
            }],
            parameters: vec![],
            path: PathBuf::from("/tmp/simple_http"),
        }
    }

    #[test]
    fn test_service_summary() {
        let s = service(vec![
            Port {
                port: PortNumber::Number(8888),
                protocol: Protocol::Tcp,
            },
            Port {
                port: PortNumber::Wildcard,
                protocol: Protocol::Udp,
            },
        ]);
        assert_eq!(
            service_summary(&s),
            "simple_http (Ports: 8888/TCP, */UDP) [Alerts: simple_http]"
        );
        assert_eq!(
            service_summary(&service(vec![])),
            "simple_http (Ports: Undefined) [Alerts: simple_http]"
        );
    }

    #[test]
    fn test_status_line() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(status_line(tmp.path(), "ghost"), "ghost - no such service");

        std::fs::create_dir(tmp.path().join("simple_http")).unwrap();
        assert_eq!(status_line(tmp.path(), "simple_http"), "simple_http - not running");

        std::fs::write(tmp.path().join("simple_http.pid"), std::process::id().to_string()).unwrap();
        assert_eq!(
            status_line(tmp.path(), "simple_http"),
            format!("simple_http - running (pid: {})", std::process::id())
        );
    }

    struct Stalled;

    #[async_trait::async_trait]
    impl OutputIntegration for Stalled {
        async fn send_event(&self, _event: &Map<String, Value>) -> honeycomb::Result<Value> {
            std::future::pending().await
        }
    }

    fn stalled_hub() -> Arc<IntegrationHub> {
        let integration = Integration {
            name: "stalled".into(),
            display_name: "Stalled".into(),
            label: "Never answers".into(),
            description: "Never answers".into(),
            integration_type: IntegrationType::EventOutput,
            supported_event_types: vec![],
            required_fields: vec![],
            max_send_retries: 5,
            polling_enabled: false,
            polling_duration: None,
            test_connection_enabled: false,
            parameters: vec![],
            path: PathBuf::from("/tmp/stalled"),
        };
        let mut hub = IntegrationHub::new();
        hub.configure(ConfiguredIntegration::new(
            integration,
            Map::new(),
            Arc::new(Stalled),
        ));
        Arc::new(hub)
    }

    #[tokio::test]
    async fn test_delivery_does_not_block_the_run_loop() {
        let hub = stalled_hub();
        let service = service(vec![]);
        let alert_type = &service.alert_types[0];
        let mut deliveries = JoinSet::new();

        let spawned = tokio::time::timeout(Duration::from_secs(1), async {
            spawn_delivery(&mut deliveries, &hub, Alert::new(alert_type, Map::new()));
        })
        .await;
        assert!(spawned.is_ok());
        assert_eq!(deliveries.len(), 1);

        deliveries.shutdown().await;
        assert!(deliveries.is_empty());
    }

    #[tokio::test]
    async fn test_port_open_and_closed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(test_port(port).await.is_ok());
        drop(listener);
        assert!(test_port(port).await.is_err());
    }
}
