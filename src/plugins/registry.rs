//! Registry of installed plugins
//!
//! `PluginRegistry` holds registered services and integrations by name and
//! indexes every alert type back to the service that declares it, so the
//! runtime can resolve an emitted `event_type` without rescanning manifests.

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{HoneycombError, Result};

use super::defs::PluginKind;
use super::integration::Integration;
use super::loader::{discover_plugins, Plugin};
use super::service::{AlertType, ServiceType};

/// Registered services and integrations.
///
/// The registry maintains three mappings:
/// - Service name to service descriptor
/// - Integration name to integration descriptor
/// - Alert type name to the name of the service declaring it
///
/// # Example
///
/// ```rust,no_run
/// use std::path::Path;
/// use honeycomb::plugins::PluginRegistry;
///
/// let registry = PluginRegistry::from_dirs(
///     Path::new("/home/user/.honeycomb/services"),
///     Path::new("/home/user/.honeycomb/integrations"),
/// )
/// .unwrap();
/// println!("{} services installed", registry.service_count());
/// ```
#[derive(Debug, Default)]
pub struct PluginRegistry {
    services: HashMap<String, ServiceType>,
    integrations: HashMap<String, Integration>,
    alert_to_service: HashMap<String, String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover and register everything installed under the two directories.
    /// Invalid or conflicting plugins are logged and skipped.
    pub fn from_dirs(services_dir: &Path, integrations_dir: &Path) -> Result<Self> {
        let mut registry = Self::new();
        for plugin in discover_plugins(PluginKind::Service, services_dir)?
            .into_iter()
            .chain(discover_plugins(PluginKind::Integration, integrations_dir)?)
        {
            let name = plugin.name().to_string();
            if let Err(e) = registry.register(plugin) {
                warn!(plugin = %name, error = %e, "Skipping plugin");
            }
        }
        Ok(registry)
    }

    /// Register a plugin.
    ///
    /// A second plugin of the same kind and name is rejected, as is a service
    /// declaring an alert type another service already owns. On error the
    /// registry is unchanged.
    pub fn register(&mut self, plugin: Plugin) -> Result<()> {
        match plugin {
            Plugin::Service(service) => self.register_service(service),
            Plugin::Integration(integration) => self.register_integration(integration),
        }
    }

    fn register_service(&mut self, service: ServiceType) -> Result<()> {
        if self.services.contains_key(&service.name) {
            return Err(HoneycombError::PluginAlreadyInstalled(service.name));
        }

        for alert_type in &service.alert_types {
            if let Some(owner) = self.alert_to_service.get(&alert_type.name) {
                return Err(HoneycombError::validation(
                    "name",
                    &serde_json::Value::String(alert_type.name.clone()),
                    format!("alert type name already used by service {}", owner),
                ));
            }
        }

        for alert_type in &service.alert_types {
            self.alert_to_service
                .insert(alert_type.name.clone(), service.name.clone());
        }

        info!(
            service = %service.name,
            alert_types = service.alert_types.len(),
            "Registered service"
        );
        self.services.insert(service.name.clone(), service);
        Ok(())
    }

    fn register_integration(&mut self, integration: Integration) -> Result<()> {
        if self.integrations.contains_key(&integration.name) {
            return Err(HoneycombError::PluginAlreadyInstalled(integration.name));
        }
        info!(integration = %integration.name, "Registered integration");
        self.integrations
            .insert(integration.name.clone(), integration);
        Ok(())
    }

    pub fn service(&self, name: &str) -> Option<&ServiceType> {
        self.services.get(name)
    }

    pub fn integration(&self, name: &str) -> Option<&Integration> {
        self.integrations.get(name)
    }

    /// Look up an alert type declared by `service`.
    pub fn alert_type(&self, service: &str, name: &str) -> Option<&AlertType> {
        self.services.get(service)?.alert_type(name)
    }

    /// The service that declares alert type `name`, if any.
    pub fn service_for_alert(&self, name: &str) -> Option<&ServiceType> {
        let service = self.alert_to_service.get(name)?;
        self.services.get(service)
    }

    /// Registered services that cannot run alongside `service`.
    ///
    /// Conflicts are symmetric: either side may declare them.
    pub fn conflicts_of<'a>(&'a self, service: &'a ServiceType) -> Vec<&'a ServiceType> {
        let mut conflicts: Vec<&ServiceType> = self
            .services
            .values()
            .filter(|other| other.name != service.name)
            .filter(|other| {
                service.conflicts_with.contains(&other.name)
                    || other.conflicts_with.contains(&service.name)
            })
            .collect();
        conflicts.sort_by(|a, b| a.name.cmp(&b.name));
        conflicts
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn integration_count(&self) -> usize {
        self.integrations.len()
    }

    /// Services sorted by name.
    pub fn list_services(&self) -> Vec<&ServiceType> {
        let mut services: Vec<_> = self.services.values().collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        services
    }

    /// Integrations sorted by name.
    pub fn list_integrations(&self) -> Vec<&Integration> {
        let mut integrations: Vec<_> = self.integrations.values().collect();
        integrations.sort_by(|a, b| a.name.cmp(&b.name));
        integrations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::defs::{AlertPolicy, IntegrationType, OsFamily};
    use std::path::PathBuf;

    /// Helper to create a service with the given alert type names.
    fn make_service(name: &str, alerts: &[&str], conflicts_with: &[&str]) -> ServiceType {
        ServiceType {
            name: name.to_string(),
            label: format!("Service {}", name),
            ports: vec![],
            allow_many: false,
            supported_os_families: OsFamily::All,
            conflicts_with: conflicts_with.iter().map(|s| s.to_string()).collect(),
            alert_types: alerts
                .iter()
                .map(|a| AlertType {
                    name: a.to_string(),
                    label: format!("Alert {}", a),
                    service: name.to_string(),
                    policy: AlertPolicy::Alert,
                    fields: vec![],
                })
                .collect(),
            parameters: vec![],
            path: PathBuf::from(format!("/tmp/{}", name)),
        }
    }

    fn make_integration(name: &str) -> Integration {
        Integration {
            name: name.to_string(),
            display_name: name.to_string(),
            label: String::new(),
            description: String::new(),
            integration_type: IntegrationType::EventOutput,
            supported_event_types: vec![],
            required_fields: vec![],
            max_send_retries: 3,
            polling_enabled: false,
            polling_duration: None,
            test_connection_enabled: false,
            parameters: vec![],
            path: PathBuf::from(format!("/tmp/{}", name)),
        }
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = PluginRegistry::new();
        assert_eq!(registry.service_count(), 0);
        assert_eq!(registry.integration_count(), 0);
        assert!(registry.list_services().is_empty());
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = PluginRegistry::new();
        registry
            .register(Plugin::Service(make_service("ssh", &["ssh_login"], &[])))
            .unwrap();
        registry
            .register(Plugin::Integration(make_integration("syslog")))
            .unwrap();

        assert_eq!(registry.service("ssh").unwrap().label, "Service ssh");
        assert!(registry.integration("syslog").is_some());
        assert_eq!(
            registry.alert_type("ssh", "ssh_login").unwrap().label,
            "Alert ssh_login"
        );
        assert!(registry.alert_type("ssh", "http_request").is_none());
        assert_eq!(registry.service_for_alert("ssh_login").unwrap().name, "ssh");
    }

    #[test]
    fn test_duplicate_service_rejected() {
        let mut registry = PluginRegistry::new();
        registry
            .register(Plugin::Service(make_service("ssh", &["ssh_login"], &[])))
            .unwrap();
        let err = registry
            .register(Plugin::Service(make_service("ssh", &["ssh_other"], &[])))
            .unwrap_err();
        assert!(matches!(err, HoneycombError::PluginAlreadyInstalled(ref n) if n == "ssh"));
        assert!(registry.service_for_alert("ssh_other").is_none());
    }

    #[test]
    fn test_alert_type_owned_by_one_service() {
        let mut registry = PluginRegistry::new();
        registry
            .register(Plugin::Service(make_service("ssh", &["login"], &[])))
            .unwrap();
        let err = registry
            .register(Plugin::Service(make_service("telnet", &["login"], &[])))
            .unwrap_err();
        assert!(err.to_string().contains("already used by service ssh"));
        assert_eq!(registry.service_count(), 1);
    }

    #[test]
    fn test_conflicts_are_symmetric() {
        let mut registry = PluginRegistry::new();
        for service in [
            make_service("apache", &["apache_req"], &[]),
            make_service("nginx", &["nginx_req"], &["apache"]),
            make_service("ssh", &["ssh_login"], &[]),
        ] {
            registry.register(Plugin::Service(service)).unwrap();
        }

        let apache = registry.service("apache").unwrap();
        let names: Vec<&str> = registry
            .conflicts_of(apache)
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["nginx"]);

        let ssh = registry.service("ssh").unwrap();
        assert!(registry.conflicts_of(ssh).is_empty());
    }

    #[test]
    fn test_list_sorted() {
        let mut registry = PluginRegistry::new();
        registry
            .register(Plugin::Service(make_service("telnet", &["t"], &[])))
            .unwrap();
        registry
            .register(Plugin::Service(make_service("ftp", &["f"], &[])))
            .unwrap();
        let names: Vec<&str> = registry
            .list_services()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["ftp", "telnet"]);
    }
}
