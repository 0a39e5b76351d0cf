//! `honeycomb integration ...` handlers.

use anyhow::{bail, Result};
use tracing::debug;

use honeycomb::plugins::{
    discover_plugins, format_plugin_args, parse_plugin_args, read_args_snapshot,
    register_integration, write_args_snapshot, Integration, Plugin, PluginKind,
};
use honeycomb::runtime::{PluginLoader, ProcessLoader};
use honeycomb::{Config, HoneycombError};

use super::{install_all, print_info, print_ok, read_requirements, uninstall_all};

pub(crate) fn cmd_integration_install(config: &Config, sources: &[String]) -> Result<()> {
    install_all(config, PluginKind::Integration, sources)
}

pub(crate) fn cmd_integration_uninstall(
    config: &Config,
    names: &[String],
    yes: bool,
) -> Result<()> {
    uninstall_all(config, PluginKind::Integration, names, yes)
}

pub(crate) fn cmd_integration_list(config: &Config) -> Result<()> {
    print_info("Installed integrations:");
    let plugins = discover_plugins(PluginKind::Integration, &config.integrations_dir())?;
    let mut found = false;
    for plugin in &plugins {
        if let Plugin::Integration(integration) = plugin {
            println!("{}", integration_summary(integration));
            found = true;
        }
    }
    if !found {
        print_info(
            "You do not have any integrations installed, try installing one with `honeycomb integration install`",
        );
    }
    Ok(())
}

/// `name: description [Event types: ...]` line of `integration list`.
fn integration_summary(integration: &Integration) -> String {
    let event_types = if integration.supported_event_types.is_empty() {
        "all".to_string()
    } else {
        integration.supported_event_types.join(", ")
    };
    format!(
        "{}: {} [Event types: {}]",
        integration.name, integration.label, event_types
    )
}

pub(crate) fn cmd_integration_show(config: &Config, name: &str) -> Result<()> {
    let path = config.plugin_path(PluginKind::Integration, name, false);
    let integration = register_integration(&path)?;

    println!("Name: {}", integration.display_name);
    println!("Installed: true");
    println!("Summary: {}", integration.description);
    println!("Location: {}", integration.path.display());
    println!("Requires: {}", read_requirements(&integration.path));
    println!("Type: {}", integration.integration_type.as_str());
    if !integration.required_fields.is_empty() {
        println!("Required fields: {}", integration.required_fields.join(", "));
    }
    match integration.polling_duration {
        Some(duration) => println!("Polling: enabled ({}s)", duration.as_secs()),
        None => println!("Polling: disabled"),
    }
    println!(
        "Configured: {}",
        read_args_snapshot(&integration.path).is_ok()
    );
    Ok(())
}

/// Validate arguments and store them as the integration's defaults.
pub(crate) fn cmd_integration_configure(
    config: &Config,
    name: &str,
    args: &[String],
    editable: bool,
    show_args: bool,
) -> Result<()> {
    let path = config.plugin_path(PluginKind::Integration, name, editable);
    debug!(integration = name, path = %path.display(), "Loading integration");
    let integration = register_integration(&path)?;

    if show_args {
        println!("{}", format_plugin_args(&integration.parameters)?);
        return Ok(());
    }

    let integration_args = parse_plugin_args(args, &integration.parameters)?;
    write_args_snapshot(&path, &integration_args)?;
    print_info(format!(
        "{0} has been configured, make sure to test it with `honeycomb integration test {0}`",
        integration.name
    ));
    Ok(())
}

/// Run the integration's connection test with its configured arguments.
pub(crate) async fn cmd_integration_test(
    config: &Config,
    names: &[String],
    editable: bool,
) -> Result<()> {
    let loader = ProcessLoader::new();
    for name in names {
        let path = config.plugin_path(PluginKind::Integration, name, editable);
        let integration = register_integration(&path)?;

        if !integration.test_connection_enabled {
            bail!(
                "Sorry, {} integration does not support testing.",
                integration.name
            );
        }

        let integration_args = read_args_snapshot(&path)?;
        print_info(format!(
            "Testing {} with args {}",
            integration.name,
            serde_json::Value::Object(integration_args.clone())
        ));
        let handle = loader.load_integration(&path, &integration, integration_args.clone())?;

        let (success, response) = handle.test_connection(&integration_args).await?;
        if !success {
            return Err(HoneycombError::IntegrationTestFailed(response).into());
        }
        print_ok(format!("Integration test: OK, Extra details: {}", response));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use honeycomb::plugins::IntegrationType;
    use std::path::PathBuf;

    fn integration(event_types: &[&str]) -> Integration {
        Integration {
            name: "syslog".into(),
            display_name: "Syslog".into(),
            label: "Forward alerts to syslog".into(),
            description: "Forward alerts to syslog".into(),
            integration_type: IntegrationType::EventOutput,
            supported_event_types: event_types.iter().map(|s| s.to_string()).collect(),
            required_fields: vec![],
            max_send_retries: 3,
            polling_enabled: false,
            polling_duration: None,
            test_connection_enabled: true,
            parameters: vec![],
            path: PathBuf::from("/tmp/syslog"),
        }
    }

    #[test]
    fn test_integration_summary() {
        assert_eq!(
            integration_summary(&integration(&[])),
            "syslog: Forward alerts to syslog [Event types: all]"
        );
        assert_eq!(
            integration_summary(&integration(&["ssh_login", "http_request"])),
            "syslog: Forward alerts to syslog [Event types: ssh_login, http_request]"
        );
    }
}
