use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use honeycomb::config::{debug_env_enabled, is_running_as_root};
use honeycomb::utils::logging;
use honeycomb::Config;

mod cli;

use cli::integration::{
    cmd_integration_configure, cmd_integration_install, cmd_integration_list,
    cmd_integration_show, cmd_integration_test, cmd_integration_uninstall,
};
use cli::service::{
    cmd_service_install, cmd_service_list, cmd_service_run, cmd_service_show,
    cmd_service_status, cmd_service_test, cmd_service_uninstall,
};

#[derive(Parser)]
#[command(name = "honeycomb")]
#[command(about = "Honeycomb is a honeypot framework", version)]
struct Cli {
    /// Path to the Honeycomb home (default: $HONEYCOMB_HOME or ~/.honeycomb)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Force run as root (NOT RECOMMENDED!)
    #[arg(long, global = true)]
    iamroot: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Honeycomb services
    Service {
        #[command(subcommand)]
        action: ServiceAction,
    },
    /// Honeycomb output integrations
    Integration {
        #[command(subcommand)]
        action: IntegrationAction,
    },
}

#[derive(Subcommand)]
enum ServiceAction {
    /// Install a service from a local directory
    Install {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Uninstall a service
    Uninstall {
        /// Don't ask for confirmation of uninstall deletions
        #[arg(short, long)]
        yes: bool,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List installed services
    List,
    /// Show detailed information about a service
    Show { name: String },
    /// Load and run a specific service
    Run {
        name: String,
        /// Service arguments in key=value format
        args: Vec<String>,
        /// Load service directly from the given path without installing
        #[arg(short, long)]
        editable: bool,
        /// Show available service arguments
        #[arg(short = 'a', long)]
        show_args: bool,
        /// Enable an integration
        #[arg(short, long = "integration")]
        integrations: Vec<String>,
    },
    /// Show status of installed service(s)
    Status {
        names: Vec<String>,
        /// Show status for all services
        #[arg(short = 'a', long)]
        show_all: bool,
    },
    /// Test a running service
    Test {
        #[arg(required = true)]
        names: Vec<String>,
        /// Do not check if service is running before testing
        #[arg(short, long)]
        force: bool,
        /// Load service directly from the given path
        #[arg(short, long)]
        editable: bool,
    },
}

#[derive(Subcommand)]
enum IntegrationAction {
    /// Install an integration from a local directory
    Install {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Uninstall an integration
    Uninstall {
        /// Don't ask for confirmation of uninstall deletions
        #[arg(short, long)]
        yes: bool,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List installed integrations
    List,
    /// Show detailed information about an integration
    Show { name: String },
    /// Configure an integration with default parameters
    Configure {
        name: String,
        /// Integration arguments in key=value format
        args: Vec<String>,
        /// Load integration directly from the given path without installing
        #[arg(short, long)]
        editable: bool,
        /// Show available integration arguments
        #[arg(short = 'a', long)]
        show_args: bool,
    },
    /// Test an integration
    Test {
        #[arg(required = true)]
        names: Vec<String>,
        /// Load integration directly from the given path
        #[arg(short, long)]
        editable: bool,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        cli::print_err(format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::resolve(cli.home);
    config.ensure_layout()?;
    logging::init(&config, cli.verbose, debug_env_enabled())?;
    debug!(version = env!("CARGO_PKG_VERSION"), home = %config.home.display(), "Starting up Honeycomb");

    if is_running_as_root() {
        if !cli.iamroot {
            bail!(
                "Honeycomb should not run as a privileged user, if you are just trying to bind to a \
                 low port try running `setcap \"cap_net_bind_service=+ep\" $(which honeycomb)` \
                 instead. If you insist, use --iamroot"
            );
        }
        warn!("Running as root!");
    }

    match cli.command {
        Commands::Service { action } => match action {
            ServiceAction::Install { paths } => cmd_service_install(&config, &paths),
            ServiceAction::Uninstall { yes, names } => cmd_service_uninstall(&config, &names, yes),
            ServiceAction::List => cmd_service_list(&config),
            ServiceAction::Show { name } => cmd_service_show(&config, &name),
            ServiceAction::Run {
                name,
                args,
                editable,
                show_args,
                integrations,
            } => cmd_service_run(&config, &name, &args, editable, show_args, &integrations).await,
            ServiceAction::Status { names, show_all } => {
                cmd_service_status(&config, &names, show_all)
            }
            ServiceAction::Test {
                names,
                force,
                editable,
            } => cmd_service_test(&config, &names, force, editable).await,
        },
        Commands::Integration { action } => match action {
            IntegrationAction::Install { paths } => cmd_integration_install(&config, &paths),
            IntegrationAction::Uninstall { yes, names } => {
                cmd_integration_uninstall(&config, &names, yes)
            }
            IntegrationAction::List => cmd_integration_list(&config),
            IntegrationAction::Show { name } => cmd_integration_show(&config, &name),
            IntegrationAction::Configure {
                name,
                args,
                editable,
                show_args,
            } => cmd_integration_configure(&config, &name, &args, editable, show_args),
            IntegrationAction::Test { names, editable } => {
                cmd_integration_test(&config, &names, editable).await
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_service_run() {
        let cli = Cli::try_parse_from([
            "honeycomb",
            "--home",
            "/tmp/hc",
            "service",
            "run",
            "simple_http",
            "port=8888",
            "-i",
            "syslog",
            "-a",
        ])
        .unwrap();
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/hc")));
        match cli.command {
            Commands::Service {
                action:
                    ServiceAction::Run {
                        name,
                        args,
                        show_args,
                        integrations,
                        editable,
                    },
            } => {
                assert_eq!(name, "simple_http");
                assert_eq!(args, vec!["port=8888"]);
                assert!(show_args);
                assert!(!editable);
                assert_eq!(integrations, vec!["syslog"]);
            }
            _ => panic!("expected service run"),
        }
    }

    #[test]
    fn test_parse_status_show_all() {
        let cli = Cli::try_parse_from(["honeycomb", "service", "status", "--show-all"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Service {
                action: ServiceAction::Status { show_all: true, .. }
            }
        ));
    }

    #[test]
    fn test_uninstall_requires_name() {
        assert!(Cli::try_parse_from(["honeycomb", "integration", "uninstall", "-y"]).is_err());
    }
}
