//! Command handlers for the `honeycomb` binary.

pub(crate) mod integration;
pub(crate) mod service;

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};

use honeycomb::plugins::defs::is_plugin_dir_name;
use honeycomb::plugins::{install_plugin, uninstall_plugin, PluginKind};
use honeycomb::Config;

/// `[+]` success, `[*]` info, `[-]` failure; mirrors the log levels on stdout.
pub(crate) fn print_ok(message: impl AsRef<str>) {
    println!("[+] {}", message.as_ref());
}

pub(crate) fn print_info(message: impl AsRef<str>) {
    println!("[*] {}", message.as_ref());
}

pub(crate) fn print_err(message: impl AsRef<str>) {
    eprintln!("[-] {}", message.as_ref());
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Ask a yes/no question on stdin; anything but `y`/`yes` is a no.
pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    print!("[?] {} [y/N]: ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .with_context(|| "Failed to read answer")?;
    Ok(is_yes(&answer))
}

/// Shared by `service install` and `integration install`.
pub(crate) fn install_all(config: &Config, kind: PluginKind, sources: &[String]) -> Result<()> {
    let install_root = config.plugins_dir(kind);
    for source in sources {
        let plugin = install_plugin(Path::new(source), kind, &install_root)?;
        print_ok(format!("Installed {} {}", kind, plugin.name()));
    }
    Ok(())
}

/// Shared by `service uninstall` and `integration uninstall`.
pub(crate) fn uninstall_all(
    config: &Config,
    kind: PluginKind,
    names: &[String],
    yes: bool,
) -> Result<()> {
    for name in names {
        if !is_plugin_dir_name(name) {
            print_err(format!("`{}` is not a valid {} name", name, kind));
            continue;
        }
        let path = config.plugin_path(kind, name, false);
        if !path.exists() {
            print_err(format!(
                "doh! I cannot seem to find `{}`, are you sure it's installed?",
                name
            ));
            continue;
        }
        if !yes && !confirm(&format!("Are you sure you want to delete `{}` from honeycomb?", name))? {
            print_info(format!("Keeping {}", name));
            continue;
        }
        if uninstall_plugin(&path)? {
            print_info(format!("Uninstalled {}", name));
        }
    }
    Ok(())
}

/// `Requires:` line of `show`, from an optional `requirements.txt`.
pub(crate) fn read_requirements(plugin_dir: &Path) -> String {
    std::fs::read_to_string(plugin_dir.join("requirements.txt"))
        .map(|r| r.split_whitespace().collect::<Vec<_>>().join(" "))
        .ok()
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "None".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("nope"));
    }

    #[test]
    fn test_read_requirements() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(read_requirements(tmp.path()), "None");
        std::fs::write(tmp.path().join("requirements.txt"), "flask\nrequests\n").unwrap();
        assert_eq!(read_requirements(tmp.path()), "flask requests");
    }

    #[test]
    fn test_uninstall_all_missing_plugin_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            home: tmp.path().to_path_buf(),
        };
        config.ensure_layout().unwrap();
        uninstall_all(&config, PluginKind::Service, &["ghost".to_string()], true).unwrap();
    }

    #[test]
    fn test_uninstall_all_ignores_path_like_names() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            home: tmp.path().join("home"),
        };
        config.ensure_layout().unwrap();
        let outside = tmp.path().join("keep");
        std::fs::create_dir(&outside).unwrap();
        uninstall_all(&config, PluginKind::Service, &["../../keep".to_string()], true).unwrap();
        assert!(outside.exists());
    }

    #[test]
    fn test_uninstall_all_removes_with_yes() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            home: tmp.path().to_path_buf(),
        };
        config.ensure_layout().unwrap();
        let dir = config.services_dir().join("simple_http");
        std::fs::create_dir(&dir).unwrap();
        uninstall_all(&config, PluginKind::Service, &["simple_http".to_string()], true).unwrap();
        assert!(!dir.exists());
    }
}
