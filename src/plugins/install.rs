//! Installing plugins from local directories and removing them.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{HoneycombError, Result};

use super::defs::{PluginKind, NAME};
use super::loader::{basename, Plugin};

/// Validate the plugin in `source` and copy it to `<install_root>/<name>`.
///
/// Nothing is copied unless registration succeeds. Sources that are not a
/// local directory are reported as `PluginNotFound`.
///
/// # Errors
/// - `HoneycombError::PluginAlreadyInstalled` if the target directory exists
/// - any registration error of the plugin itself
pub fn install_plugin(source: &Path, kind: PluginKind, install_root: &Path) -> Result<Plugin> {
    let source_name = basename(source);
    if install_root.join(&source_name).exists() {
        return Err(HoneycombError::PluginAlreadyInstalled(source_name));
    }
    if !source.is_dir() {
        debug!(kind = %kind, source = %source.display(), "Not a local plugin directory");
        return Err(HoneycombError::PluginNotFound {
            kind: kind.to_string(),
            name: source_name,
        });
    }

    debug!(source = %source.display(), "Validating plugin before install");
    let plugin = Plugin::register(kind, source)?;

    let target = install_root.join(plugin.name());
    if target.parent() != Some(install_root) {
        return Err(HoneycombError::validation(
            NAME,
            &Value::String(plugin.name().to_string()),
            "plugin name must be a single directory name",
        ));
    }
    if target.exists() {
        return Err(HoneycombError::PluginAlreadyInstalled(plugin.name().to_string()));
    }

    debug!(source = %source.display(), target = %target.display(), "Copying plugin");
    copy_tree(source, &target)?;
    info!(kind = %kind, plugin = %plugin.name(), path = %target.display(), "Installed plugin");

    // Re-register from the installed copy so the descriptor points there.
    Plugin::register(kind, &target)
}

/// Remove an installed plugin directory.
///
/// Returns `false` when there was nothing to remove.
pub fn uninstall_plugin(path: &Path) -> Result<bool> {
    if !path.exists() {
        debug!(path = %path.display(), "Nothing to uninstall");
        return Ok(false);
    }
    fs::remove_dir_all(path)?;
    info!(plugin = %basename(path), "Uninstalled plugin");
    Ok(true)
}

fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to: PathBuf = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}
