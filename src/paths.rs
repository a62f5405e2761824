//! Configuration file location
//!
//! - **Working directory**: if `config.yaml` exists in the current working
//!   directory (typical when running with `cargo run`), that file is used.
//! - **Installed** (default): `<config dir>/Mouse2Pad/config.yaml`, i.e.
//!   `%APPDATA%\Mouse2Pad` on Windows or `~/.config/Mouse2Pad` on Linux.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Application name used for directories in installed mode
const APP_NAME: &str = "Mouse2Pad";

/// Configuration file name
pub const CONFIG_FILE: &str = "config.yaml";

/// Resolve the configuration file to use when none is given on the command line
pub fn default_config_path() -> PathBuf {
    resolve_config_path(Path::new("."), dirs::config_dir())
}

fn resolve_config_path(cwd: &Path, config_dir: Option<PathBuf>) -> PathBuf {
    let local = cwd.join(CONFIG_FILE);
    if local.is_file() {
        debug!("Using config from working directory: {}", local.display());
        return local;
    }

    match config_dir {
        Some(dir) => dir.join(APP_NAME).join(CONFIG_FILE),
        None => local,
    }
}
