use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use wechat_platform::Config;

const APP_DIR: &str = "wechat-platform";
const CONFIG_FILE: &str = "config.toml";

/// Default location of the configuration file.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Load the configuration from `explicit` or the default location.
pub fn load(explicit: Option<&Path>) -> Result<(Config, PathBuf)> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => default_path().context("Could not determine the user config directory")?,
    };
    let config = Config::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    Ok((config, path))
}
