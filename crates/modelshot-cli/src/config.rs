//! Configuration file loading for the CLI
//!
//! This module finds and loads the TOML configuration file, then applies
//! environment overrides on top of it.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use thiserror::Error;

use modelshot::{ModelshotError, config::AppConfig};

/// Configuration-related errors for CLI
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(String),

    #[error("Missing configuration file: {0}")]
    MissingFile(PathBuf),
}

impl From<ConfigError> for ModelshotError {
    fn from(err: ConfigError) -> Self {
        ModelshotError::Io(io::Error::other(err.to_string()))
    }
}

/// Find and load configuration from various locations
///
/// Search order:
/// 1. Explicit path if provided
/// 2. Local project directory (modelshot/config.toml)
/// 3. Platform-specific config directory
/// 4. Default config if none found
///
/// # Errors
///
/// Returns error if:
/// - Explicit path is provided but file doesn't exist
/// - Config file exists but cannot be parsed
pub fn load_config(explicit_path: Option<impl AsRef<Path>>) -> Result<AppConfig, ModelshotError> {
    if let Some(path) = explicit_path {
        let path = path.as_ref();
        info!(path = path.display().to_string(); "Loading configuration from explicit path");
        return load_config_file(path);
    }

    let local_config = Path::new("modelshot/config.toml");
    if local_config.exists() {
        info!(path = local_config.display().to_string(); "Loading configuration from local path");
        return load_config_file(local_config);
    }

    if let Some(proj_dirs) = ProjectDirs::from("com", "modelshot", "modelshot") {
        let system_config = proj_dirs.config_dir().join("config.toml");

        if system_config.exists() {
            info!(path = system_config.display().to_string(); "Loading configuration from system path");
            return load_config_file(system_config);
        }

        debug!(path = system_config.display().to_string(); "System configuration file not found");
    } else {
        debug!("Could not determine platform-specific config directory");
    }

    debug!("No configuration file found, using default configuration");
    Ok(AppConfig::default())
}

fn load_config_file(path: impl AsRef<Path>) -> Result<AppConfig, ModelshotError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()).into());
    }

    let content = fs::read_to_string(path)?;
    let config: AppConfig =
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

    Ok(config)
}

/// Applies `FRONTEND_URL`, `REMOTE_WEBDRIVER`, `MODELSHOT_PREVIEW_SECRET`
/// and `MODELSHOT_ASSET_BASE_URL` from `lookup`. Empty values are ignored.
pub fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(url) = var("FRONTEND_URL") {
        debug!(frontend_url = url.as_str(); "Frontend URL from environment");
        config.render_mut().set_frontend_url(url);
    }
    if let Some(endpoint) = var("REMOTE_WEBDRIVER") {
        debug!(remote_browser = endpoint.as_str(); "Remote WebDriver from environment");
        config.render_mut().set_remote_browser(Some(endpoint));
    }
    if let Some(secret) = var("MODELSHOT_PREVIEW_SECRET") {
        debug!("Preview secret from environment");
        config.access_mut().set_preview_secret(Some(secret));
    }
    if let Some(url) = var("MODELSHOT_ASSET_BASE_URL") {
        debug!(base_url = url.as_str(); "Asset base URL from environment");
        config.assets_mut().set_base_url(url);
    }
}
