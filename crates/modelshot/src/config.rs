//! Configuration types for the modelshot engine.
//!
//! All types implement [`serde::Deserialize`] and fall back to defaults for
//! every missing key, so an empty document is a valid configuration.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining all sections.
//! - [`RenderConfig`] - Render target, browser automation and timing.
//! - [`AssetsConfig`] - Where rendered images are stored and served from.
//! - [`AccessConfig`] - Preview bypass secret and static bearer tokens.
//! - [`StoreConfig`] - Location of the persisted store snapshot.
//! - [`MaintenanceConfig`] - Limits for maintenance jobs.
//!
//! # Example
//!
//! ```
//! # use modelshot::config::AppConfig;
//! let config = AppConfig::default();
//! assert_eq!(config.render().frontend_url(), "http://localhost:3000");
//! assert_eq!(config.maintenance().backfill_limit(), 100);
//! ```

use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use serde::Deserialize;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    render: RenderConfig,

    #[serde(default)]
    assets: AssetsConfig,

    #[serde(default)]
    access: AccessConfig,

    #[serde(default)]
    store: StoreConfig,

    #[serde(default)]
    maintenance: MaintenanceConfig,
}

impl AppConfig {
    pub fn render(&self) -> &RenderConfig {
        &self.render
    }

    pub fn render_mut(&mut self) -> &mut RenderConfig {
        &mut self.render
    }

    pub fn assets(&self) -> &AssetsConfig {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut AssetsConfig {
        &mut self.assets
    }

    pub fn access(&self) -> &AccessConfig {
        &self.access
    }

    pub fn access_mut(&mut self) -> &mut AccessConfig {
        &mut self.access
    }

    pub fn store(&self) -> &StoreConfig {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut StoreConfig {
        &mut self.store
    }

    pub fn maintenance(&self) -> &MaintenanceConfig {
        &self.maintenance
    }
}

/// Render target and browser automation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Base URL of the frontend serving the preview and embed pages.
    frontend_url: String,

    /// WebDriver endpoint of a remote browser pool. When unset a local
    /// driver process is spawned.
    remote_browser: Option<String>,

    /// Driver executable spawned when no remote browser is configured.
    webdriver_binary: PathBuf,

    webdriver_port: u16,

    navigation_timeout_secs: u64,

    /// Interval between two reads of the diagram dimensions.
    poll_interval_ms: u64,

    /// Reads of the diagram dimensions before measuring gives up.
    max_poll_attempts: u32,

    /// Margin added on every side of the measured diagram, in CSS pixels.
    diagram_padding: f64,

    device_scale_factor: f64,

    /// Selector that appears once the page has finished drawing.
    ready_selector: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            remote_browser: None,
            webdriver_binary: PathBuf::from("chromedriver"),
            webdriver_port: 9515,
            navigation_timeout_secs: 30,
            poll_interval_ms: 200,
            max_poll_attempts: 150,
            diagram_padding: 40.0,
            device_scale_factor: 2.0,
            ready_selector: ".is-fully-drawn".to_string(),
        }
    }
}

impl RenderConfig {
    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }

    pub fn set_frontend_url(&mut self, url: impl Into<String>) {
        self.frontend_url = url.into();
    }

    pub fn remote_browser(&self) -> Option<&str> {
        self.remote_browser.as_deref()
    }

    pub fn set_remote_browser(&mut self, endpoint: Option<String>) {
        self.remote_browser = endpoint;
    }

    pub fn webdriver_binary(&self) -> &PathBuf {
        &self.webdriver_binary
    }

    pub fn webdriver_port(&self) -> u16 {
        self.webdriver_port
    }

    /// Upper bound for a single navigation or readiness wait.
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Never less than one attempt.
    pub fn max_poll_attempts(&self) -> u32 {
        self.max_poll_attempts.max(1)
    }

    pub fn diagram_padding(&self) -> f64 {
        self.diagram_padding
    }

    pub fn device_scale_factor(&self) -> f64 {
        self.device_scale_factor
    }

    pub fn ready_selector(&self) -> &str {
        &self.ready_selector
    }
}

/// Asset store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Directory the local asset store writes images into.
    root: PathBuf,

    /// Public URL prefix images are delivered from.
    base_url: String,

    /// Folder prefix for newly created images; the model slug is appended.
    folder_base: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("modelshot-assets"),
            base_url: "http://localhost:8080/assets".to_string(),
            folder_base: "app/public/staging".to_string(),
        }
    }
}

impl AssetsConfig {
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_base_url(&mut self, url: impl Into<String>) {
        self.base_url = url.into();
    }

    pub fn folder_base(&self) -> &str {
        &self.folder_base
    }
}

/// Access control settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Shared secret that lets the renderer read private models.
    preview_secret: Option<String>,

    /// Bearer token to user id table for the static identity resolver.
    tokens: BTreeMap<String, String>,
}

impl AccessConfig {
    pub fn preview_secret(&self) -> Option<&str> {
        self.preview_secret.as_deref()
    }

    pub fn set_preview_secret(&mut self, secret: Option<String>) {
        self.preview_secret = secret;
    }

    pub fn tokens(&self) -> &BTreeMap<String, String> {
        &self.tokens
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot file of the store.
    path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("modelshot-store.json"),
        }
    }
}

impl StoreConfig {
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }
}

/// Maintenance job settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Models processed by one backfill run.
    backfill_limit: usize,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            backfill_limit: 100,
        }
    }
}

impl MaintenanceConfig {
    pub fn backfill_limit(&self) -> usize {
        self.backfill_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        let render = config.render();

        assert_eq!(render.webdriver_port(), 9515);
        assert_eq!(render.navigation_timeout(), Duration::from_secs(30));
        assert_eq!(render.poll_interval(), Duration::from_millis(200));
        assert_eq!(render.max_poll_attempts(), 150);
        assert_eq!(render.ready_selector(), ".is-fully-drawn");
        assert!(render.remote_browser().is_none());
        assert_eq!(config.assets().folder_base(), "app/public/staging");
        assert!(config.access().preview_secret().is_none());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "render": {"frontend_url": "https://contentmodel.io", "max_poll_attempts": 0},
            "access": {"tokens": {"t0k3n": "user-1"}}
        }))
        .unwrap();

        assert_eq!(config.render().frontend_url(), "https://contentmodel.io");
        assert_eq!(config.render().webdriver_port(), 9515);
        assert_eq!(config.render().max_poll_attempts(), 1);
        assert_eq!(config.access().tokens().get("t0k3n").unwrap(), "user-1");
        assert_eq!(config.maintenance().backfill_limit(), 100);
    }
}
