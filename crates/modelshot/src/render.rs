//! Browser automation seam.
//!
//! The screenshot pipeline drives a [`BrowserSession`] obtained from a
//! [`BrowserLauncher`]. A session shows at most one page at a time; opening
//! a page with a new [`Viewport`] is how the viewport is reset between
//! renders. [`WebDriverLauncher`] is the production implementation.

mod targets;
mod webdriver;

pub use targets::{EmbedMode, RenderTargets};
pub use webdriver::{WebDriverLauncher, WebDriverSession};

use std::{fmt, time::Duration};

use serde::Deserialize;
use thiserror::Error;

/// Script that returns the diagram dimensions published by the embed page,
/// or `null` while they are not computed yet.
pub const DIMENSIONS_SCRIPT: &str = "return (window.contentmodelio && window.contentmodelio.dimensions) || null;";

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("could not start or reach the browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { waited: Duration, what: String },

    #[error("WebDriver protocol error: {0}")]
    Protocol(String),

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("no page is open")]
    NoPage,

    #[error("invalid render target URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Size and pixel density of a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

impl Viewport {
    /// The fixed size of the link-sharing preview image.
    pub const META: Viewport = Viewport::new(1200, 627);

    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            device_scale_factor: 1.0,
        }
    }

    pub fn with_device_scale_factor(mut self, factor: f64) -> Self {
        self.device_scale_factor = factor;
        self
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}@{}",
            self.width, self.height, self.device_scale_factor
        )
    }
}

/// Dimensions the embed page computes once the diagram is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramDimensions {
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(alias = "totalContentTypesWidth")]
    pub total_width: f64,
    #[serde(alias = "totalContentTypesHeight")]
    pub total_height: f64,
}

impl DiagramDimensions {
    /// Reads the dimensions from a script result. `Ok(None)` means the page
    /// has not published them yet.
    pub fn from_script_value(value: serde_json::Value) -> Result<Option<Self>, BrowserError> {
        if value.is_null() {
            return Ok(None);
        }
        let dimensions: Self = serde_json::from_value(value)
            .map_err(|err| BrowserError::Script(format!("malformed diagram dimensions: {err}")))?;

        let valid = |v: f64| v.is_finite() && v >= 0.0;
        if !valid(dimensions.total_width) || !valid(dimensions.total_height) {
            return Err(BrowserError::Script(format!(
                "diagram dimensions out of range: {}x{}",
                dimensions.total_width, dimensions.total_height
            )));
        }
        Ok(Some(dimensions))
    }

    /// The viewport that fits the diagram with `padding` on every side.
    pub fn viewport(&self, padding: f64, device_scale_factor: f64) -> Viewport {
        let width = (self.total_width + 2.0 * padding).ceil().max(1.0);
        let height = (self.total_height + 2.0 * padding).ceil().max(1.0);
        Viewport::new(width as u32, height as u32).with_device_scale_factor(device_scale_factor)
    }
}

/// Acquires browser sessions.
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// One browser automation session.
pub trait BrowserSession: Send {
    /// Opens a fresh page with the given viewport and makes it current.
    fn open_page(&mut self, viewport: Viewport) -> Result<(), BrowserError>;

    fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Waits until an element matches `selector`, failing with
    /// [`BrowserError::Timeout`] after `timeout`.
    fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Runs a script body in the current page and returns its result.
    fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// Captures the current page as PNG bytes.
    fn screenshot(&mut self) -> Result<Vec<u8>, BrowserError>;

    fn close_page(&mut self) -> Result<(), BrowserError>;

    /// Ends the session and frees everything it holds.
    fn release(self: Box<Self>) -> Result<(), BrowserError>;
}
