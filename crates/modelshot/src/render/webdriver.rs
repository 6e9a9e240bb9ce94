//! A minimal W3C WebDriver client for headless Chrome.
//!
//! Only the handful of commands the screenshot pipeline needs are
//! implemented. Viewport emulation goes through chromedriver's
//! `goog/cdp/execute` extension.

use std::{
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use base64::Engine;
use log::{debug, info, warn};
use serde_json::{Value, json};

use super::{BrowserError, BrowserLauncher, BrowserSession, Viewport};
use crate::config::RenderConfig;

const CHROME_ARGS: [&str; 4] = [
    "--headless=new",
    "--disable-gpu",
    "--no-sandbox",
    "--hide-scrollbars",
];

/// Error code WebDriver reports for a selector without matches.
const NO_SUCH_ELEMENT: &str = "no such element";

/// Launches WebDriver sessions, either against a remote endpoint or a
/// locally spawned driver binary.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    config: RenderConfig,
}

impl WebDriverLauncher {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    fn agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(self.config.navigation_timeout())
            .build()
    }

    fn spawn_driver(&self) -> Result<(DriverProcess, String), BrowserError> {
        let port = self.config.webdriver_port();
        let binary = self.config.webdriver_binary();
        let child = Command::new(binary)
            .arg(format!("--port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| BrowserError::Launch(format!("{}: {err}", binary.display())))?;
        info!(binary:? = binary, port; "Spawned WebDriver");
        Ok((DriverProcess(child), format!("http://127.0.0.1:{port}")))
    }

    /// Polls `/status` until the driver accepts sessions.
    fn wait_until_ready(&self, agent: &ureq::Agent, endpoint: &str) -> Result<(), BrowserError> {
        let timeout = self.config.navigation_timeout();
        let deadline = Instant::now() + timeout;
        loop {
            match command(agent, "GET", &format!("{endpoint}/status"), None) {
                Ok(status) if status["ready"].as_bool().unwrap_or(true) => return Ok(()),
                Ok(_) => debug!(endpoint; "WebDriver not ready yet"),
                Err(err) => debug!(endpoint, error = err.message.as_str(); "WebDriver not reachable yet"),
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    waited: timeout,
                    what: format!("WebDriver at {endpoint}"),
                });
            }
            thread::sleep(self.config.poll_interval());
        }
    }
}

impl BrowserLauncher for WebDriverLauncher {
    fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let agent = self.agent();
        let (driver, endpoint) = match self.config.remote_browser() {
            Some(remote) => {
                info!(endpoint = remote; "Attaching to remote WebDriver");
                (None, remote.trim_end_matches('/').to_string())
            }
            None => {
                let (driver, endpoint) = self.spawn_driver()?;
                (Some(driver), endpoint)
            }
        };
        self.wait_until_ready(&agent, &endpoint)?;

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": CHROME_ARGS },
                }
            }
        });
        let created = command(&agent, "POST", &format!("{endpoint}/session"), Some(capabilities))
            .map_err(|err| BrowserError::Launch(err.to_string()))?;
        let session_id = created["sessionId"]
            .as_str()
            .ok_or_else(|| BrowserError::Protocol("session response without sessionId".to_string()))?
            .to_string();

        let session = WebDriverSession {
            agent,
            url: format!("{endpoint}/session/{session_id}"),
            poll_interval: self.config.poll_interval(),
            page: None,
            driver,
        };
        let timeout_ms = u64::try_from(self.config.navigation_timeout().as_millis()).unwrap_or(u64::MAX);
        session.post("timeouts", json!({ "pageLoad": timeout_ms, "script": timeout_ms }))?;

        info!(session = session_id.as_str(); "Browser session started");
        Ok(Box::new(session))
    }
}

/// A locally spawned driver, killed when dropped.
#[derive(Debug)]
struct DriverProcess(Child);

impl Drop for DriverProcess {
    fn drop(&mut self) {
        if let Err(err) = self.0.kill() {
            warn!(err:%; "Failed to stop WebDriver");
        }
        let _ = self.0.wait();
    }
}

/// One WebDriver session.
#[derive(Debug)]
pub struct WebDriverSession {
    agent: ureq::Agent,
    /// `{endpoint}/session/{id}`
    url: String,
    poll_interval: Duration,
    /// Window handle of the current page.
    page: Option<String>,
    driver: Option<DriverProcess>,
}

impl WebDriverSession {
    fn post(&self, path: &str, body: Value) -> Result<Value, BrowserError> {
        Ok(command(&self.agent, "POST", &format!("{}/{path}", self.url), Some(body))?)
    }

    fn get(&self, path: &str) -> Result<Value, BrowserError> {
        Ok(command(&self.agent, "GET", &format!("{}/{path}", self.url), None)?)
    }

    fn require_page(&self) -> Result<(), BrowserError> {
        match self.page {
            Some(_) => Ok(()),
            None => Err(BrowserError::NoPage),
        }
    }
}

impl BrowserSession for WebDriverSession {
    fn open_page(&mut self, viewport: Viewport) -> Result<(), BrowserError> {
        let created = self.post("window/new", json!({ "type": "tab" }))?;
        let handle = created["handle"]
            .as_str()
            .ok_or_else(|| BrowserError::Protocol("new window without handle".to_string()))?
            .to_string();
        self.post("window", json!({ "handle": handle }))?;
        self.post(
            "goog/cdp/execute",
            json!({
                "cmd": "Emulation.setDeviceMetricsOverride",
                "params": {
                    "width": viewport.width,
                    "height": viewport.height,
                    "deviceScaleFactor": viewport.device_scale_factor,
                    "mobile": false,
                }
            }),
        )?;
        debug!(viewport:% = viewport, handle = handle.as_str(); "Opened page");
        self.page = Some(handle);
        Ok(())
    }

    fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.require_page()?;
        debug!(url; "Navigating");
        self.post("url", json!({ "url": url }))
            .map(|_| ())
            .map_err(|err| BrowserError::Navigation {
                url: url.to_string(),
                reason: err.to_string(),
            })
    }

    fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.require_page()?;
        let deadline = Instant::now() + timeout;
        let body = json!({ "using": "css selector", "value": selector });
        loop {
            match command(&self.agent, "POST", &format!("{}/element", self.url), Some(body.clone())) {
                Ok(_) => return Ok(()),
                Err(err) if err.error == NO_SUCH_ELEMENT => {}
                Err(err) => return Err(err.into()),
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    waited: timeout,
                    what: format!("selector `{selector}`"),
                });
            }
            thread::sleep(self.poll_interval);
        }
    }

    fn evaluate(&mut self, script: &str) -> Result<Value, BrowserError> {
        self.require_page()?;
        command(
            &self.agent,
            "POST",
            &format!("{}/execute/sync", self.url),
            Some(json!({ "script": script, "args": [] })),
        )
        .map_err(|err| BrowserError::Script(err.to_string()))
    }

    fn screenshot(&mut self) -> Result<Vec<u8>, BrowserError> {
        self.require_page()?;
        let encoded = self.get("screenshot")?;
        let encoded = encoded
            .as_str()
            .ok_or_else(|| BrowserError::Protocol("screenshot is not a string".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|err| BrowserError::Protocol(format!("screenshot is not base64: {err}")))
    }

    fn close_page(&mut self) -> Result<(), BrowserError> {
        if self.page.take().is_some() {
            command(&self.agent, "DELETE", &format!("{}/window", self.url), None)?;
        }
        Ok(())
    }

    fn release(mut self: Box<Self>) -> Result<(), BrowserError> {
        let result = command(&self.agent, "DELETE", &self.url, None);
        // Dropping the driver process stops it.
        self.driver.take();
        info!("Browser session released");
        result.map(|_| ()).map_err(BrowserError::from)
    }
}

/// An error answer of the driver, or a transport failure.
#[derive(Debug)]
struct WireError {
    error: String,
    message: String,
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl From<WireError> for BrowserError {
    fn from(err: WireError) -> Self {
        BrowserError::Protocol(err.to_string())
    }
}

/// Sends one WebDriver command and unwraps the `value` of the answer.
fn command(
    agent: &ureq::Agent,
    method: &str,
    url: &str,
    body: Option<Value>,
) -> Result<Value, WireError> {
    let request = agent.request(method, url);
    let response = match body {
        Some(body) => request.send_json(body),
        None => request.call(),
    };

    match response {
        Ok(response) => {
            let mut answer: Value = response.into_json().map_err(|err| WireError {
                error: "invalid response".to_string(),
                message: err.to_string(),
            })?;
            Ok(answer.get_mut("value").map(Value::take).unwrap_or_default())
        }
        Err(ureq::Error::Status(status, response)) => {
            let answer: Value = response.into_json().unwrap_or(Value::Null);
            Err(WireError {
                error: answer["value"]["error"]
                    .as_str()
                    .unwrap_or("unknown error")
                    .to_string(),
                message: answer["value"]["message"]
                    .as_str()
                    .map_or_else(|| format!("HTTP {status}"), str::to_string),
            })
        }
        Err(ureq::Error::Transport(transport)) => Err(WireError {
            error: "transport".to_string(),
            message: transport.to_string(),
        }),
    }
}
