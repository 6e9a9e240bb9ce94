//! Scripted collaborators for exercising the pipeline and the service
//! without a browser.

use std::{
    io::Cursor,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::{Value, json};

use crate::{
    render::{BrowserError, BrowserLauncher, BrowserSession, Viewport},
    worker::{RegenerationJob, RegenerationQueue},
};

/// A browser interaction recorded by [`ScriptedLauncher`].
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserCall {
    Launch,
    OpenPage(Viewport),
    Navigate(String),
    WaitForSelector(String),
    Evaluate,
    Screenshot(Viewport),
    ClosePage,
    Release,
}

#[derive(Debug, Clone)]
struct Script {
    fail_launch: bool,
    /// Navigation to a URL containing this fragment fails.
    fail_navigation: Option<String>,
    /// Evaluations answering `null` before the dimensions appear.
    pending_evaluations: u32,
    dimensions: Option<Value>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            fail_launch: false,
            fail_navigation: None,
            pending_evaluations: 0,
            dimensions: Some(json!({ "scale": 1, "totalWidth": 320, "totalHeight": 200 })),
        }
    }
}

/// A [`BrowserLauncher`] whose sessions follow a script and record every
/// call. Screenshots are blank PNGs of the current viewport size.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLauncher {
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Vec<BrowserCall>>>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_launch(self) -> Self {
        self.edit(|script| script.fail_launch = true)
    }

    /// Fails navigation to every URL containing `fragment`.
    pub fn failing_navigation(self, fragment: impl Into<String>) -> Self {
        let fragment = fragment.into();
        self.edit(|script| script.fail_navigation = Some(fragment))
    }

    /// The embed page publishes its dimensions after `polls` evaluations.
    pub fn dimensions_after(self, polls: u32) -> Self {
        self.edit(|script| script.pending_evaluations = polls)
    }

    /// The embed page never publishes dimensions.
    pub fn without_dimensions(self) -> Self {
        self.edit(|script| script.dimensions = None)
    }

    pub fn with_dimensions(self, width: f64, height: f64) -> Self {
        self.edit(|script| {
            script.dimensions = Some(json!({ "totalContentTypesWidth": width, "totalContentTypesHeight": height }));
        })
    }

    fn edit(self, f: impl FnOnce(&mut Script)) -> Self {
        if let Ok(mut script) = self.script.lock() {
            f(&mut script);
        }
        self
    }

    /// Every call made so far, across sessions.
    pub fn calls(&self) -> Vec<BrowserCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// URLs navigated to, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BrowserCall::Navigate(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &BrowserCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: BrowserCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl BrowserLauncher for ScriptedLauncher {
    fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        self.record(BrowserCall::Launch);
        let script = self
            .script
            .lock()
            .map(|script| script.clone())
            .unwrap_or_default();
        if script.fail_launch {
            return Err(BrowserError::Launch("scripted launch failure".to_string()));
        }
        Ok(Box::new(ScriptedSession {
            launcher: self.clone(),
            script,
            page: None,
        }))
    }
}

struct ScriptedSession {
    launcher: ScriptedLauncher,
    script: Script,
    page: Option<Viewport>,
}

impl ScriptedSession {
    fn page(&self) -> Result<Viewport, BrowserError> {
        self.page.ok_or(BrowserError::NoPage)
    }
}

impl BrowserSession for ScriptedSession {
    fn open_page(&mut self, viewport: Viewport) -> Result<(), BrowserError> {
        self.launcher.record(BrowserCall::OpenPage(viewport));
        self.page = Some(viewport);
        Ok(())
    }

    fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.launcher.record(BrowserCall::Navigate(url.to_string()));
        self.page()?;
        match &self.script.fail_navigation {
            Some(fragment) if url.contains(fragment.as_str()) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "scripted navigation failure".to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn wait_for_selector(&mut self, selector: &str, _timeout: Duration) -> Result<(), BrowserError> {
        self.launcher
            .record(BrowserCall::WaitForSelector(selector.to_string()));
        self.page().map(|_| ())
    }

    fn evaluate(&mut self, _script: &str) -> Result<Value, BrowserError> {
        self.launcher.record(BrowserCall::Evaluate);
        self.page()?;
        if self.script.pending_evaluations > 0 {
            self.script.pending_evaluations -= 1;
            return Ok(Value::Null);
        }
        Ok(self.script.dimensions.clone().unwrap_or(Value::Null))
    }

    fn screenshot(&mut self) -> Result<Vec<u8>, BrowserError> {
        let viewport = self.page()?;
        self.launcher.record(BrowserCall::Screenshot(viewport));
        let mut bytes = Cursor::new(Vec::new());
        image::RgbaImage::new(viewport.width, viewport.height)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .map_err(|err| BrowserError::Protocol(err.to_string()))?;
        Ok(bytes.into_inner())
    }

    fn close_page(&mut self) -> Result<(), BrowserError> {
        self.launcher.record(BrowserCall::ClosePage);
        self.page = None;
        Ok(())
    }

    fn release(self: Box<Self>) -> Result<(), BrowserError> {
        self.launcher.record(BrowserCall::Release);
        Ok(())
    }
}

/// A [`RegenerationQueue`] that only records what it is given.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    jobs: Mutex<Vec<RegenerationJob>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<RegenerationJob> {
        self.jobs.lock().map(|jobs| jobs.clone()).unwrap_or_default()
    }

    /// Removes and returns the recorded jobs.
    pub fn take(&self) -> Vec<RegenerationJob> {
        self.jobs
            .lock()
            .map(|mut jobs| std::mem::take(&mut *jobs))
            .unwrap_or_default()
    }
}

impl RegenerationQueue for RecordingQueue {
    fn dispatch(&self, job: RegenerationJob) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.push(job);
        }
    }
}
