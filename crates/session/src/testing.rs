//! In-memory capabilities shared by the unit tests.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    wayfinder_common::{
        BrowserCapability, BrowserLauncher, BrowserState, Error, Generator, GeneratorRequest,
        Result, ScrollDirection,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Navigate(String),
    ClickSelector(String),
    ClickAt(f64, f64),
    Type {
        selector: String,
        text: String,
        press_enter: bool,
    },
    Scroll(ScrollDirection, u32),
    Extract(String),
    Back,
    Forward,
    Snapshot,
    Close,
}

#[derive(Default)]
struct RecorderInner {
    calls: Mutex<Vec<Call>>,
    navigate_delay: Mutex<Duration>,
    launches: AtomicUsize,
    fail_launch: AtomicBool,
}

/// Shared view into every fake browser it hands out.
#[derive(Clone, Default)]
pub struct BrowserRecorder {
    inner: Arc<RecorderInner>,
}

impl BrowserRecorder {
    pub fn browser(&self) -> Box<dyn BrowserCapability> {
        Box::new(FakeBrowser {
            recorder: self.clone(),
            back: Vec::new(),
            forward: Vec::new(),
            url: None,
        })
    }

    pub fn launcher(&self) -> Arc<dyn BrowserLauncher> {
        Arc::new(FakeLauncher {
            recorder: self.clone(),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    /// Calls other than snapshots.
    pub fn actions(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| *c != Call::Snapshot)
            .collect()
    }

    pub fn launches(&self) -> usize {
        self.inner.launches.load(Ordering::SeqCst)
    }

    pub fn set_navigate_delay(&self, delay: Duration) {
        *self.inner.navigate_delay.lock().unwrap() = delay;
    }

    pub fn fail_launches(&self) {
        self.inner.fail_launch.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        self.inner.calls.lock().unwrap().push(call);
    }
}

struct FakeLauncher {
    recorder: BrowserRecorder,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserCapability>> {
        if self.recorder.inner.fail_launch.load(Ordering::SeqCst) {
            return Err(Error::unavailable("browser", "no executable found"));
        }
        self.recorder.inner.launches.fetch_add(1, Ordering::SeqCst);
        Ok(self.recorder.browser())
    }
}

/// Records every call; `#missing` selectors fail.
struct FakeBrowser {
    recorder: BrowserRecorder,
    back: Vec<String>,
    forward: Vec<String>,
    url: Option<String>,
}

#[async_trait]
impl BrowserCapability for FakeBrowser {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.recorder.record(Call::Navigate(url.to_string()));
        let delay = *self.recorder.inner.navigate_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(previous) = self.url.replace(url.to_string()) {
            self.back.push(previous);
        }
        self.forward.clear();
        Ok(())
    }

    async fn click_selector(&mut self, selector: &str) -> Result<()> {
        self.recorder.record(Call::ClickSelector(selector.to_string()));
        if selector == "#missing" {
            return Err(Error::message(format!("no element matches {selector}")));
        }
        Ok(())
    }

    async fn click_at(&mut self, x: f64, y: f64) -> Result<()> {
        self.recorder.record(Call::ClickAt(x, y));
        Ok(())
    }

    async fn type_text(&mut self, selector: &str, text: &str, press_enter: bool) -> Result<()> {
        self.recorder.record(Call::Type {
            selector: selector.to_string(),
            text: text.to_string(),
            press_enter,
        });
        Ok(())
    }

    async fn scroll(&mut self, direction: ScrollDirection, amount: u32) -> Result<()> {
        self.recorder.record(Call::Scroll(direction, amount));
        Ok(())
    }

    async fn extract_text(&mut self, selector: &str) -> Result<Option<String>> {
        self.recorder.record(Call::Extract(selector.to_string()));
        Ok(Some(format!("text of {selector}")))
    }

    async fn go_back(&mut self) -> Result<()> {
        self.recorder.record(Call::Back);
        if let Some(previous) = self.back.pop()
            && let Some(current) = self.url.replace(previous)
        {
            self.forward.push(current);
        }
        Ok(())
    }

    async fn go_forward(&mut self) -> Result<()> {
        self.recorder.record(Call::Forward);
        if let Some(next) = self.forward.pop()
            && let Some(current) = self.url.replace(next)
        {
            self.back.push(current);
        }
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<BrowserState> {
        self.recorder.record(Call::Snapshot);
        Ok(BrowserState {
            url: self.url.clone(),
            title: self.url.as_ref().map(|u| format!("Title of {u}")),
            screenshot: Some("iVBORw0KGgo=".into()),
            content: Some("<html></html>".into()),
            error: None,
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.recorder.record(Call::Close);
        Ok(())
    }
}

/// Generator answering from a queue of scripted responses.
#[derive(Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<GeneratorRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(text.into()));
    }

    pub fn fail(&self, message: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Err(message.into()));
    }

    pub fn requests(&self) -> Vec<GeneratorRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: GeneratorRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request);
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(Error::unavailable("generator", message)),
            None => Err(Error::message("no scripted response left")),
        }
    }
}

/// Fenced JSON reply for a navigate command.
pub fn navigate_reply(url: &str) -> String {
    format!(
        "I'll open the site.\n```json\n{{\"action\": \"navigate\", \"params\": {{\"url\": \"{url}\"}}, \"reasoning\": \"the user asked for it\"}}\n```"
    )
}
