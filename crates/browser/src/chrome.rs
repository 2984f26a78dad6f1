//! Chrome over CDP: one process and one page per session.

use std::time::Duration;

use {
    async_trait::async_trait,
    base64::{Engine, engine::general_purpose::STANDARD as BASE64},
    chromiumoxide::{
        Browser, Page,
        cdp::browser_protocol::{
            emulation::SetDeviceMetricsOverrideParams,
            input::{DispatchMouseEventParams, DispatchMouseEventType, MouseButton},
            page::CaptureScreenshotFormat,
        },
        page::ScreenshotParams,
    },
    futures::StreamExt,
    serde_json::Value,
    tempfile::TempDir,
    tokio::{task::JoinHandle, time::timeout},
    tracing::{debug, info, warn},
    wayfinder_common::{BrowserCapability, BrowserLauncher, BrowserState, ScrollDirection},
};

use crate::{detect::detect_browser, error::BrowserError, options::LaunchOptions};

/// Pause after clicks and Enter so the page can react before the snapshot.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// History navigation may not load anything (nothing to go back to), so the
/// wait for it is short and its expiry is not an error.
const HISTORY_WAIT: Duration = Duration::from_secs(5);

type BrowserResult<T> = Result<T, BrowserError>;

/// Starts a fresh Chrome process for every session.
#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher {
    options: LaunchOptions,
}

impl ChromeLauncher {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }

    async fn start(&self) -> BrowserResult<ChromeSession> {
        let detection = detect_browser(self.options.chrome_path.as_deref());
        let Some(executable) = detection.path else {
            return Err(BrowserError::NotFound {
                hint: detection.install_hint,
            });
        };

        // Private profile so concurrent sessions never share cookies or locks.
        let profile = tempfile::Builder::new()
            .prefix("wayfinder-profile-")
            .tempdir()
            .map_err(|e| BrowserError::LaunchFailed(format!("profile directory: {e}")))?;

        let config = self.options.cdp_config(&executable, profile.path())?;
        info!(
            executable = %executable.display(),
            headless = self.options.headless,
            viewport_width = self.options.viewport_width,
            viewport_height = self.options.viewport_height,
            "launching browser"
        );

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
            debug!("browser event handler exited");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                events.abort();
                return Err(BrowserError::LaunchFailed(format!("opening page: {e}")));
            },
        };

        // The launch viewport is not always applied to new pages.
        match SetDeviceMetricsOverrideParams::builder()
            .width(self.options.viewport_width)
            .height(self.options.viewport_height)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
        {
            Ok(cmd) => {
                if let Err(e) = page.execute(cmd).await {
                    warn!(error = %e, "failed to set page viewport");
                }
            },
            Err(e) => warn!(error = %e, "invalid viewport override"),
        }

        Ok(ChromeSession {
            browser: Some(browser),
            page: Some(page),
            events,
            _profile: profile,
        })
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> wayfinder_common::Result<Box<dyn BrowserCapability>> {
        let session = self.start().await?;
        Ok(Box::new(session))
    }
}

/// A live browser owned by exactly one session.
pub struct ChromeSession {
    browser: Option<Browser>,
    page: Option<Page>,
    events: JoinHandle<()>,
    _profile: TempDir,
}

impl ChromeSession {
    fn page(&self) -> BrowserResult<&Page> {
        self.page.as_ref().ok_or(BrowserError::Closed)
    }

    async fn eval(&self, script: &str) -> BrowserResult<Option<Value>> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::JsEvalFailed(e.to_string()))?;
        Ok(result.value().cloned())
    }

    async fn history_step(&self, script: &str) -> BrowserResult<()> {
        self.eval(script).await?;
        let page = self.page()?;
        if timeout(HISTORY_WAIT, page.wait_for_navigation()).await.is_err() {
            debug!(script, "no navigation followed history step");
        }
        Ok(())
    }

    async fn mouse(&self, kind: DispatchMouseEventType, x: f64, y: f64) -> BrowserResult<()> {
        let cmd = DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(x)
            .y(y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(BrowserError::Cdp)?;
        self.page()?.execute(cmd).await?;
        Ok(())
    }

    async fn state(&self) -> BrowserResult<BrowserState> {
        let page = self.page()?;
        let url = page.url().await?;
        let title = page.get_title().await?;
        let screenshot = page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await
            .map_err(|e| BrowserError::ScreenshotFailed(e.to_string()))?;
        let content = page.content().await?;

        Ok(BrowserState {
            url,
            title,
            screenshot: Some(BASE64.encode(screenshot)),
            content: Some(content),
            error: None,
        })
    }

    async fn shutdown(&mut self) -> BrowserResult<()> {
        let page = self.page.take();
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };
        if let Some(page) = page
            && let Err(e) = page.close().await
        {
            debug!(error = %e, "page close failed");
        }
        let closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            debug!(error = %e, "waiting for browser exit failed");
        }
        self.events.abort();
        info!("browser closed");
        closed.map(|_| ()).map_err(Into::into)
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.events.abort();
    }
}

/// JS string literal for `value`.
fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

#[async_trait]
impl BrowserCapability for ChromeSession {
    async fn navigate(&mut self, url: &str) -> wayfinder_common::Result<()> {
        let page = self.page()?;
        page.goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        debug!(url, "navigated");
        Ok(())
    }

    async fn click_selector(&mut self, selector: &str) -> wayfinder_common::Result<()> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        element.click().await.map_err(BrowserError::from)?;
        tokio::time::sleep(SETTLE_DELAY).await;
        debug!(selector, "clicked element");
        Ok(())
    }

    async fn click_at(&mut self, x: f64, y: f64) -> wayfinder_common::Result<()> {
        self.mouse(DispatchMouseEventType::MousePressed, x, y).await?;
        self.mouse(DispatchMouseEventType::MouseReleased, x, y)
            .await?;
        tokio::time::sleep(SETTLE_DELAY).await;
        debug!(x, y, "clicked point");
        Ok(())
    }

    async fn type_text(
        &mut self,
        selector: &str,
        text: &str,
        press_enter: bool,
    ) -> wayfinder_common::Result<()> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        element.click().await.map_err(BrowserError::from)?;
        // Replace, don't append.
        element
            .call_js_fn("function() { if ('value' in this) { this.value = ''; } }", false)
            .await
            .map_err(BrowserError::from)?;
        element.type_str(text).await.map_err(BrowserError::from)?;
        if press_enter {
            element
                .press_key("Enter")
                .await
                .map_err(BrowserError::from)?;
            tokio::time::sleep(SETTLE_DELAY).await;
        }
        debug!(selector, chars = text.chars().count(), press_enter, "typed text");
        Ok(())
    }

    async fn scroll(
        &mut self,
        direction: ScrollDirection,
        amount: u32,
    ) -> wayfinder_common::Result<()> {
        let (dx, dy) = direction.offsets(amount);
        self.eval(&format!("window.scrollBy({dx}, {dy}); true"))
            .await?;
        debug!(dx, dy, "scrolled");
        Ok(())
    }

    async fn extract_text(&mut self, selector: &str) -> wayfinder_common::Result<Option<String>> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.textContent : null; }})()",
            js_string(selector)
        );
        let value = self.eval(&script).await?;
        Ok(value.as_ref().and_then(Value::as_str).map(str::to_string))
    }

    async fn go_back(&mut self) -> wayfinder_common::Result<()> {
        Ok(self.history_step("history.back()").await?)
    }

    async fn go_forward(&mut self) -> wayfinder_common::Result<()> {
        Ok(self.history_step("history.forward()").await?)
    }

    async fn snapshot(&mut self) -> wayfinder_common::Result<BrowserState> {
        Ok(self.state().await?)
    }

    async fn close(&mut self) -> wayfinder_common::Result<()> {
        Ok(self.shutdown().await?)
    }
}
