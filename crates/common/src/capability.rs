//! Seams between the session core and the external systems it drives.
//!
//! The session crate only ever sees these traits; concrete adapters live in
//! `wayfinder-browser` and `wayfinder-generator`, and tests plug in fakes.

use async_trait::async_trait;

use crate::{
    Result,
    types::{BrowserState, GeneratorRequest, ScrollDirection},
};

/// Allocates a browser handle for one session.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserCapability>>;
}

/// Primitive operations on one exclusively-owned page.
///
/// Implementations are not expected to be reentrant; callers serialize
/// access.
#[async_trait]
pub trait BrowserCapability: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    async fn click_selector(&mut self, selector: &str) -> Result<()>;

    async fn click_at(&mut self, x: f64, y: f64) -> Result<()>;

    async fn type_text(&mut self, selector: &str, text: &str, press_enter: bool) -> Result<()>;

    async fn scroll(&mut self, direction: ScrollDirection, amount: u32) -> Result<()>;

    /// Text content of the first element matching `selector`, `None` when
    /// nothing matches.
    async fn extract_text(&mut self, selector: &str) -> Result<Option<String>>;

    async fn go_back(&mut self) -> Result<()>;

    async fn go_forward(&mut self) -> Result<()>;

    async fn snapshot(&mut self) -> Result<BrowserState>;

    /// Release the page. Calling it more than once must be harmless.
    async fn close(&mut self) -> Result<()>;
}

/// Text-generation backend: prompt in, raw text out.
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: GeneratorRequest) -> Result<String>;
}
