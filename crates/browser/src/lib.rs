//! Browser capability over the Chrome DevTools Protocol.
//!
//! [`ChromeLauncher`] starts one headless Chromium-family process per
//! session, with its own temporary profile, and hands back a
//! [`ChromeSession`] that implements the page primitives (navigate, click,
//! type, scroll, extract, history, snapshot).

pub mod chrome;
pub mod detect;
pub mod error;
pub mod options;

pub use {
    chrome::{ChromeLauncher, ChromeSession},
    detect::{check_and_warn, detect_browser},
    error::BrowserError,
    options::LaunchOptions,
};
