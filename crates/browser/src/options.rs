use std::{path::Path, time::Duration};

use chromiumoxide::{BrowserConfig as CdpBrowserConfig, handler::viewport::Viewport};

use crate::error::BrowserError;

/// Flags every launch gets on top of the configured ones.
const BASE_ARGS: &[&str] = &[
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-software-rasterizer",
    "--no-first-run",
    "--no-default-browser-check",
];

/// How to start one browser process.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOptions {
    pub chrome_path: Option<String>,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub navigation_timeout: Duration,
    pub chrome_args: Vec<String>,
}

impl From<&wayfinder_config::BrowserConfig> for LaunchOptions {
    fn from(cfg: &wayfinder_config::BrowserConfig) -> Self {
        Self {
            chrome_path: cfg
                .chrome_path
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            headless: cfg.headless,
            viewport_width: cfg.viewport_width,
            viewport_height: cfg.viewport_height,
            navigation_timeout: Duration::from_millis(cfg.navigation_timeout_ms),
            chrome_args: cfg.chrome_args.clone(),
        }
    }
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self::from(&wayfinder_config::BrowserConfig::default())
    }
}

impl LaunchOptions {
    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.viewport_width,
            height: self.viewport_height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: self.viewport_width >= self.viewport_height,
            has_touch: false,
        }
    }

    /// Command-line flags in launch order: base flags, then configured ones.
    pub fn args(&self) -> Vec<String> {
        BASE_ARGS
            .iter()
            .map(|a| (*a).to_string())
            .chain(self.chrome_args.iter().cloned())
            .collect()
    }

    pub(crate) fn cdp_config(
        &self,
        executable: &Path,
        profile_dir: &Path,
    ) -> Result<CdpBrowserConfig, BrowserError> {
        let mut builder = CdpBrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(profile_dir)
            .viewport(self.viewport())
            .window_size(self.viewport_width, self.viewport_height)
            .request_timeout(self.navigation_timeout);

        // chromiumoxide is headless unless told otherwise.
        if !self.headless {
            builder = builder.with_head();
        }
        for arg in self.args() {
            builder = builder.arg(arg);
        }

        builder
            .build()
            .map_err(|e| BrowserError::LaunchFailed(format!("invalid browser config: {e}")))
    }
}
