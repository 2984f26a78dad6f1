//! Locating a Chromium-family executable.

use std::path::{Path, PathBuf};

/// Executable names searched on `PATH`. Every one of them speaks CDP.
const CHROMIUM_EXECUTABLES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "chromium",
    "chromium-browser",
    "microsoft-edge",
    "microsoft-edge-stable",
    "msedge",
    "brave-browser",
    "brave",
];

#[cfg(target_os = "macos")]
const PLATFORM_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
];

#[cfg(target_os = "windows")]
const PLATFORM_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const PLATFORM_PATHS: &[&str] = &[];

/// Environment variable naming an explicit browser binary.
pub const CHROME_ENV: &str = "CHROME";

#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub path: Option<PathBuf>,
    /// Install guidance; empty when a browser was found.
    pub install_hint: String,
}

impl DetectionResult {
    pub fn found(&self) -> bool {
        self.path.is_some()
    }

    fn at(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            install_hint: String::new(),
        }
    }
}

/// Find a browser. Order: configured path, `$CHROME`, platform install
/// locations, then `PATH`. An empty configured path counts as unset.
pub fn detect_browser(custom_path: Option<&str>) -> DetectionResult {
    detect_with(custom_path, std::env::var(CHROME_ENV).ok().as_deref())
}

fn detect_with(custom_path: Option<&str>, env_path: Option<&str>) -> DetectionResult {
    let explicit = [custom_path, env_path]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .chain(PLATFORM_PATHS.iter().map(PathBuf::from));

    for candidate in explicit {
        if is_file(&candidate) {
            return DetectionResult::at(candidate);
        }
    }

    // PATH last: it can hold stale wrapper scripts.
    for name in CHROMIUM_EXECUTABLES {
        if let Ok(path) = which::which(name) {
            return DetectionResult::at(path);
        }
    }

    DetectionResult {
        path: None,
        install_hint: install_instructions(),
    }
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

/// Platform-specific install guidance.
pub fn install_instructions() -> String {
    let instructions = if cfg!(target_os = "macos") {
        "  brew install --cask google-chrome"
    } else if cfg!(target_os = "windows") {
        "  winget install Google.Chrome"
    } else if cfg!(target_os = "linux") {
        "  Debian/Ubuntu: sudo apt install chromium\n  \
         Fedora:        sudo dnf install chromium\n  \
         Arch:          sudo pacman -S chromium"
    } else {
        "  Download from https://www.google.com/chrome/"
    };

    format!(
        "Install Chrome or Chromium:\n\n{instructions}\n\n\
         Or point Wayfinder at an existing binary:\n  \
         [browser]\n  \
         chrome_path = \"/path/to/chrome\"\n\n\
         or set the {CHROME_ENV} environment variable."
    )
}

/// Log whether a browser is available. Called once at startup so a missing
/// browser shows up before the first session tries to launch one.
pub fn check_and_warn(custom_path: Option<&str>) -> bool {
    let result = detect_browser(custom_path);
    match &result.path {
        Some(path) => tracing::info!(path = %path.display(), "browser detected"),
        None => tracing::warn!(
            "no Chromium-based browser found; sessions will fail to initialize\n{}",
            result.install_hint
        ),
    }
    result.found()
}
