use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::WayfinderConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "wayfinder.toml",
    "wayfinder.yaml",
    "wayfinder.yml",
    "wayfinder.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<WayfinderConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Load config from `explicit` when given, otherwise from the standard
/// locations.
///
/// Search order:
/// 1. `./wayfinder.{toml,yaml,yml,json}` (project-local)
/// 2. `<user config dir>/wayfinder/wayfinder.{toml,yaml,yml,json}`
///
/// A discovered file that fails to load is logged and defaults are used. An
/// explicit path that fails to load is an error.
pub fn discover_and_load(explicit: Option<&Path>) -> anyhow::Result<WayfinderConfig> {
    if let Some(path) = explicit {
        debug!(path = %path.display(), "loading config");
        return load_config(path);
    }

    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return Ok(cfg),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    Ok(WayfinderConfig::default())
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists());
    if local.is_some() {
        return local;
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// The user-global config directory.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "wayfinder").map(|d| d.config_dir().to_path_buf())
}

/// Render the effective config as TOML with secrets masked.
pub fn render_redacted(config: &WayfinderConfig) -> anyhow::Result<String> {
    let mut shown = config.clone();
    if shown.generator.api_key.is_some() {
        shown.generator.api_key = Some(Secret::new("[REDACTED]".into()));
    }
    toml::to_string_pretty(&shown).map_err(|e| anyhow::anyhow!("serialize config: {e}"))
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<WayfinderConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
