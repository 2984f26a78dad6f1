//! Configuration loading, env substitution, and validation.
//!
//! Config files: `wayfinder.toml`, `wayfinder.yaml`, `wayfinder.yml` or
//! `wayfinder.json`, searched in `./` then the user config directory.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in all string
//! values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{config_dir, discover_and_load, find_config_file, load_config, render_redacted},
    schema::{BrowserConfig, GeneratorConfig, ServerConfig, SessionConfig, WayfinderConfig},
    validate::{Diagnostic, Severity, has_errors, validate},
};
