use std::path::Path;

use {anyhow::Result, clap::Subcommand};

use wayfinder_config::{Diagnostic, Severity, WayfinderConfig, find_config_file};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML, secrets redacted (default).
    Show,
    /// Validate the configuration and report errors/warnings.
    Check,
}

pub fn handle_config(
    action: Option<&ConfigAction>,
    config: &WayfinderConfig,
    explicit: Option<&Path>,
) -> Result<()> {
    match action {
        None | Some(ConfigAction::Show) => show(config),
        Some(ConfigAction::Check) => check(config, explicit),
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn show(config: &WayfinderConfig) -> Result<()> {
    print!("{}", wayfinder_config::render_redacted(config)?);
    Ok(())
}

fn check(config: &WayfinderConfig, explicit: Option<&Path>) -> Result<()> {
    match explicit.map(Path::to_path_buf).or_else(find_config_file) {
        Some(path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("No config file found; checking defaults.\n"),
    }

    let diagnostics = wayfinder_config::validate(config);
    for d in &diagnostics {
        eprintln!("  {}", format_diagnostic(d));
    }

    let errors = count(&diagnostics, Severity::Error);
    let warnings = count(&diagnostics, Severity::Warning);

    if !diagnostics.is_empty() {
        eprintln!();
    }

    if diagnostics.is_empty() {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        anyhow::bail!("configuration is invalid");
    }
    Ok(())
}

fn format_diagnostic(d: &Diagnostic) -> String {
    let color = match d.severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
    };
    format!("{BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message)
}

fn count(diagnostics: &[Diagnostic], severity: Severity) -> usize {
    diagnostics.iter().filter(|d| d.severity == severity).count()
}
