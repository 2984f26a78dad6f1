//! CLI subcommands for inspecting the browser setup.

use {anyhow::Result, clap::Subcommand};

use {
    wayfinder_browser::{LaunchOptions, detect_browser},
    wayfinder_config::WayfinderConfig,
};

#[derive(Subcommand)]
pub enum BrowserAction {
    /// Show launch settings and which browser binary would be used.
    Status,
}

pub fn handle_browser(action: &BrowserAction, config: &WayfinderConfig) -> Result<()> {
    match action {
        BrowserAction::Status => status(config),
    }
}

fn status(config: &WayfinderConfig) -> Result<()> {
    let options = LaunchOptions::from(&config.browser);

    println!("Browser configuration:");
    println!("  headless:       {}", options.headless);
    println!(
        "  viewport:       {}x{}",
        options.viewport_width, options.viewport_height
    );
    println!(
        "  nav timeout:    {}ms",
        options.navigation_timeout.as_millis()
    );
    match &options.chrome_path {
        Some(path) => println!("  chrome_path:    {path}"),
        None => println!("  chrome_path:    (auto-detect)"),
    }
    if !options.chrome_args.is_empty() {
        println!("  chrome_args:    {:?}", options.chrome_args);
    }

    let detection = detect_browser(options.chrome_path.as_deref());
    match &detection.path {
        Some(path) => println!("\nUsing: {}", path.display()),
        None => {
            println!("\nNo browser found.\n\n{}", detection.install_hint);
            anyhow::bail!("no Chromium-based browser available");
        },
    }
    Ok(())
}
