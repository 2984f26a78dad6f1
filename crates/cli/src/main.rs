mod browser_commands;
mod config_commands;

use std::{io::Read, path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    wayfinder_browser::{ChromeLauncher, LaunchOptions, check_and_warn},
    wayfinder_config::{Severity, WayfinderConfig},
    wayfinder_generator::OpenAiGenerator,
    wayfinder_session::{Capabilities, extract_command},
};

#[derive(Parser)]
#[command(
    name = "wayfinder",
    version,
    about = "Wayfinder: drive a browser with natural-language instructions"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./wayfinder.toml and the user
    /// config directory).
    #[arg(long, global = true, env = "WAYFINDER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Serve,
    /// Derive a browser command from generator-style text and print it as
    /// JSON (`null` when nothing can be derived).
    Extract {
        /// Text to parse; read from stdin when omitted.
        text: Option<String>,
    },
    /// Configuration inspection.
    Config {
        #[command(subcommand)]
        action: Option<config_commands::ConfigAction>,
    },
    /// Browser detection and launch settings.
    Browser {
        #[command(subcommand)]
        action: browser_commands::BrowserAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Load the config and apply command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<WayfinderConfig> {
    let mut config = wayfinder_config::discover_and_load(cli.config.as_deref())?;
    apply_overrides(&mut config, cli);
    Ok(config)
}

fn apply_overrides(config: &mut WayfinderConfig, cli: &Cli) {
    if let Some(bind) = &cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
}

async fn serve(config: WayfinderConfig) -> anyhow::Result<()> {
    let diagnostics = wayfinder_config::validate(&config);
    for d in &diagnostics {
        match d.severity {
            Severity::Error => error!(path = d.path, "{}", d.message),
            Severity::Warning => warn!(path = d.path, "{}", d.message),
        }
    }
    if wayfinder_config::has_errors(&diagnostics) {
        anyhow::bail!("configuration has errors; run `wayfinder config check` for details");
    }

    check_and_warn(config.browser.chrome_path.as_deref());

    let generator = OpenAiGenerator::new(&config.generator).context("building generator")?;
    if !generator.has_api_key() {
        warn!("no generator API key; instructions will fail until one is configured");
    }
    let capabilities = Capabilities {
        launcher: Arc::new(ChromeLauncher::new(LaunchOptions::from(&config.browser))),
        generator: Arc::new(generator),
    };

    wayfinder_gateway::start(&config, capabilities).await
}

fn extract(text: Option<String>) -> anyhow::Result<()> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            buf
        },
    };
    let command = extract_command(&text);
    println!("{}", serde_json::to_string_pretty(&command)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    match &cli.command {
        None | Some(Commands::Serve) => {
            info!(version = env!("CARGO_PKG_VERSION"), "wayfinder starting");
            serve(load_config(&cli)?).await
        },
        Some(Commands::Extract { text }) => extract(text.clone()),
        Some(Commands::Config { action }) => {
            let config = load_config(&cli)?;
            config_commands::handle_config(action.as_ref(), &config, cli.config.as_deref())
        },
        Some(Commands::Browser { action }) => {
            browser_commands::handle_browser(action, &load_config(&cli)?)
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["wayfinder"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
        assert!(!cli.json_logs);
    }

    #[test]
    fn flags_override_config() {
        let cli =
            Cli::try_parse_from(["wayfinder", "serve", "--bind", "0.0.0.0", "--port", "8080"])
                .unwrap();
        let mut config = WayfinderConfig::default();
        apply_overrides(&mut config, &cli);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn absent_flags_keep_config_values() {
        let cli = Cli::try_parse_from(["wayfinder"]).unwrap();
        let mut config = WayfinderConfig::default();
        config.server.port = 4100;
        apply_overrides(&mut config, &cli);
        assert_eq!(config.server.port, 4100);
        assert_eq!(config.server.bind, "127.0.0.1");
    }

    #[test]
    fn extract_takes_positional_text() {
        let cli = Cli::try_parse_from(["wayfinder", "extract", "open example.com"]).unwrap();
        match cli.command {
            Some(Commands::Extract { text }) => {
                assert_eq!(text.as_deref(), Some("open example.com"));
            },
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn config_subcommand_is_optional() {
        let cli = Cli::try_parse_from(["wayfinder", "config"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Config { action: None })));
    }
}
