//! # Queue Configuration Validator
//!
//! Loads the layered queue configuration for an environment, validates it, and prints
//! the result with secrets masked. Exits non-zero when the configuration is invalid.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tasker_queue::config::{ConfigManager, QueueConfig};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate tasker-queue configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the configuration
    Validate,

    /// Print the merged configuration as JSON, secrets masked
    Show,

    /// Print the built-in defaults
    Defaults,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match cli.command {
        Some(Commands::Show) => show_config(&cli),
        Some(Commands::Defaults) => show_defaults(),
        Some(Commands::Validate) | None => validate_config(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration check completed successfully");
        }
        Err(e) => {
            error!("Configuration check failed: {e:#}");
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> anyhow::Result<std::sync::Arc<ConfigManager>> {
    ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
        .with_context(|| format!("loading configuration for '{}'", cli.environment))
}

fn validate_config(cli: &Cli) -> anyhow::Result<()> {
    println!("🔧 Validating tasker-queue configuration");
    println!("Environment: {}", cli.environment);

    let manager = load(cli)?;
    let config = manager.config();

    println!("Config Directory: {}", manager.config_directory().display());
    println!();
    println!(
        "✅ heartbeat: every {}ms, dead after {} misses",
        config.heartbeat.interval_ms, config.heartbeat.miss_threshold
    );
    println!(
        "✅ dispatch: {} attempts, {}ms backoff",
        config.dispatch.max_attempts, config.dispatch.backoff_ms
    );
    println!(
        "✅ persistence: {} attempts, {}ms backoff",
        config.persistence.max_attempts, config.persistence.backoff_ms
    );
    println!(
        "✅ notification: unbounded, {}ms backoff",
        config.notification.backoff_ms
    );
    println!("✅ state store: {}", config.state_store.backend);

    println!("\n🎉 Configuration is valid");
    Ok(())
}

fn show_config(cli: &Cli) -> anyhow::Result<()> {
    let manager = load(cli)?;
    println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
    Ok(())
}

fn show_defaults() -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&QueueConfig::default())?
    );
    Ok(())
}
