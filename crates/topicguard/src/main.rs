//! topicguard - credential administration for the MQTT broker authorizer

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod config;

use commands::Command;
use config::{Config, LoggingConfig};
use topicguard_core::CredentialStore;

/// topicguard - manage users and topic permissions for the broker
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Credentials file, overriding the configuration
    #[arg(long, env = "TOPICGUARD_CREDENTIALS")]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(credentials) = args.credentials {
        config.authorizer.credentials = credentials;
    }

    init_logging(&config.logging);

    debug!("topicguard v{}", env!("CARGO_PKG_VERSION"));
    match &config.source {
        Some(path) => info!("Loaded configuration from {:?}", path),
        None => debug!("No configuration file at {}, using defaults", args.config),
    }
    info!("Credentials file: {:?}", config.authorizer.credentials);

    let store = CredentialStore::new(config.authorizer);
    let output = commands::run(args.command, &store).await?;
    println!("{}", output);

    Ok(())
}

/// Initialize logging
///
/// Logs go to stderr so command output on stdout stays scriptable.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
