//! # profile-fetch
//!
//! CLI tool for resolving Nostr profiles from relays.
//!
//! ## Commands
//!
//! - `fetch`: Resolve profiles for one or more public keys
//! - `relays`: Show the relay list in priority order
//!
//! ## Example
//!
//! ```bash
//! # Resolve two profiles from the default relays
//! profile-fetch fetch <hex-pubkey> <hex-pubkey>
//!
//! # Use a config file and print raw profiles
//! profile-fetch --config resolver.toml fetch --json <hex-pubkey>
//!
//! # Try a specific relay list
//! profile-fetch --relay wss://relay.damus.io --relay wss://nos.lol relays
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use profile_client::ResolverConfig;
use std::path::PathBuf;

mod commands;

use commands::{fetch, relays};

/// CLI tool for resolving Nostr profiles from relays.
#[derive(Parser, Debug)]
#[command(name = "profile-fetch")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Resolver configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Relay URL; repeat for a priority list (replaces configured relays)
    #[arg(long = "relay", global = true)]
    relays: Vec<String>,

    /// Seconds to wait for each relay to answer
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Use mock relays instead of the network (for testing/demo)
    #[arg(long, global = true)]
    mock: bool,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve profiles for public keys
    Fetch {
        /// Public keys (64 hex characters)
        #[arg(required = true)]
        pubkeys: Vec<String>,

        /// Print resolved profiles as a JSON object
        #[arg(long)]
        json: bool,
    },

    /// Show the relay list in priority order
    Relays,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Fetch { pubkeys, json } => {
            fetch::run(config, &pubkeys, json, cli.mock).await?;
        }
        Commands::Relays => {
            relays::run(&config);
        }
    }

    Ok(())
}

/// Log to stderr so stdout carries only results.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file (or defaults), then command-line overrides.
fn load_config(cli: &Cli) -> Result<ResolverConfig> {
    let mut config = match &cli.config {
        Some(path) => ResolverConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ResolverConfig::default(),
    };

    if !cli.relays.is_empty() {
        config = config.with_relays(cli.relays.iter().cloned());
    }
    if let Some(secs) = cli.timeout {
        config = config.with_response_timeout(secs);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}
