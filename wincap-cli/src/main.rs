//! wincap CLI
//!
//! Window capture with loopback audio.
//!
//! # Usage
//!
//! ```bash
//! # Drive the full pipeline with a synthetic window for five seconds
//! wincap simulate --seconds 5 --resize-to 1600x900
//!
//! # Create a config file
//! wincap config init
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use wincap_core::WincapError;

/// wincap - single-window capture with loopback audio
#[derive(Parser)]
#[command(name = "wincap")]
#[command(version)]
#[command(about = "Single-window capture with loopback audio and live preview", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the capture pipeline against synthetic window and loopback sources
    #[command(alias = "sim")]
    Simulate(commands::SimulateArgs),

    /// Manage the configuration file
    Config(commands::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("wincap_core={}", level).parse()?)
                .add_directive(format!("wincap={}", level).parse()?),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Simulate(args) => commands::simulate(args).await,
        Commands::Config(args) => commands::config(args).await,
    };

    if let Err(e) = &result {
        if let Some(hint) = e.downcast_ref::<WincapError>().and_then(WincapError::user_hint) {
            eprintln!("hint: {}", hint);
        }
    }
    result
}
