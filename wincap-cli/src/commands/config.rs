//! Config command - where recordings go and what format they use

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use wincap_core::config::{sample_config, ConfigFile};

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print where the settings file lives
    Path,

    /// Print the recording folder, loopback format and MP4 quality in effect
    Show,

    /// Write the default recording settings to the settings file
    Init {
        /// Replace an existing settings file
        #[arg(short, long)]
        force: bool,
    },

    /// Print an annotated settings file
    Sample,

    /// Remember the folder recordings are saved under
    SetSavePath {
        /// Root folder; each captured window gets a subfolder
        path: PathBuf,
    },
}

/// Run config subcommand
pub async fn config(args: ConfigArgs) -> Result<()> {
    let path = ConfigFile::default_path();
    match args.command {
        ConfigCommand::Path => {
            let state = if path.exists() { "present" } else { "not created yet" };
            println!("{} ({})", path.display(), state);
        }
        ConfigCommand::Show => {
            if !path.exists() {
                println!("{} not found, recording with built-in defaults.", path.display());
                println!("Run `wincap config init` to write an editable copy.");
                return Ok(());
            }

            let file = ConfigFile::load_from(path.clone()).context("Failed to load config file")?;
            let capture = file
                .to_capture_config()
                .context("Configuration file has invalid settings")?;

            println!("Recording settings from {}
", path.display());
            println!("  Recordings:   {}", capture.save_dir.join("<window>").display());
            println!(
                "  Loopback:     {} Hz, {} ch, {}-bit PCM",
                capture.sample_rate, capture.channels, capture.bits_per_sample
            );
            match capture.quality.resolution() {
                Some(size) => println!("  MP4 quality:  {} ({})", capture.quality, size),
                None => println!("  MP4 quality:  {} (window size)", capture.quality),
            }
        }
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists; pass --force to replace it",
                    path.display()
                );
            }

            let defaults = ConfigFile::default();
            defaults.save_to(path.clone()).context("Failed to write config file")?;
            println!("Wrote default recording settings to {}", path.display());
            println!(
                "Recordings will go under {}",
                defaults.recording.video_save_path.display()
            );
        }
        ConfigCommand::Sample => {
            print!("{}", sample_config());
        }
        ConfigCommand::SetSavePath { path: save_path } => {
            let mut file = ConfigFile::load_from(path.clone()).context("Failed to load config file")?;
            file.set_video_save_path(&save_path);
            file.to_capture_config()
                .context("Configuration file has invalid settings")?;
            file.save_to(path).context("Failed to save config file")?;
            println!("Recordings will be saved under: {}", save_path.display());
        }
    }

    Ok(())
}
