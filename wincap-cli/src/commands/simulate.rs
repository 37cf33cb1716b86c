//! Simulate command - run the full pipeline against synthetic sources
//!
//! A test-pattern window and a sine-tone loopback feed a real capture
//! session; a counting engine pulls every sample through the encoder
//! adapter. Nothing is written except the optional JSON report.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use wincap_core::capture::{SyntheticLoopback, SyntheticWindow};
use wincap_core::config::{ConfigFile, VideoQuality};
use wincap_core::encode::{EncoderStats, SampleFeed, StatsEngine, TranscodeStats};
use wincap_core::gpu::{SoftwareDevice, SoftwareTexture};
use wincap_core::{CaptureSession, Encoder, EncodingProfile, SessionStats, Size};

/// Arguments for the simulate command
#[derive(Args)]
pub struct SimulateArgs {
    /// Window width in pixels
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Window height in pixels
    #[arg(long, default_value = "720")]
    height: u32,

    /// Frames per second the window produces
    #[arg(long, default_value = "60")]
    fps: u32,

    /// How long to capture
    #[arg(short, long, default_value = "3")]
    seconds: f64,

    /// Resize the window halfway through (e.g. 1600x900)
    #[arg(long)]
    resize_to: Option<Size>,

    /// Loopback mix rate in Hz
    #[arg(long, default_value = "44100")]
    input_rate: u32,

    /// Output sample rate in Hz (defaults to the config file)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Output bits per sample, 16 or 24 (defaults to the config file)
    #[arg(long)]
    bits: Option<u32>,

    /// Encoder quality preset (defaults to the config file)
    #[arg(short, long)]
    quality: Option<VideoQuality>,

    /// Name of the captured program, used for the recording path
    #[arg(long, default_value = "synthetic")]
    target: String,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Also write the JSON report to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Serialize)]
struct SimulationReport {
    recording_path: PathBuf,
    profile: EncodingProfile,
    session: SessionStats,
    encoder: EncoderStats,
    transcode: TranscodeStats,
}

/// Run a simulated capture
pub async fn simulate(args: SimulateArgs) -> Result<()> {
    let mut config = ConfigFile::load_or_default()
        .to_capture_config()
        .context("Configuration file has invalid settings")?;
    if let Some(rate) = args.sample_rate {
        config = config.with_sample_rate(rate);
    }
    if let Some(bits) = args.bits {
        config = config.with_bits_per_sample(bits);
    }
    if let Some(quality) = args.quality {
        config = config.with_quality(quality);
    }
    config.validate().context("Invalid capture settings")?;

    let size = Size::new(args.width, args.height);
    let duration = Duration::from_secs_f64(args.seconds.max(0.0));
    let mut window = SyntheticWindow::new(size, args.fps);
    if let Some(new_size) = args.resize_to {
        window = window.with_resize(duration / 2, new_size);
    }
    let loopback = SyntheticLoopback::new(args.input_rate, 2);

    let session = Arc::new(
        CaptureSession::new(Arc::new(SoftwareDevice::new()), window, loopback, config.clone())
            .context("Failed to create capture session")?,
    );
    let profile = EncodingProfile::mp4(&config, session.initial_size());
    let feed: Arc<dyn SampleFeed<SoftwareTexture>> = session.clone();
    let encoder = Encoder::new(feed, profile.clone());

    if !args.json {
        println!("wincap - Simulated Capture\n");
        println!("Configuration:");
        println!("  Window:      {} @ {} fps", size, args.fps);
        if let Some(new_size) = args.resize_to {
            println!("  Resize:      {} after {:.1}s", new_size, duration.as_secs_f64() / 2.0);
        }
        println!("  Loopback:    {} Hz float, stereo", args.input_rate);
        println!("  Profile:     {}", profile);
        println!();
        println!("Capturing for {:.1}s (Ctrl+C to stop early)...\n", duration.as_secs_f64());
    }

    session.start().context("Failed to start capture")?;

    let engine = tokio::task::spawn_blocking(move || -> wincap_core::Result<_> {
        let mut engine = StatsEngine::new();
        encoder.encode(&mut engine)?;
        Ok((engine.into_stats(), encoder.stats()))
    });

    tokio::select! {
        _ = tokio::time::sleep(duration) => {
            info!("Simulation time elapsed");
        }
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => println!("\nReceived interrupt signal..."),
                Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
            }
        }
    }

    session.stop();
    let (transcode, encoder_stats) = engine
        .await
        .context("Encoder task panicked")?
        .context("Encoding failed")?;

    let report = SimulationReport {
        recording_path: config.recording_path(&args.target, Local::now()),
        profile,
        session: session.stats(),
        encoder: encoder_stats,
        transcode,
    };

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Capture stopped.\n");
    println!("{}", report.session);
    println!("{}", report.transcode);
    println!(
        "Encoder:     {} video, {} audio samples, {} request errors",
        report.encoder.video_samples, report.encoder.audio_samples, report.encoder.request_errors
    );
    println!("Would record to: {}", report.recording_path.display());

    Ok(())
}
