//! Midroll CLI - Headless Session Driver
//!
//! Features:
//! - End-to-end simulated session runs
//! - No-fill and ad-error fallback rehearsal
//! - Event-script replay with expectations

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

/// Midroll CLI - ad-interleaved playback toolkit
#[derive(Parser)]
#[command(name = "midroll-cli")]
#[command(version)]
#[command(about = "Ad-interleaved playback session driver", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated session end to end
    Run {
        /// Content duration in seconds
        #[arg(long, default_value = "30")]
        content_duration: f64,

        /// Number of ads in the preroll pod
        #[arg(short, long, default_value = "2")]
        ads: u32,

        /// Duration of each ad in seconds
        #[arg(long, default_value = "10")]
        ad_duration: f64,

        /// Serve an unskippable pod
        #[arg(long)]
        unskippable: bool,

        /// Fail the ad request to rehearse the content fallback
        #[arg(long)]
        no_ads: bool,

        /// Inject an ad playback error mid-pod
        #[arg(long)]
        ad_error: bool,

        /// Seconds of media played per second of wall time
        #[arg(short, long, default_value = "10")]
        speed: f64,

        /// Start the session muted
        #[arg(long)]
        muted: bool,
    },

    /// Replay a JSON event script against a fresh session
    Replay {
        /// Path to the script file
        script: PathBuf,

        /// Content duration for the scripted session
        #[arg(long, default_value = "60")]
        content_duration: f64,

        /// Fail the ad request instead of loading a scripted break
        #[arg(long)]
        no_ads: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .init();

    match cli.command {
        Commands::Run {
            content_duration,
            ads,
            ad_duration,
            unskippable,
            no_ads,
            ad_error,
            speed,
            muted,
        } => {
            commands::run(
                commands::RunOptions {
                    content_duration,
                    ads,
                    ad_duration,
                    unskippable,
                    no_ads,
                    ad_error,
                    speed,
                    muted,
                },
                &cli.format,
            )
            .await?;
        }
        Commands::Replay {
            script,
            content_duration,
            no_ads,
        } => {
            commands::replay(&script, content_duration, no_ads, &cli.format).await?;
        }
    }

    Ok(())
}
