//! AIrStream CLI - Headless Watch Client
//!
//! Features:
//! - Library listing with watch progress
//! - Uploads to the library API
//! - Quality ladder inspection for HLS manifests
//! - Simulated watch sessions with up-next continuation
//! - Persisted theme and watch positions

use airstream_core::{HostConfig, PlayerConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use url::Url;

mod commands;
mod output;

use output::OutputFormat;

/// AIrStream CLI - Video library and headless player
#[derive(Parser)]
#[command(name = "airstream")]
#[command(author = "AIrStream Developers")]
#[command(version)]
#[command(about = "Headless client for an AIrStream video library", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "table")]
    format: String,

    /// Library API base URL (defaults to $AIRSTREAM_API_URL or http://localhost:5000)
    #[arg(long)]
    api: Option<String>,

    /// Persisted state file (defaults to $AIRSTREAM_STATE_FILE or ./airstream-state.json)
    #[arg(long)]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the video library
    Library,

    /// Upload a video file
    Upload {
        /// File to upload
        file: PathBuf,

        /// Title (defaults to the file name)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Show the quality ladder of an HLS manifest
    Ladder {
        /// Manifest URL
        url: String,

        /// Bandwidth estimate for the auto pick (bps); measured when omitted
        #[arg(short, long)]
        bandwidth: Option<u64>,
    },

    /// Watch the library in a simulated player
    Watch {
        /// Item to start with (defaults to the last watched)
        #[arg(short, long)]
        id: Option<String>,

        /// Media seconds per wall-clock second
        #[arg(short, long, default_value = "10")]
        speed: f64,

        /// Number of items to play before exiting
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Duration assumed for items the library does not describe (seconds)
        #[arg(long, default_value = "60")]
        fallback_duration: f64,

        /// Disable the up-next countdown for this and later sessions
        #[arg(long)]
        no_autoplay: bool,
    },

    /// Show or set the theme
    Theme {
        /// dark or neon
        value: Option<String>,
    },

    /// Show saved watch positions
    Positions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();
    airstream_core::init();

    let mut host_config = HostConfig::from_env()?;
    if let Some(api) = &cli.api {
        host_config = host_config.with_api_base(Url::parse(api)?);
    }
    if let Some(path) = cli.state_file {
        host_config.state_file = Some(path);
    }
    if host_config.state_file.is_none() {
        host_config.state_file = Some(PathBuf::from(commands::DEFAULT_STATE_FILE));
    }

    let ctx = commands::Context {
        host: host_config,
        player: PlayerConfig::default(),
        format: OutputFormat::from(cli.format.as_str()),
    };

    match cli.command {
        Commands::Library => {
            commands::library(&ctx).await?;
        }
        Commands::Upload { file, title } => {
            commands::upload(&ctx, &file, title).await?;
        }
        Commands::Ladder { url, bandwidth } => {
            commands::ladder(&ctx, &url, bandwidth).await?;
        }
        Commands::Watch { id, speed, count, fallback_duration, no_autoplay } => {
            let options = commands::WatchOptions {
                start_id: id,
                speed,
                count: count.max(1),
                fallback_duration,
                disable_autoplay: no_autoplay,
            };
            commands::watch(&ctx, options).await?;
        }
        Commands::Theme { value } => {
            commands::theme(&ctx, value.as_deref())?;
        }
        Commands::Positions => {
            commands::positions(&ctx)?;
        }
    }

    Ok(())
}
