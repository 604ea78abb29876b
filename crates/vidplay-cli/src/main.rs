//! Vidplay CLI - Video Registry and Headless Playback Tool
//!
//! Features:
//! - Video listing and details
//! - Uploads and deletion
//! - Stream URL lookup
//! - Headless playback with scheduled quality switches

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vidplay_core::{ClientConfig, VideoApiClient};

mod commands;
mod output;

/// Vidplay CLI - Video registry and playback toolkit
#[derive(Parser)]
#[command(name = "vidplay")]
#[command(version)]
#[command(about = "Video registry client and adaptive-quality playback tool", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Client configuration file (JSON)
    #[arg(short, long, env = "VIDPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Registry API base URL
    #[arg(long, env = "VIDPLAY_API_BASE")]
    api_base: Option<String>,

    /// Origin serving rendition streams
    #[arg(long, env = "VIDPLAY_ORIGIN")]
    origin: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List uploaded videos
    List,

    /// Show a video and its renditions
    Show {
        /// Video ID
        id: u64,
    },

    /// Upload a video file
    Upload {
        /// Video title
        #[arg(short, long)]
        title: String,

        /// Video file to upload
        file: PathBuf,
    },

    /// Delete a video
    Delete {
        /// Video ID
        id: u64,
    },

    /// Print the stream URL of a rendition
    Url {
        /// Video ID
        id: u64,

        /// Rendition key (omit for the original upload)
        #[arg(short, long)]
        quality: Option<String>,
    },

    /// Play a video headlessly, printing state changes
    Play {
        /// Video ID
        id: u64,

        /// Quality switch as QUALITY@SECONDS (repeatable)
        #[arg(short, long = "switch")]
        switches: Vec<commands::Switch>,

        /// Seconds to keep playing after the last switch
        #[arg(short, long, default_value = "0")]
        linger: f64,

        /// Duration reported by the headless player in seconds
        #[arg(long, default_value = "600")]
        media_duration: f64,

        /// Rendition to start with when available
        #[arg(long)]
        default_quality: Option<String>,
    },
}

impl Cli {
    /// Client configuration: file values, then flag/env overrides
    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_json_file(path)?,
            None => ClientConfig::default(),
        };
        if let Some(api_base) = &self.api_base {
            config.api_base_url = api_base.clone();
        }
        if let Some(origin) = &self.origin {
            config.delivery_origin = Some(origin.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    vidplay_core::init();

    let client = VideoApiClient::new(&cli.client_config()?)?;

    match cli.command {
        Commands::List => {
            commands::list(&client, &cli.format).await?;
        }
        Commands::Show { id } => {
            commands::show(&client, id, &cli.format).await?;
        }
        Commands::Upload { title, file } => {
            commands::upload(&client, &title, &file, &cli.format).await?;
        }
        Commands::Delete { id } => {
            commands::delete(&client, id).await?;
        }
        Commands::Url { id, quality } => {
            commands::url(&client, id, quality.as_deref())?;
        }
        Commands::Play { id, switches, linger, media_duration, default_quality } => {
            let options = commands::PlayOptions {
                switches,
                linger,
                media_duration,
                default_quality,
            };
            commands::play(client, id, options, &cli.format).await?;
        }
    }

    Ok(())
}
