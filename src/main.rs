use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use vistream::backend::{self, HttpTransport, JsonTransport};
use vistream::segments::{SegmentService, SponsorBlockClient};
use vistream::stream::{QualityProfile, Stream, StreamAggregator};
use vistream::utils::{format_duration, Config, LoadState};

/// vistream - resolve streams and segments across video instances
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file layered over the system and user files
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List candidate streams from every enabled instance
    Streams {
        #[arg(value_name = "VIDEO_ID")]
        video_id: String,

        /// Quality profile used to mark the selected stream
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// List skippable segments of a video
    Segments {
        #[arg(value_name = "VIDEO_ID")]
        video_id: String,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load_from(args.config.as_deref()).context("Failed to load configuration")?;

    let log_level = if args.debug { "debug" } else { config.general.log_level.as_str() };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    info!("Starting vistream v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Streams { video_id, profile } => list_streams(&config, &video_id, profile.as_deref()).await,
        Command::Segments { video_id } => list_segments(&config, &video_id).await,
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn transport(config: &Config) -> Result<Arc<dyn JsonTransport>> {
    Ok(Arc::new(HttpTransport::new(&config.network)?))
}

async fn list_streams(config: &Config, video_id: &str, profile: Option<&str>) -> Result<()> {
    let backends = backend::from_instances(&config.instances, transport(config)?);
    if backends.is_empty() {
        bail!("No enabled instances configured");
    }

    let profile = match profile {
        Some(name) => config
            .quality
            .by_name(name)
            .cloned()
            .with_context(|| format!("Unknown quality profile '{}'", name))?,
        None => config.quality.for_backend(backends.first().map(|b| b.instance().backend)),
    };

    let aggregator = StreamAggregator::new(backends);
    let result = aggregator
        .load_streams_with(video_id, |report| match &report.outcome {
            LoadState::Loaded(count) => info!("{}: {} stream(s)", report.instance.name, count),
            LoadState::Failed(message) => warn!("{}: {}", report.instance.name, message),
            LoadState::Pending => {}
        })
        .await;

    if result.streams.is_empty() {
        bail!("No streams found for {}", video_id);
    }

    println!("Streams for {} (profile '{}'):", video_id, profile.name);
    for line in stream_lines(&result.streams, &profile) {
        println!("{}", line);
    }
    Ok(())
}

/// One line per candidate, the selected one starred
fn stream_lines(streams: &[Stream], profile: &QualityProfile) -> Vec<String> {
    // Candidates from different instances compare equal, so mark by identity
    let selected = profile.select_stream(streams);
    streams
        .iter()
        .map(|stream| {
            let marker = if selected.is_some_and(|s| std::ptr::eq(s, stream)) { "*" } else { " " };
            format!("{} {}", marker, stream.description())
        })
        .collect()
}

async fn list_segments(config: &Config, video_id: &str) -> Result<()> {
    if !config.segments.enabled {
        bail!("Segments are disabled in the configuration");
    }

    let client = SponsorBlockClient::new(config.segments.api_url.clone(), transport(config)?);
    let segments = client.fetch_segments(video_id, &config.segments.categories).await?;

    if segments.is_empty() {
        println!("No segments for {}", video_id);
    }
    for segment in segments {
        println!(
            "{} - {}  {}",
            format_duration(segment.start()),
            format_duration(segment.end()),
            segment.title()
        );
    }
    Ok(())
}
