use anyhow::Context;
use clap::{Parser, Subcommand};
use media_resolver::{DownloadResult, MediaKind, MediaResolver, ResolveError, ResolverConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "media-resolver", about = "Resolve songs and videos to files or stream URLs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether a query is a known link shape (no network)
    Validate { query: String },
    /// Show title, duration and thumbnail for a query or link
    Resolve { query: String },
    /// Download a track, or print its stream URL for long tracks
    Fetch {
        query: String,
        /// Video instead of audio
        #[arg(long)]
        video: bool,
    },
    /// List video ids of a playlist
    Playlist {
        query: String,
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
    /// Remove old files from the download directory
    Cleanup {
        #[arg(long, default_value_t = 24)]
        max_age_hours: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_logging();

    let cli = Cli::parse();
    let config = ResolverConfig::load().context("Failed to load configuration")?;
    if config.api_key.is_empty() {
        warn!("RESOLVER_API_KEY is not set, API calls will likely be rejected");
    }
    let resolver = MediaResolver::from_config(config)?;

    match cli.command {
        Command::Validate { query } => {
            println!("{}", serde_json::to_string_pretty(&resolver.validate(&query))?);
        }
        Command::Resolve { query } => {
            let details = resolver
                .resolve_details(&query)
                .await
                .map_err(friendly)?;
            println!("{}", serde_json::to_string_pretty(&details)?);
        }
        Command::Fetch { query, video } => {
            let details = resolver
                .resolve_details(&query)
                .await
                .map_err(friendly)?;

            let cancel = CancellationToken::new();
            let ctrl_c_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Cancelling download");
                    ctrl_c_token.cancel();
                }
            });

            let result = resolver
                .fetch_or_stream_with_cancel(
                    &details.identifier,
                    MediaKind::from_video_flag(video),
                    &cancel,
                )
                .await
                .map_err(friendly)?;

            match result {
                DownloadResult::Local { path, reused } => {
                    let note = if reused { " (already downloaded)" } else { "" };
                    println!("file: {}{}", path.display(), note);
                }
                DownloadResult::Stream { url } => println!("stream: {}", url),
            }
        }
        Command::Playlist { query, limit } => {
            for id in resolver.playlist(&query, limit).await? {
                println!("{}", id);
            }
        }
        Command::Cleanup { max_age_hours } => {
            let removed = resolver.cleanup_stale(max_age_hours).await;
            println!("removed {} file(s)", removed);
        }
    }

    Ok(())
}

/// Chat-style message on top, technical cause underneath
fn friendly(err: ResolveError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
