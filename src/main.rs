use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use cinema_stream::catalog::Library;
use cinema_stream::config::Config;
use cinema_stream::logging;
use cinema_stream::metadata::MetadataClient;
use cinema_stream::scanner;
use cinema_stream::server::{self, AppState};

/// Personal media library server.
#[derive(Debug, Parser)]
#[command(name = "cinema-stream", about = "Stream a personal video library to the browser", long_about = None)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "cinema.toml", global = true)]
    config: PathBuf,

    /// API key for title metadata lookups.
    #[arg(long, env = "TMDB_API_KEY", global = true, hide_env_values = true)]
    tmdb_api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the catalog and stream videos over HTTP.
    Serve {
        /// Address to listen on, overriding the config file.
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// Scan the video folder and write the catalog.
    Scan {
        /// Folder to scan, overriding the config file.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Catalog file to write, overriding the config file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    if cli.tmdb_api_key.is_some() {
        config.metadata.api_key = cli.tmdb_api_key;
    }
    tracing::debug!(?config.listen, video_dir = %config.video_dir.display(), "loaded config");

    match cli.command {
        Command::Serve { listen } => {
            let listen = listen.unwrap_or(config.listen);
            let library = Library::load(&config.library_path)?;
            let state = AppState::new(Arc::new(library), &config.stream)?;
            let listener = TcpListener::bind(listen)
                .await
                .with_context(|| format!("failed to bind {listen}"))?;
            server::serve(listener, state).await?;
        }
        Command::Scan { dir, output } => {
            let dir = dir.unwrap_or(config.video_dir);
            let output = output.unwrap_or(config.library_path);

            let mut entries = scanner::scan_videos(&dir)?;
            match MetadataClient::new(&config.metadata)? {
                Some(client) => {
                    let matched = client.enrich(&mut entries).await;
                    tracing::info!(matched, total = entries.len(), "metadata lookup done");
                }
                None => tracing::info!("no TMDB API key, keeping placeholder metadata"),
            }

            let library = Library::new(entries);
            library.save(&output)?;
            tracing::info!(entries = library.len(), "wrote catalog {}", output.display());
        }
    }
    Ok(())
}
