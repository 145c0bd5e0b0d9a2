//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use vidrelay_core::{
    HttpTransport, RelayConfig, RelayServiceError, Resolution, ResilientFetcher, StreamResolver,
};
use vidrelay_search::SearchService;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP relay server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory holding the client page, served for unmatched paths
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
    /// Resolve a video id and print the selected stream
    Resolve {
        /// Video id
        video_id: String,
    },
    /// Search for videos and print normalized results
    Search {
        /// Search terms
        query: String,
        /// Result page
        #[arg(long)]
        page: Option<u32>,
    },
    /// Print the mirror order used for failover
    Mirrors,
}

/// Runs one CLI command against `config`.
///
/// # Errors
///
/// Any configuration, upstream or server failure, with context attached.
pub async fn handle_command(command: Commands, mut config: RelayConfig) -> Result<()> {
    match command {
        Commands::Serve {
            host,
            port,
            static_dir,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if static_dir.is_some() {
                config.server.static_dir = static_dir;
            }
            vidrelay_web::run_server(config)
                .await
                .context("Relay server failed")
        }
        Commands::Resolve { video_id } => {
            let resolver = StreamResolver::new(build_fetcher(&config)?);
            match resolver.resolve(&video_id).await {
                Ok(Resolution::Found { title, stream, .. }) => {
                    let output = serde_json::json!({ "title": title, "stream": stream });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                    Ok(())
                }
                Ok(Resolution::NotFound { video_id, .. }) => {
                    anyhow::bail!("No playable stream found for video {video_id}")
                }
                Err(e) => Err(report(RelayServiceError::from(e))),
            }
        }
        Commands::Search { query, page } => {
            let search = SearchService::new(build_fetcher(&config)?);
            let results = search
                .search(&query, page)
                .await
                .with_context(|| format!("Search for '{query}' failed"))?;
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }
        Commands::Mirrors => {
            let registry = config
                .upstream
                .registry()
                .map_err(|e| report(e.into()))?;
            for (position, mirror) in registry.iter().enumerate() {
                println!("{}. {mirror}", position + 1);
            }
            Ok(())
        }
    }
}

fn build_fetcher(config: &RelayConfig) -> Result<Arc<ResilientFetcher>> {
    let registry = config
        .upstream
        .registry()
        .map_err(|e| report(e.into()))?;
    let transport =
        HttpTransport::new(&config.upstream).context("Failed to build HTTP client")?;
    Ok(Arc::new(ResilientFetcher::new(
        Arc::new(registry),
        Arc::new(transport),
        config.upstream.retry_policy(),
    )))
}

fn report(error: RelayServiceError) -> anyhow::Error {
    if !error.is_user_error() {
        tracing::error!("{error}");
    }
    anyhow::anyhow!(error.user_message())
}
