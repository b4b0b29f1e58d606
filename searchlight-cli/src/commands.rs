//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Subcommand};
use searchlight_core::config::{CommandBackendConfig, SearchConfig, SearchlightConfig};
use searchlight_core::{FfmpegTranscoder, QueryCache, Transcoder};
use searchlight_search::{FallbackLocator, PaginatedSearchService};
use serde_json::json;
use tracing::info;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    Server {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Transcoder executable
        #[arg(long)]
        ffmpeg: Option<PathBuf>,
        /// Transcoder processes allowed to run at once
        #[arg(long)]
        max_transcodes: Option<usize>,
        #[command(flatten)]
        backends: BackendArgs,
    },
    /// Run one search and print the page as JSON
    Search {
        /// Query text
        query: String,
        /// One-based page number
        #[arg(long)]
        page: Option<String>,
        /// Records per page
        #[arg(long)]
        page_size: Option<String>,
        #[command(flatten)]
        backends: BackendArgs,
    },
    /// Check whether the transcoder can be run
    Probe {
        /// Transcoder executable
        #[arg(long)]
        ffmpeg: Option<PathBuf>,
    },
}

/// Locator backend overrides shared by `server` and `search`.
#[derive(Args, Debug, Default)]
pub struct BackendArgs {
    /// Directory searched by the walk backend (repeatable)
    #[arg(long = "root", value_name = "DIR")]
    roots: Vec<PathBuf>,
    /// External search command, e.g. "es -n 5000"; the query is appended
    #[arg(long, value_name = "COMMAND")]
    search_command: Option<String>,
}

impl BackendArgs {
    fn apply(self, config: &mut SearchConfig) -> anyhow::Result<()> {
        if !self.roots.is_empty() {
            config.walk_roots = self.roots;
        }
        if let Some(command) = self.search_command {
            config.command = Some(
                command
                    .parse::<CommandBackendConfig>()
                    .context("invalid --search-command")?,
            );
        }
        Ok(())
    }
}

/// Handle the CLI command
///
/// Flags override `SEARCHLIGHT_*` environment values, which override defaults.
///
/// # Errors
/// Returns an error if configuration is invalid or the command fails
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    let mut config =
        SearchlightConfig::from_env().context("invalid SEARCHLIGHT_* environment")?;

    match command {
        Commands::Server {
            host,
            port,
            ffmpeg,
            max_transcodes,
            backends,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(ffmpeg) = ffmpeg {
                config.transcode.binary = ffmpeg;
            }
            if let Some(max) = max_transcodes {
                config.transcode.max_concurrent = max;
            }
            backends.apply(&mut config.search)?;
            config.validate()?;
            start_server(config).await
        }
        Commands::Search {
            query,
            page,
            page_size,
            backends,
        } => {
            backends.apply(&mut config.search)?;
            config.validate()?;
            run_search(config, &query, page.as_deref(), page_size.as_deref()).await
        }
        Commands::Probe { ffmpeg } => {
            let binary = ffmpeg.unwrap_or(config.transcode.binary);
            probe_transcoder(binary).await
        }
    }
}

/// Start the web server and block until shutdown
///
/// # Errors
/// Returns an error if the server fails to start or stops abnormally
pub async fn start_server(config: SearchlightConfig) -> anyhow::Result<()> {
    info!(
        "Starting Searchlight on {}:{}",
        config.server.host, config.server.port
    );
    searchlight_web::run_server(config)
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))
}

/// Resolve one page of results and print it
///
/// # Errors
/// - Empty query
/// - Every locator backend failed
pub async fn run_search(
    config: SearchlightConfig,
    query: &str,
    page: Option<&str>,
    page_size: Option<&str>,
) -> anyhow::Result<()> {
    let cache = Arc::new(QueryCache::new(config.cache.ttl));
    let locator = Arc::new(FallbackLocator::from_config(&config.search));
    let service = PaginatedSearchService::new(cache, locator, config.search);

    let request = service.request(query, page, page_size);
    let result = service.search(&request).await?;

    let output = json!({
        "query": request.query,
        "page": result.page,
        "pageSize": result.page_size,
        "totalCount": result.total_count,
        "totalPages": result.total_pages,
        "results": result.records,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Report whether the transcoder binary runs
///
/// # Errors
/// Returns an error if the transcoder is not usable
pub async fn probe_transcoder(binary: PathBuf) -> anyhow::Result<()> {
    let transcoder = FfmpegTranscoder::probe(binary).await;
    if !transcoder.is_available() {
        bail!(
            "transcoder {} is not available; /transcode requests will return 503",
            transcoder.binary().display()
        );
    }
    println!("Transcoder available: {}", transcoder.binary().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_args_override_config() {
        let mut config = SearchConfig::default();
        let args = BackendArgs {
            roots: vec![PathBuf::from("/srv/media")],
            search_command: Some("es -n 5000".to_string()),
        };

        args.apply(&mut config).unwrap();

        assert_eq!(config.walk_roots, vec![PathBuf::from("/srv/media")]);
        let command = config.command.unwrap();
        assert_eq!(command.program, PathBuf::from("es"));
        assert_eq!(command.args, vec!["-n", "5000"]);
    }

    #[test]
    fn test_empty_backend_args_keep_config() {
        let mut config = SearchConfig {
            walk_roots: vec![PathBuf::from("/from/env")],
            ..SearchConfig::default()
        };

        BackendArgs::default().apply(&mut config).unwrap();

        assert_eq!(config.walk_roots, vec![PathBuf::from("/from/env")]);
        assert!(config.command.is_none());
    }
}
