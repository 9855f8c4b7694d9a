//! avalanche-feeds: archive avalanche forecasts and publish them as RSS.
//! Batch commands are meant to run from cron; `serve` exposes the output.

use anyhow::{Context, Result};
use avalanche_feeds::{
    acquire::{AvalancheApiClient, DEFAULT_API_BASE, DEFAULT_TIMEOUT_SECS},
    config::{self, generate},
    listing::{self, DEFAULT_INDEX_PATH},
    metrics::Metrics,
    migrate::migrate,
    serve::{self, AppState, DEFAULT_BIND},
    store::{self, ForecastStore},
    FeedOutput, LocalFsStore, Pipeline, PipelineError, ZoneKey,
};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "avalanche-feeds", version)]
#[command(about = "Archive avalanche forecasts and publish per-zone RSS feeds")]
struct Cli {
    /// Registry file (TOML or JSON).
    #[arg(long, global = true, env = "AVY_REGISTRY_PATH")]
    registry: Option<PathBuf>,
    #[arg(long, global = true, env = "AVY_FORECASTS_DIR", default_value = "forecasts")]
    forecasts_dir: PathBuf,
    /// Archive in an object store instead (`s3://bucket/prefix`).
    #[arg(long, global = true, env = "AVY_STORE_URL")]
    store_url: Option<String>,
    #[arg(long, global = true, env = "AVY_FEEDS_DIR", default_value = "feeds")]
    feeds_dir: PathBuf,
    #[arg(long, global = true, env = "AVY_INDEX_PATH", default_value = DEFAULT_INDEX_PATH)]
    index_path: PathBuf,
    /// Public URL feeds are served under.
    #[arg(long, global = true, env = "AVY_BASE_URL", default_value = "http://localhost:5000")]
    base_url: String,
    #[arg(long, global = true, env = "AVY_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,
    #[arg(long, global = true, env = "AVY_HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,
    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every zone, archive it and rebuild its feed.
    FullUpdate,
    /// Fetch and archive one zone without touching its feed.
    DownloadForecast { center: String, zone: String },
    /// Rebuild one zone's feed from the archive.
    GenerateFeed { center: String, zone: String },
    /// Rebuild every feed from the archive.
    GenerateFeeds,
    /// Write the HTML index page.
    GenerateIndex,
    /// Build a registry file from the API's map layer.
    GenerateRegistry {
        #[arg(long, default_value = config::registry::DEFAULT_REGISTRY_TOML)]
        output: PathBuf,
    },
    /// Copy every archived forecast into another store.
    Migrate {
        /// Destination: a directory or `s3://bucket/prefix`.
        #[arg(long)]
        to: String,
        /// Only report what would be copied.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Serve feeds, the index page, /health and /metrics.
    Serve {
        #[arg(long, env = "AVY_BIND", default_value = DEFAULT_BIND)]
        bind: SocketAddr,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("avalanche_feeds=info,warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn api_client(cli: &Cli) -> Result<AvalancheApiClient> {
    AvalancheApiClient::new(&cli.api_base, Duration::from_secs(cli.timeout_secs))
        .context("building HTTP client")
}

fn forecast_store(cli: &Cli) -> Result<Arc<dyn ForecastStore>> {
    match &cli.store_url {
        Some(url) => store::open(url),
        None => Ok(Arc::new(LocalFsStore::new(&cli.forecasts_dir))),
    }
}

fn pipeline(cli: &Cli) -> Result<Pipeline> {
    let registry = config::load_registry(cli.registry.as_deref())?;
    Ok(Pipeline::new(
        Arc::new(registry),
        forecast_store(cli)?,
        Arc::new(api_client(cli)?),
        FeedOutput {
            dir: cli.feeds_dir.clone(),
            base_url: cli.base_url.clone(),
        },
    ))
}

/// Single-zone commands report `Kind: message` and fail the process.
fn report_zone_error(e: &PipelineError) -> ExitCode {
    eprintln!("{}: {e}", e.kind());
    ExitCode::FAILURE
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match &cli.command {
        Command::FullUpdate => {
            let summary = pipeline(&cli)?.full_update().await;
            print!("{summary}");
        }
        Command::GenerateFeeds => {
            let summary = pipeline(&cli)?.regenerate_feeds().await;
            print!("{summary}");
        }
        Command::DownloadForecast { center, zone } => {
            let key = ZoneKey::new(center, zone);
            match pipeline(&cli)?.download_forecast(&key).await {
                Ok(saved) => println!(
                    "saved {key} forecast for {} to {}",
                    saved.effective_date, saved.location
                ),
                Err(e) => return Ok(report_zone_error(&e)),
            }
        }
        Command::GenerateFeed { center, zone } => {
            let key = ZoneKey::new(center, zone);
            match pipeline(&cli)?.generate_feed(&key).await {
                Ok(path) => println!("wrote {key} feed to {}", path.display()),
                Err(e) => return Ok(report_zone_error(&e)),
            }
        }
        Command::GenerateIndex => {
            let registry = config::load_registry(cli.registry.as_deref())?;
            listing::write_index(&cli.index_path, &registry, &cli.base_url, chrono::Utc::now())
                .await?;
            println!("wrote index to {}", cli.index_path.display());
        }
        Command::GenerateRegistry { output } => {
            let doc = api_client(&cli)?
                .fetch_map_layer()
                .await
                .context("fetching map layer")?;
            let registry = generate::registry_from_map_layer(&doc, generate::SUPPORTED_CENTERS);
            config::write_registry(output, &registry).await?;
            println!(
                "wrote {} centers, {} zones to {}",
                registry.centers.len(),
                registry.zone_count(),
                output.display()
            );
        }
        Command::Migrate { to, dry_run } => {
            let from = forecast_store(&cli)?;
            let dest = store::open(to)?;
            let summary = migrate(from.as_ref(), dest.as_ref(), *dry_run).await?;
            print!("{summary}");
            if !summary.is_clean() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Serve { bind } => {
            let metrics = Metrics::init()?;
            match config::load_registry(cli.registry.as_deref()) {
                Ok(registry) => metrics.record_registry(&registry),
                Err(e) => {
                    tracing::warn!(error = %e, "registry not loaded; registry_zones gauge unset")
                }
            }
            let state = AppState::new(&cli.feeds_dir, &cli.index_path);
            serve::run(*bind, serve::router(state, &metrics)).await?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
