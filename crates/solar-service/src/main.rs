//! Solar Service - Telemetry ingestion, archiving and HTTP API.
//!
//! Run with: `cargo run -p solar-service`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use clap::{Parser, Subcommand};
use tower_http::trace::TraceLayer;
use tracing::info;

use solar_service::range::parse_compact_date;
use solar_service::{
    AppState, ColdStorageConfig, ColdStoreKind, Collector, Config, HttpSampleSource,
    IngestOutcome, SystemClock, api, collector,
};
use solar_store::{ObjectColdStore, SqliteHotStore};

/// Solar Service - Telemetry ingestion, archiving and HTTP API.
#[derive(Parser, Debug)]
#[command(name = "solar-service")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long, global = true)]
    bind: Option<String>,

    /// Hot store database path (overrides config).
    #[arg(long, global = true)]
    hot_db: Option<PathBuf>,

    /// Local cold partition directory (overrides config).
    #[arg(long, global = true)]
    cold_dir: Option<PathBuf>,

    /// Disable background collector (API only mode).
    #[arg(long, global = true)]
    no_collector: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the service in the foreground (default behavior).
    Run,

    /// Fetch and ingest one sample, then exit.
    Ingest,

    /// Archive one day of hot readings into the cold store, then exit.
    Archive {
        /// Partition date as YYYYMMDD (defaults to today).
        #[arg(long)]
        date: Option<String>,

        /// Hot store day of month to read (defaults to the date's day).
        #[arg(long)]
        day: Option<u8>,
    },

    /// Remove expired hot readings, then exit.
    Sweep,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("solar_service=info".parse()?)
                .add_directive("solar_store=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };

    // Override config with CLI args
    if let Some(bind) = args.bind.clone() {
        config.server.bind = bind;
    }
    if let Some(path) = args.hot_db.clone() {
        config.storage.hot_path = path;
    }
    if let Some(path) = args.cold_dir.clone() {
        config.storage.cold.kind = ColdStoreKind::Local;
        config.storage.cold.path = path;
    }
    config.validate()?;

    let state = open_state(config)?;

    match args.command {
        Some(Command::Ingest) => ingest_once(&state).await,
        Some(Command::Archive { date, day }) => archive_once(&state, date, day).await,
        Some(Command::Sweep) => {
            let removed = collector::sweep(&state).await?;
            println!("Removed {} expired readings", removed);
            Ok(())
        }
        Some(Command::Run) | None => run_server(state, args.no_collector).await,
    }
}

fn open_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    let offset = config.clock.offset()?;
    let hot = SqliteHotStore::open(&config.storage.hot_path)?;
    let cold = open_cold_store(&config.storage.cold)?;

    Ok(AppState::new(
        Arc::new(hot),
        Arc::new(cold),
        Arc::new(SystemClock::new(offset)),
        config,
    ))
}

fn open_cold_store(config: &ColdStorageConfig) -> anyhow::Result<ObjectColdStore> {
    let store = match config.kind {
        ColdStoreKind::Local => ObjectColdStore::local(&config.path)?,
        ColdStoreKind::Memory => {
            info!("Using in-memory cold store; partitions are lost on exit");
            ObjectColdStore::in_memory()
        }
        ColdStoreKind::S3 => {
            let bucket = config
                .bucket
                .as_deref()
                .context("storage.cold.bucket is required for s3")?;
            ObjectColdStore::s3(bucket, config.region.as_deref())?
        }
    };
    Ok(store)
}

async fn sample_source(state: &AppState) -> anyhow::Result<HttpSampleSource> {
    let config = state.config.read().await;
    Ok(HttpSampleSource::new(
        config.upstream.url.clone(),
        Duration::from_secs(config.upstream.timeout_secs),
    )?)
}

async fn ingest_once(state: &AppState) -> anyhow::Result<()> {
    let source = sample_source(state).await?;
    match state.ingestor.ingest_once(&source).await? {
        IngestOutcome::Stored(reading) => println!(
            "Stored reading {} {} ({} kWh)",
            reading.day_key(),
            reading.time_of_day,
            reading.energy_kwh
        ),
        IngestOutcome::Stale {
            time_of_day,
            reporting_hour,
        } => println!(
            "Skipped stale sample from {} (reporting hour is {:02})",
            time_of_day, reporting_hour
        ),
    }
    Ok(())
}

async fn archive_once(
    state: &AppState,
    date: Option<String>,
    day: Option<u8>,
) -> anyhow::Result<()> {
    let date = match date {
        Some(raw) => parse_compact_date(&raw)
            .with_context(|| format!("invalid date '{}': expected YYYYMMDD", raw))?,
        None => state.clock.today(),
    };
    let day = day.unwrap_or(date.day());

    let report = state.archiver.archive(date, day, state.clock.now()).await?;
    println!("Archived {} records to {}", report.records, report.key);
    Ok(())
}

async fn run_server(state: Arc<AppState>, no_collector: bool) -> anyhow::Result<()> {
    let bind = state.config.read().await.server.bind.clone();

    // Start the background collector
    if !no_collector {
        let source = sample_source(&state).await?;
        let collector = Collector::new(Arc::clone(&state), Arc::new(source));
        collector.start().await;
    } else {
        info!("Background collector disabled");
    }

    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = bind.parse()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
