//! Ingestion scheduler and HTTP query API for tiered solar telemetry.
//!
//! This crate provides a service that:
//! - Polls a scraper endpoint for the inverter's latest sample
//! - Stores fresh readings in the hot tier for seven days
//! - Archives each day into a date-partitioned cold object
//! - Serves intraday, per-date and windowed queries over both tiers
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `GET /api/status` - Collector state and task counters
//! - `GET /api/data?range=day` - Today's readings from the hot tier
//! - `GET /api/data?range=7|30` - Daily energy maxima for the preceding days
//! - `GET /api/data?range=YYYYMMDD` - One archived day
//! - `OPTIONS /api/data` - CORS pre-flight
//! - `POST /api/samples` - Push a raw sample
//! - `POST /api/archive` - Archive a day now
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/solar-tier/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [storage]
//! hot_path = "~/.local/share/solar-tier/hot.db"
//!
//! [storage.cold]
//! kind = "s3"
//! bucket = "solar-data-1"
//!
//! [upstream]
//! url = "http://127.0.0.1:9000/sample"
//! poll_interval = 300
//!
//! [schedule]
//! archive_at = "23:55"
//! ```

pub mod api;
pub mod clock;
pub mod collector;
pub mod config;
pub mod ingest;
pub mod query;
pub mod range;
pub mod source;
pub mod state;

pub use clock::{Clock, FixedClock, SystemClock};
pub use collector::Collector;
pub use config::{
    AggregationConfig, ClockConfig, ColdStorageConfig, ColdStoreKind, Config, ConfigError,
    ScheduleConfig, ServerConfig, StorageConfig, UpstreamConfig,
};
pub use ingest::{IngestError, IngestOutcome, Ingestor};
pub use query::{QueryError, QueryResult, QueryRouter};
pub use range::RangeSelector;
pub use source::{HttpSampleSource, SampleSource, SourceError};
pub use state::{AppState, CollectorState, Task, TaskStats};
