//! Hot and cold storage tiers for solar inverter telemetry.
//!
//! Readings land in a short-lived hot tier (SQLite) where they are keyed by
//! day of month and time of day. Once a day, the archiver snapshots the day
//! into an immutable, date-partitioned cold object; window queries then
//! reduce cold partitions to daily maxima.
//!
//! # Features
//!
//! - [`HotStore`] with seven-day expiry ([`SqliteHotStore`])
//! - [`ColdStore`] over any `object_store` backend ([`ObjectColdStore`])
//! - Daily snapshots with [`Archiver`]
//! - Window aggregation with [`Aggregator`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use solar_store::{Aggregator, ObjectColdStore};
//! use time::macros::date;
//!
//! # async fn run() -> solar_store::Result<()> {
//! let cold = Arc::new(ObjectColdStore::local(solar_store::default_cold_path())?);
//! let series = Aggregator::new(cold)
//!     .max_energy_series(date!(2024-03-10), 7)
//!     .await?;
//! for point in series {
//!     println!("{}: {:.2} kWh", point.date, point.max_energy);
//! }
//! # Ok(())
//! # }
//! ```

mod aggregate;
mod archiver;
mod cold;
mod error;
mod hot;
mod schema;

pub use aggregate::{Aggregator, MissingDayPolicy};
pub use archiver::{ArchiveReport, Archiver};
pub use cold::{
    ColdPartition, ColdStore, ObjectColdStore, decode_records, encode_records, partition_key,
};
pub use error::{Error, Result};
pub use hot::{HotStore, SqliteHotStore};

fn data_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("solar-tier")
}

/// Default hot store database path following platform conventions.
///
/// - Linux: `~/.local/share/solar-tier/hot.db`
/// - macOS: `~/Library/Application Support/solar-tier/hot.db`
/// - Windows: `C:\Users\<user>\AppData\Local\solar-tier\hot.db`
pub fn default_hot_path() -> std::path::PathBuf {
    data_dir().join("hot.db")
}

/// Default root directory for locally stored cold partitions.
pub fn default_cold_path() -> std::path::PathBuf {
    data_dir().join("cold")
}
