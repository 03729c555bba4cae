//! Platform-agnostic types for solar inverter telemetry.
//!
//! This crate provides the shared data model used by the storage tiers
//! (solar-store) and the query service (solar-service), plus the pure
//! normalization step that turns scraped upstream text into typed readings.
//!
//! # Features
//!
//! - [`Reading`], [`ColdRecord`], [`DayPoint`] and [`AggregatedPoint`]
//! - [`TimeOfDay`] with `"HH:MM"` text form
//! - Sample normalization with the freshness gate ([`normalize`])
//! - Error types for sample parsing
//!
//! # Example
//!
//! ```
//! use solar_types::{strip_unit, parse_time_label};
//!
//! assert_eq!(strip_unit("energy", "3.20kWh", "kWh").unwrap(), 3.2);
//! assert_eq!(parse_time_label("3:02PM").unwrap().to_string(), "15:02");
//! ```

pub mod error;
pub mod normalize;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use normalize::{
    HOT_RETENTION, Normalized, REPORTING_LAG, normalize, parse_time_label, reporting_hour,
    strip_unit,
};
pub use types::{AggregatedPoint, ColdRecord, DayPoint, RawSample, Reading, TimeOfDay, day_key};
