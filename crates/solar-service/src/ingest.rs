//! One ingestion cycle: fetch, normalize, write.

use std::sync::Arc;

use solar_store::HotStore;
use solar_types::{Normalized, ParseError, RawSample, Reading, TimeOfDay, normalize};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::source::{SampleSource, SourceError};

/// Result of ingesting one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The reading was written to the hot store.
    Stored(Reading),
    /// The sample failed the freshness gate; nothing was written.
    Stale {
        time_of_day: TimeOfDay,
        reporting_hour: u8,
    },
}

/// Ingestion errors.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Failed to fetch sample: {0}")]
    Source(#[from] SourceError),
    #[error("Malformed sample: {0}")]
    Parse(#[from] ParseError),
    #[error("Failed to store reading: {0}")]
    Store(#[from] solar_store::Error),
}

/// Turns raw samples into hot-store readings.
#[derive(Clone)]
pub struct Ingestor {
    hot: Arc<dyn HotStore>,
    clock: Arc<dyn Clock>,
}

impl Ingestor {
    /// Create an ingestor writing to `hot`.
    pub fn new(hot: Arc<dyn HotStore>, clock: Arc<dyn Clock>) -> Self {
        Self { hot, clock }
    }

    /// Fetch one sample from `source` and ingest it.
    ///
    /// Source and store failures propagate unchanged; there is no retry here.
    pub async fn ingest_once(&self, source: &dyn SampleSource) -> Result<IngestOutcome, IngestError> {
        let raw = source.fetch_sample().await?;
        self.ingest_sample(&raw).await
    }

    /// Normalize a sample against the current time and store it when fresh.
    pub async fn ingest_sample(&self, raw: &RawSample) -> Result<IngestOutcome, IngestError> {
        let now = self.clock.now();

        match normalize(raw, now) {
            Ok(Normalized::Accepted(reading)) => {
                self.hot.put(&reading).await?;
                info!(
                    "Stored reading {} {} (energy={}kWh, power={}W)",
                    reading.day_key(),
                    reading.time_of_day,
                    reading.energy_kwh,
                    reading.power_w
                );
                Ok(IngestOutcome::Stored(reading))
            }
            Ok(Normalized::Stale {
                time_of_day,
                reporting_hour,
            }) => {
                warn!(
                    "Skipping stale sample from {} (reporting hour is {:02})",
                    time_of_day, reporting_hour
                );
                Ok(IngestOutcome::Stale {
                    time_of_day,
                    reporting_hour,
                })
            }
            Err(e) => {
                warn!("Rejected malformed sample {:?}: {}", raw, e);
                Err(e.into())
            }
        }
    }
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor").finish_non_exhaustive()
    }
}

/// 12-hour label the upstream page would show for `hour:minute`.
pub fn time_label(hour: u8, minute: u8) -> String {
    let (h12, marker) = match hour {
        0 => (12, "AM"),
        1..=11 => (hour, "AM"),
        12 => (12, "PM"),
        _ => (hour - 12, "PM"),
    };
    format!("{}:{:02}{}", h12, minute, marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use async_trait::async_trait;
    use solar_store::SqliteHotStore;
    use time::{Duration, OffsetDateTime};

    struct StaticSource(RawSample);

    #[async_trait]
    impl SampleSource for StaticSource {
        async fn fetch_sample(&self) -> Result<RawSample, SourceError> {
            Ok(self.0.clone())
        }
    }

    struct DownSource;

    #[async_trait]
    impl SampleSource for DownSource {
        async fn fetch_sample(&self) -> Result<RawSample, SourceError> {
            Err(SourceError::Status {
                url: "http://scraper/sample".into(),
                status: 503,
            })
        }
    }

    fn setup() -> (Arc<SqliteHotStore>, Arc<FixedClock>, Ingestor) {
        let hot = Arc::new(SqliteHotStore::open_in_memory().unwrap());
        let clock = Arc::new(FixedClock::new(OffsetDateTime::now_utc()));
        let ingestor = Ingestor::new(hot.clone(), clock.clone());
        (hot, clock, ingestor)
    }

    fn sample_at(hour: u8, minute: u8) -> RawSample {
        RawSample {
            date: String::new(),
            time: time_label(hour, minute),
            energy: "3.20kWh".into(),
            power: "1,234W".into(),
            temperature: "21.5C".into(),
        }
    }

    fn fresh_hour(clock: &FixedClock) -> u8 {
        (clock.now() + Duration::hours(1)).hour()
    }

    #[test]
    fn test_time_label() {
        assert_eq!(time_label(0, 5), "12:05AM");
        assert_eq!(time_label(9, 30), "9:30AM");
        assert_eq!(time_label(12, 0), "12:00PM");
        assert_eq!(time_label(15, 2), "3:02PM");
        assert_eq!(time_label(23, 59), "11:59PM");
    }

    #[tokio::test]
    async fn test_fresh_sample_is_stored() {
        let (hot, clock, ingestor) = setup();
        let hour = fresh_hour(&clock);

        let outcome = ingestor.ingest_sample(&sample_at(hour, 2)).await.unwrap();
        let reading = match outcome {
            IngestOutcome::Stored(reading) => reading,
            other => panic!("expected Stored, got {other:?}"),
        };
        assert_eq!(reading.energy_kwh, 3.2);
        assert_eq!(reading.power_w, 1234.0);
        assert_eq!(reading.temperature_c, 21.5);
        assert_eq!(reading.day_of_month, clock.now().day());

        let stored = hot.query_day(clock.now().day()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].time_of_day, reading.time_of_day);
        assert_eq!(stored[0].energy_kwh, 3.2);
    }

    #[tokio::test]
    async fn test_stale_sample_is_skipped() {
        let (hot, clock, ingestor) = setup();
        let stale_hour = (fresh_hour(&clock) + 2) % 24;

        let outcome = ingestor.ingest_sample(&sample_at(stale_hour, 0)).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Stale { .. }));
        assert!(hot.query_day(clock.now().day()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_sample_writes_nothing() {
        let (hot, clock, ingestor) = setup();
        let mut raw = sample_at(fresh_hour(&clock), 0);
        raw.energy = "n/a".into();

        let err = ingestor.ingest_sample(&raw).await.unwrap_err();
        assert!(matches!(err, IngestError::Parse(ParseError::InvalidNumber { field: "energy", .. })));
        assert!(hot.query_day(clock.now().day()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_once_from_source() {
        let (_hot, clock, ingestor) = setup();
        let source = StaticSource(sample_at(fresh_hour(&clock), 15));

        let outcome = ingestor.ingest_once(&source).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Stored(_)));
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let (_hot, _clock, ingestor) = setup();
        let err = ingestor.ingest_once(&DownSource).await.unwrap_err();
        assert!(matches!(err, IngestError::Source(SourceError::Status { status: 503, .. })));
    }
}
