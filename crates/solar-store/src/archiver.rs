//! Daily snapshot of the hot tier into a cold partition.

use std::sync::Arc;

use solar_types::ColdRecord;
use time::{Date, OffsetDateTime};
use tracing::{info, warn};

use crate::cold::ColdStore;
use crate::error::{Error, Result};
use crate::hot::HotStore;

/// Result of a successful archive run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Object key the partition was written to.
    pub key: String,
    /// Number of records in the partition.
    pub records: usize,
}

/// Copies one day of hot readings into the cold store.
///
/// The archiver never deletes from the hot tier; readings age out through
/// their own expiry.
#[derive(Clone)]
pub struct Archiver {
    hot: Arc<dyn HotStore>,
    cold: Arc<dyn ColdStore>,
}

impl Archiver {
    /// Create an archiver over the given tiers.
    pub fn new(hot: Arc<dyn HotStore>, cold: Arc<dyn ColdStore>) -> Self {
        Self { hot, cold }
    }

    /// Write the hot readings for `source_day` as the partition for `target_date`.
    ///
    /// Readings are live when they have not expired as of `now`. Fails with
    /// [`Error::NoData`] and writes nothing when the hot tier has no live
    /// readings for `source_day`. Running twice over unchanged hot content
    /// writes byte-identical objects.
    pub async fn archive(
        &self,
        target_date: Date,
        source_day: u8,
        now: OffsetDateTime,
    ) -> Result<ArchiveReport> {
        if target_date.day() != source_day {
            warn!(
                "Archiving day {:02} into partition for {} (day of month differs)",
                source_day, target_date
            );
        }

        let readings = self.hot.query_day_at(source_day, now).await?;
        if readings.is_empty() {
            return Err(Error::NoData { day: source_day });
        }

        let records: Vec<ColdRecord> = readings.iter().map(|r| r.to_cold_record()).collect();
        let key = self.cold.put_partition(target_date, &records).await?;

        info!("Archived {} readings from day {:02} to {}", records.len(), source_day, key);
        Ok(ArchiveReport {
            key,
            records: records.len(),
        })
    }
}

impl std::fmt::Debug for Archiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archiver").finish_non_exhaustive()
    }
}
