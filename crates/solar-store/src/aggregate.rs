//! Window aggregation over cold partitions.

use std::sync::Arc;

use futures::future::join_all;
use solar_types::AggregatedPoint;
use time::{Date, Duration};
use tracing::{debug, warn};

use crate::cold::{ColdStore, partition_key};
use crate::error::{Error, Result};

/// What to do when a day inside the window has no usable partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingDayPolicy {
    /// Fail the whole request with [`Error::PartitionNotFound`].
    #[default]
    Fail,
    /// Drop the day from the series.
    Skip,
}

/// Reduces a window of daily partitions to their maximum cumulative energy.
#[derive(Clone)]
pub struct Aggregator {
    cold: Arc<dyn ColdStore>,
    policy: MissingDayPolicy,
}

impl Aggregator {
    /// Create an aggregator that fails on missing days.
    pub fn new(cold: Arc<dyn ColdStore>) -> Self {
        Self {
            cold,
            policy: MissingDayPolicy::default(),
        }
    }

    /// Set the missing-day policy.
    #[must_use]
    pub fn with_policy(mut self, policy: MissingDayPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The active missing-day policy.
    pub fn policy(&self) -> MissingDayPolicy {
        self.policy
    }

    /// Daily maxima for the `window_days` days before `today`, oldest first.
    ///
    /// `today` itself is never included: its partition is not written until
    /// the day is over. Partitions are fetched concurrently.
    pub async fn max_energy_series(
        &self,
        today: Date,
        window_days: u32,
    ) -> Result<Vec<AggregatedPoint>> {
        let targets: Vec<Date> = (1..=i64::from(window_days))
            .map(|i| today - Duration::days(i))
            .collect();
        debug!("Aggregating {} partitions before {}", targets.len(), today);

        let fetched = join_all(targets.iter().map(|&date| self.day_max(date))).await;

        let mut points = Vec::with_capacity(fetched.len());
        let mut missing: Vec<Date> = Vec::new();
        for (date, result) in targets.iter().zip(fetched) {
            match result? {
                Some(max_energy) => points.push(AggregatedPoint {
                    date: *date,
                    max_energy,
                }),
                None => missing.push(*date),
            }
        }

        if !missing.is_empty() {
            missing.sort();
            match self.policy {
                MissingDayPolicy::Fail => {
                    return Err(Error::PartitionNotFound {
                        key: partition_key(missing[0]),
                    });
                }
                MissingDayPolicy::Skip => {
                    warn!("Skipping {} days without partitions: {:?}", missing.len(), missing);
                }
            }
        }

        points.sort_by_key(|p| p.date);
        Ok(points)
    }

    /// Maximum energy for one day, `None` when the partition is absent or empty.
    async fn day_max(&self, date: Date) -> Result<Option<f64>> {
        match self.cold.get_partition(date).await {
            Ok(partition) => Ok(partition.max_energy()),
            Err(Error::PartitionNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cold::ObjectColdStore;
    use solar_types::{ColdRecord, TimeOfDay};
    use time::macros::date;

    fn records(energies: &[f64]) -> Vec<ColdRecord> {
        energies
            .iter()
            .enumerate()
            .map(|(i, &energy)| ColdRecord {
                time: TimeOfDay::new(8 + i as u8, 0).unwrap(),
                power: 600.0,
                energy,
                temperature: 20.0,
            })
            .collect()
    }

    async fn seeded(today: Date, days: i64) -> Arc<ObjectColdStore> {
        let cold = Arc::new(ObjectColdStore::in_memory());
        for i in 1..=days {
            let e = i as f64;
            cold.put_partition(today - Duration::days(i), &records(&[e * 0.1, e, e * 0.5]))
                .await
                .unwrap();
        }
        cold
    }

    #[tokio::test]
    async fn test_seven_day_window() {
        let today = date!(2024 - 03 - 10);
        let aggregator = Aggregator::new(seeded(today, 7).await);

        let points = aggregator.max_energy_series(today, 7).await.unwrap();
        assert_eq!(points.len(), 7);
        assert_eq!(points[0].date, date!(2024 - 03 - 03));
        assert_eq!(points[0].max_energy, 7.0);
        assert_eq!(points[6].date, date!(2024 - 03 - 09));
        assert_eq!(points[6].max_energy, 1.0);
        assert!(points.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[tokio::test]
    async fn test_max_of_partition() {
        let today = date!(2024 - 03 - 08);
        let cold = Arc::new(ObjectColdStore::in_memory());
        cold.put_partition(date!(2024 - 03 - 07), &records(&[1.0, 2.5, 0.3]))
            .await
            .unwrap();

        let points = Aggregator::new(cold).max_energy_series(today, 1).await.unwrap();
        assert_eq!(points, vec![AggregatedPoint {
            date: date!(2024 - 03 - 07),
            max_energy: 2.5,
        }]);
    }

    #[tokio::test]
    async fn test_window_crosses_month_boundary() {
        let today = date!(2024 - 03 - 02);
        let aggregator = Aggregator::new(seeded(today, 3).await);

        let points = aggregator.max_energy_series(today, 3).await.unwrap();
        let dates: Vec<Date> = points.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![
            date!(2024 - 02 - 28),
            date!(2024 - 02 - 29),
            date!(2024 - 03 - 01),
        ]);
    }

    #[tokio::test]
    async fn test_missing_day_fails() {
        let today = date!(2024 - 03 - 10);
        let aggregator = Aggregator::new(seeded(today, 5).await);

        let err = aggregator.max_energy_series(today, 7).await.unwrap_err();
        match err {
            Error::PartitionNotFound { key } => assert_eq!(key, "2024/03/2024_03_03.json"),
            other => panic!("expected PartitionNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_day_skipped() {
        let today = date!(2024 - 03 - 10);
        let aggregator =
            Aggregator::new(seeded(today, 5).await).with_policy(MissingDayPolicy::Skip);

        let points = aggregator.max_energy_series(today, 7).await.unwrap();
        assert_eq!(points.len(), 5);
        assert_eq!(points[0].date, date!(2024 - 03 - 05));
    }

    #[tokio::test]
    async fn test_empty_partition_counts_as_missing() {
        let today = date!(2024 - 03 - 08);
        let cold = Arc::new(ObjectColdStore::in_memory());
        cold.put_partition(date!(2024 - 03 - 07), &[]).await.unwrap();

        let err = Aggregator::new(cold).max_energy_series(today, 1).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_zero_window_is_empty() {
        let aggregator = Aggregator::new(Arc::new(ObjectColdStore::in_memory()));
        let points = aggregator
            .max_energy_series(date!(2024 - 03 - 08), 0)
            .await
            .unwrap();
        assert!(points.is_empty());
    }
}
