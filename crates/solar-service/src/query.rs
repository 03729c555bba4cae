//! Dispatch of a classified range to the tier that serves it.

use std::sync::Arc;

use serde::Serialize;
use solar_store::{Aggregator, ColdStore, HotStore};
use solar_types::{AggregatedPoint, ColdRecord, DayPoint};
use tracing::debug;

use crate::clock::Clock;
use crate::range::RangeSelector;

/// Query errors.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The range value did not classify.
    #[error("Invalid range parameter.")]
    InvalidRange(String),
    /// A store failed while answering.
    #[error(transparent)]
    Store(#[from] solar_store::Error),
}

/// Payload for each kind of range. Serializes as a bare JSON array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    /// Intraday points for the current day.
    Day(Vec<DayPoint>),
    /// Daily maxima, ascending by date.
    Series(Vec<AggregatedPoint>),
    /// Every record of one archived day.
    Partition(Vec<ColdRecord>),
}

impl QueryResult {
    /// Number of points in the result.
    pub fn len(&self) -> usize {
        match self {
            Self::Day(points) => points.len(),
            Self::Series(points) => points.len(),
            Self::Partition(records) => records.len(),
        }
    }

    /// Whether the result holds no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Routes range queries to the hot tier, the cold tier or the aggregator.
#[derive(Clone)]
pub struct QueryRouter {
    hot: Arc<dyn HotStore>,
    cold: Arc<dyn ColdStore>,
    aggregator: Aggregator,
    clock: Arc<dyn Clock>,
}

impl QueryRouter {
    /// Create a router over the given tiers.
    pub fn new(
        hot: Arc<dyn HotStore>,
        cold: Arc<dyn ColdStore>,
        aggregator: Aggregator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            hot,
            cold,
            aggregator,
            clock,
        }
    }

    /// Answer a classified range.
    pub async fn route(&self, selector: &RangeSelector) -> Result<QueryResult, QueryError> {
        debug!("Routing range {}", selector);
        match selector {
            RangeSelector::Today => {
                let now = self.clock.now();
                let readings = self.hot.query_day_at(now.day(), now).await?;
                Ok(QueryResult::Day(
                    readings.iter().map(|r| r.to_day_point()).collect(),
                ))
            }
            RangeSelector::Window(days) => {
                let series = self
                    .aggregator
                    .max_energy_series(self.clock.today(), *days)
                    .await?;
                Ok(QueryResult::Series(series))
            }
            RangeSelector::Date(date) => {
                let partition = self.cold.get_partition(*date).await?;
                Ok(QueryResult::Partition(partition.records))
            }
            RangeSelector::Invalid(raw) => Err(QueryError::InvalidRange(raw.clone())),
        }
    }
}

impl std::fmt::Debug for QueryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRouter")
            .field("aggregator", &self.aggregator)
            .finish_non_exhaustive()
    }
}
