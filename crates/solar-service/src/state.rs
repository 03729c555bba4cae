//! Application state shared across handlers and background tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use solar_store::{Aggregator, Archiver, ColdStore, HotStore};
use time::OffsetDateTime;
use tokio::sync::{RwLock, watch};

use crate::clock::Clock;
use crate::config::Config;
use crate::ingest::Ingestor;
use crate::query::QueryRouter;

/// Shared application state.
///
/// Store handles are shared trait objects; handlers never hold a lock across
/// a store call.
pub struct AppState {
    /// Hot tier.
    pub hot: Arc<dyn HotStore>,
    /// Cold tier.
    pub cold: Arc<dyn ColdStore>,
    /// Source of "now".
    pub clock: Arc<dyn Clock>,
    /// Range query dispatch.
    pub router: QueryRouter,
    /// Daily snapshot writer.
    pub archiver: Archiver,
    /// Sample ingestion.
    pub ingestor: Ingestor,
    /// Configuration (RwLock for runtime updates).
    pub config: RwLock<Config>,
    /// Collector control state.
    pub collector: CollectorState,
}

impl AppState {
    /// Create new application state over the given stores.
    pub fn new(
        hot: Arc<dyn HotStore>,
        cold: Arc<dyn ColdStore>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Arc<Self> {
        let aggregator =
            Aggregator::new(Arc::clone(&cold)).with_policy(config.aggregation.missing_day);
        let router = QueryRouter::new(
            Arc::clone(&hot),
            Arc::clone(&cold),
            aggregator,
            Arc::clone(&clock),
        );
        let archiver = Archiver::new(Arc::clone(&hot), Arc::clone(&cold));
        let ingestor = Ingestor::new(Arc::clone(&hot), Arc::clone(&clock));

        Arc::new(Self {
            hot,
            cold,
            clock,
            router,
            archiver,
            ingestor,
            config: RwLock::new(config),
            collector: CollectorState::new(),
        })
    }
}

/// A background task run by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// Fetch and store one sample.
    Ingest,
    /// Snapshot the current day into the cold tier.
    Archive,
    /// Remove expired hot readings.
    Sweep,
}

impl Task {
    /// All tasks, in reporting order.
    pub const ALL: [Task; 3] = [Task::Ingest, Task::Archive, Task::Sweep];

    /// Lowercase task name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Ingest => "ingest",
            Task::Archive => "archive",
            Task::Sweep => "sweep",
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run statistics for one background task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStats {
    pub task: Task,
    /// Time of last successful run.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_success_at: Option<OffsetDateTime>,
    /// Time of last failed run.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_error_at: Option<OffsetDateTime>,
    /// Last error message.
    pub last_error: Option<String>,
    pub success_count: u64,
    pub failure_count: u64,
}

impl TaskStats {
    fn new(task: Task) -> Self {
        Self {
            task,
            last_success_at: None,
            last_error_at: None,
            last_error: None,
            success_count: 0,
            failure_count: 0,
        }
    }
}

/// State for tracking and controlling the collector.
pub struct CollectorState {
    /// Whether the collector is currently running.
    running: AtomicBool,
    /// When the collector was started (Unix timestamp).
    started_at: AtomicU64,
    /// Channel to signal collector tasks to stop.
    stop_tx: watch::Sender<bool>,
    /// Receiver for stop signal (cloned by collector tasks).
    stop_rx: watch::Receiver<bool>,
    /// Per-task run stats.
    task_stats: RwLock<Vec<TaskStats>>,
}

impl CollectorState {
    /// Create a new collector state.
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            running: AtomicBool::new(false),
            started_at: AtomicU64::new(0),
            stop_tx,
            stop_rx,
            task_stats: RwLock::new(Task::ALL.into_iter().map(TaskStats::new).collect()),
        }
    }

    /// Check if the collector is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark the collector as started or stopped.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        if running {
            let now = OffsetDateTime::now_utc().unix_timestamp() as u64;
            self.started_at.store(now, Ordering::SeqCst);
        }
    }

    /// Get the collector start time.
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        let ts = self.started_at.load(Ordering::SeqCst);
        if ts == 0 {
            None
        } else {
            OffsetDateTime::from_unix_timestamp(ts as i64).ok()
        }
    }

    /// Get a receiver for the stop signal.
    pub fn subscribe_stop(&self) -> watch::Receiver<bool> {
        self.stop_rx.clone()
    }

    /// Signal all collector tasks to stop.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(true);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Reset the stop signal (for restarting).
    pub fn reset_stop(&self) {
        let _ = self.stop_tx.send(false);
    }

    /// Record a successful run of `task`.
    pub async fn record_success(&self, task: Task, at: OffsetDateTime) {
        let mut stats = self.task_stats.write().await;
        if let Some(entry) = stats.iter_mut().find(|s| s.task == task) {
            entry.success_count += 1;
            entry.last_success_at = Some(at);
        }
    }

    /// Record a failed run of `task`.
    pub async fn record_failure(&self, task: Task, at: OffsetDateTime, error: String) {
        let mut stats = self.task_stats.write().await;
        if let Some(entry) = stats.iter_mut().find(|s| s.task == task) {
            entry.failure_count += 1;
            entry.last_error_at = Some(at);
            entry.last_error = Some(error);
        }
    }

    /// Snapshot of all task stats.
    pub async fn task_stats(&self) -> Vec<TaskStats> {
        self.task_stats.read().await.clone()
    }
}

impl Default for CollectorState {
    fn default() -> Self {
        Self::new()
    }
}
