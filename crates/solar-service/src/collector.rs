//! Background ingestion, archiving and expiry sweeps.

use std::sync::Arc;
use std::time::Duration;

use solar_store::{ArchiveReport, Error as StoreError};
use solar_types::TimeOfDay;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::ingest::IngestOutcome;
use crate::source::SampleSource;
use crate::state::{AppState, Task};

/// Shortest period any periodic task runs at.
pub const MIN_TICK: Duration = Duration::from_secs(1);

/// Background collector driving the three periodic tasks.
pub struct Collector {
    state: Arc<AppState>,
    source: Arc<dyn SampleSource>,
}

impl Collector {
    /// Create a new collector pulling samples from `source`.
    pub fn new(state: Arc<AppState>, source: Arc<dyn SampleSource>) -> Self {
        Self { state, source }
    }

    /// Start the ingest, archive and sweep tasks.
    ///
    /// Returns immediately; the tasks run until [`Collector::stop`] is called.
    pub async fn start(&self) {
        let config = self.state.config.read().await.clone();

        self.state.collector.reset_stop();
        self.state.collector.set_running(true);

        let poll_interval = tick_period(config.upstream.poll_interval);
        info!(
            "Starting ingestion from {} (interval: {}s)",
            config.upstream.url, config.upstream.poll_interval
        );
        tokio::spawn(ingest_loop(
            Arc::clone(&self.state),
            Arc::clone(&self.source),
            poll_interval,
            self.state.collector.subscribe_stop(),
        ));

        match config.schedule.archive_time() {
            Ok(at) => {
                info!("Scheduling daily archive at {}", at);
                tokio::spawn(archive_loop(
                    Arc::clone(&self.state),
                    at,
                    self.state.collector.subscribe_stop(),
                ));
            }
            Err(e) => error!("Daily archive disabled: {}", e),
        }

        let sweep_interval = tick_period(config.schedule.sweep_interval);
        tokio::spawn(sweep_loop(
            Arc::clone(&self.state),
            sweep_interval,
            self.state.collector.subscribe_stop(),
        ));
    }

    /// Signal all tasks to stop.
    pub fn stop(&self) {
        self.state.collector.signal_stop();
    }
}

/// Period for a configured interval in seconds, never below [`MIN_TICK`].
pub fn tick_period(secs: u64) -> Duration {
    Duration::from_secs(secs).max(MIN_TICK)
}

/// Archive the current day under today's date.
pub async fn archive_today(state: &AppState) -> Result<ArchiveReport, StoreError> {
    let now = state.clock.now();
    let today = now.date();
    state.archiver.archive(today, today.day(), now).await
}

/// Purge expired hot readings as of the clock's now.
pub async fn sweep(state: &AppState) -> Result<usize, StoreError> {
    state.hot.purge_expired(state.clock.now()).await
}

/// Time from `now` until the next wall-clock occurrence of `at`.
///
/// An occurrence exactly at `now` counts as already passed.
pub fn until_next(now: OffsetDateTime, at: TimeOfDay) -> Duration {
    let target = i64::from(at.hour()) * 3600 + i64::from(at.minute()) * 60;
    let current =
        i64::from(now.hour()) * 3600 + i64::from(now.minute()) * 60 + i64::from(now.second());

    let mut secs = target - current;
    if secs <= 0 {
        secs += 86_400;
    }
    (time::Duration::seconds(secs) - time::Duration::nanoseconds(i64::from(now.nanosecond())))
        .unsigned_abs()
}

async fn ingest_loop(
    state: Arc<AppState>,
    source: Arc<dyn SampleSource>,
    poll_interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut interval_timer = interval(poll_interval);
    let mut consecutive_failures = 0u32;

    loop {
        tokio::select! {
            _ = interval_timer.tick() => {
                let now = state.clock.now();
                match state.ingestor.ingest_once(source.as_ref()).await {
                    Ok(outcome) => {
                        consecutive_failures = 0;
                        if let IngestOutcome::Stored(reading) = &outcome {
                            debug!("Ingested reading at {}", reading.time_of_day);
                        }
                        state.collector.record_success(Task::Ingest, now).await;
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        if consecutive_failures <= 3 {
                            warn!("Ingestion failed: {} (attempt {})", e, consecutive_failures);
                        } else if consecutive_failures == 4 {
                            error!(
                                "Ingestion failed {} times in a row, will continue trying silently",
                                consecutive_failures
                            );
                        }
                        state
                            .collector
                            .record_failure(Task::Ingest, now, e.to_string())
                            .await;
                    }
                }
            }
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    info!("Ingestion received stop signal");
                    break;
                }
            }
        }
    }

    info!("Ingestion stopped");
}

async fn archive_loop(state: Arc<AppState>, at: TimeOfDay, mut stop_rx: watch::Receiver<bool>) {
    loop {
        let delay = until_next(state.clock.now(), at);
        debug!("Next archive in {}s", delay.as_secs());

        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                let now = state.clock.now();
                match archive_today(&state).await {
                    Ok(report) => {
                        state.collector.record_success(Task::Archive, now).await;
                        info!("Daily archive wrote {} records to {}", report.records, report.key);
                    }
                    Err(StoreError::NoData { day }) => {
                        info!("Nothing to archive for day {:02}", day);
                    }
                    Err(e) => {
                        error!("Daily archive failed: {}", e);
                        state
                            .collector
                            .record_failure(Task::Archive, now, e.to_string())
                            .await;
                    }
                }
            }
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    info!("Archiver received stop signal");
                    break;
                }
            }
        }
    }

    info!("Archiver stopped");
}

async fn sweep_loop(
    state: Arc<AppState>,
    sweep_interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut interval_timer = interval(sweep_interval);

    loop {
        tokio::select! {
            _ = interval_timer.tick() => {
                let now = state.clock.now();
                match sweep(&state).await {
                    Ok(removed) => {
                        debug!("Sweep removed {} expired readings", removed);
                        state.collector.record_success(Task::Sweep, now).await;
                    }
                    Err(e) => {
                        warn!("Expiry sweep failed: {}", e);
                        state
                            .collector
                            .record_failure(Task::Sweep, now, e.to_string())
                            .await;
                    }
                }
            }
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    info!("Sweeper received stop signal");
                    break;
                }
            }
        }
    }

    info!("Sweeper stopped");
}
