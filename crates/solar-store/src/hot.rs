//! Hot tier: per-day keyed readings with bounded retention.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::Connection;
use solar_types::{Reading, TimeOfDay, day_key};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::schema;

/// Low-latency store holding the most recent days of readings.
///
/// Readings are keyed by `(day_of_month, time_of_day)`; writing the same key
/// twice keeps the last write. Expired readings are never returned, but they
/// are only physically removed by [`purge_expired`](HotStore::purge_expired),
/// which callers run in the background.
#[async_trait]
pub trait HotStore: Send + Sync {
    /// Insert or replace a reading.
    async fn put(&self, reading: &Reading) -> Result<()>;

    /// Readings for a day that are still live at `now`, ordered by time of day ascending.
    ///
    /// Returns an empty vector when the day has no live readings.
    async fn query_day_at(&self, day_of_month: u8, now: OffsetDateTime) -> Result<Vec<Reading>>;

    /// All currently non-expired readings for a day, ordered by time of day ascending.
    async fn query_day(&self, day_of_month: u8) -> Result<Vec<Reading>> {
        self.query_day_at(day_of_month, OffsetDateTime::now_utc()).await
    }

    /// Delete readings whose expiry is at or before `now`. Returns the number removed.
    async fn purge_expired(&self, now: OffsetDateTime) -> Result<usize>;
}

/// SQLite-backed [`HotStore`].
pub struct SqliteHotStore {
    conn: Mutex<Connection>,
}

impl SqliteHotStore {
    /// Open or create a hot store database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening hot store at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open the default hot store location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_hot_path())
    }

    /// Open an in-memory hot store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Count stored rows, including expired ones not yet purged.
    pub async fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM hot_readings", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[async_trait]
impl HotStore for SqliteHotStore {
    async fn put(&self, reading: &Reading) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO hot_readings (day, time, energy, power, temperature, expire_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(day, time) DO UPDATE SET
                energy = ?3,
                power = ?4,
                temperature = ?5,
                expire_at = ?6",
            rusqlite::params![
                reading.day_key(),
                reading.time_of_day.to_string(),
                reading.energy_kwh,
                reading.power_w,
                reading.temperature_c,
                reading.expires_at.unix_timestamp(),
            ],
        )?;

        debug!(
            "Stored hot reading {} {} (energy={}kWh)",
            reading.day_key(),
            reading.time_of_day,
            reading.energy_kwh
        );
        Ok(())
    }

    async fn query_day_at(&self, day_of_month: u8, now: OffsetDateTime) -> Result<Vec<Reading>> {
        let day = day_key(day_of_month);
        debug!("Querying hot readings for day {}", day);

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT time, energy, power, temperature, expire_at
             FROM hot_readings
             WHERE day = ?1 AND expire_at > ?2
             ORDER BY time ASC",
        )?;

        let rows = stmt
            .query_map(rusqlite::params![day, now.unix_timestamp()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(time, energy, power, temperature, expire_at)| {
                let time_of_day: TimeOfDay = time
                    .parse()
                    .map_err(|_| Error::Corrupt(format!("time {:?} in day {}", time, day)))?;
                let expires_at = OffsetDateTime::from_unix_timestamp(expire_at)
                    .map_err(|_| Error::Corrupt(format!("expire_at {} in day {}", expire_at, day)))?;
                Ok(Reading {
                    time_of_day,
                    day_of_month,
                    energy_kwh: energy,
                    power_w: power,
                    temperature_c: temperature,
                    expires_at,
                })
            })
            .collect()
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<usize> {
        let conn = self.conn.lock().await;
        let removed = conn.execute(
            "DELETE FROM hot_readings WHERE expire_at <= ?1",
            [now.unix_timestamp()],
        )?;
        if removed > 0 {
            info!("Purged {} expired hot readings", removed);
        }
        Ok(removed)
    }
}
