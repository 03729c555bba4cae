//! Cold tier: one immutable JSON object per calendar day.
//!
//! Objects live under a key derived purely from the date:
//!
//! ```text
//! {YYYY}/{MM}/{YYYY}_{MM}_{DD}.json
//! ```
//!
//! The payload is a UTF-8 JSON array of [`ColdRecord`]s ordered by time.
//! Any [`object_store::ObjectStore`] backend can hold the partitions: S3 in
//! production, the local filesystem for single-host deployments, and
//! [`InMemory`] in tests.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use solar_types::ColdRecord;
use time::Date;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Object key for the partition holding `date`.
///
/// ```
/// use solar_store::partition_key;
/// use time::macros::date;
///
/// assert_eq!(partition_key(date!(2024-03-07)), "2024/03/2024_03_07.json");
/// ```
pub fn partition_key(date: Date) -> String {
    let (year, month, day) = (date.year(), u8::from(date.month()), date.day());
    format!("{year:04}/{month:02}/{year:04}_{month:02}_{day:02}.json")
}

/// Serialize records into a partition payload.
///
/// Encoding is deterministic: the same records always yield the same bytes.
pub fn encode_records(records: &[ColdRecord]) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(records)?))
}

/// Parse a partition payload.
pub fn decode_records(payload: &[u8]) -> Result<Vec<ColdRecord>> {
    Ok(serde_json::from_slice(payload)?)
}

/// All archived records for one calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct ColdPartition {
    /// The date this partition covers.
    pub date: Date,
    /// Records in stored order (ascending by time).
    pub records: Vec<ColdRecord>,
}

impl ColdPartition {
    /// Object key this partition is stored under.
    pub fn key(&self) -> String {
        partition_key(self.date)
    }

    /// Highest cumulative energy in the partition, `None` if it has no records.
    pub fn max_energy(&self) -> Option<f64> {
        self.records
            .iter()
            .map(|r| r.energy)
            .fold(None, |max, e| Some(max.map_or(e, |m: f64| m.max(e))))
    }
}

/// Durable, date-partitioned archive.
#[async_trait]
pub trait ColdStore: Send + Sync {
    /// Write the partition for `date`, replacing any existing object.
    ///
    /// Returns the key written. The write is a single object put, so readers
    /// observe either the previous partition or the new one.
    async fn put_partition(&self, date: Date, records: &[ColdRecord]) -> Result<String>;

    /// Read the partition for `date`.
    ///
    /// Fails with [`Error::PartitionNotFound`] when no object exists at the key.
    async fn get_partition(&self, date: Date) -> Result<ColdPartition>;
}

/// [`ColdStore`] on top of any `object_store` backend.
#[derive(Debug, Clone)]
pub struct ObjectColdStore {
    inner: Arc<dyn ObjectStore>,
}

impl ObjectColdStore {
    /// Wrap an existing object store.
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }

    /// Partitions held in process memory (for testing).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// Partitions stored as files below `root`, which is created if missing.
    pub fn local<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|e| Error::CreateDirectory {
            path: root.to_path_buf(),
            source: e,
        })?;
        info!("Opening cold store at {}", root.display());
        Ok(Self::new(Arc::new(LocalFileSystem::new_with_prefix(root)?)))
    }

    /// Partitions stored in an S3 bucket.
    ///
    /// Credentials and endpoint come from the standard `AWS_*` environment variables.
    pub fn s3(bucket: &str, region: Option<&str>) -> Result<Self> {
        let mut builder =
            object_store::aws::AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(region) = region {
            builder = builder.with_region(region);
        }
        info!("Opening cold store in bucket {}", bucket);
        Ok(Self::new(Arc::new(builder.build()?)))
    }

    /// Get the underlying object store.
    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.inner
    }
}

#[async_trait]
impl ColdStore for ObjectColdStore {
    async fn put_partition(&self, date: Date, records: &[ColdRecord]) -> Result<String> {
        let key = partition_key(date);
        let payload = encode_records(records)?;
        let size = payload.len();

        self.inner
            .put(&ObjectPath::from(key.as_str()), PutPayload::from(payload))
            .await?;

        debug!("Wrote partition {} ({} records, {} bytes)", key, records.len(), size);
        Ok(key)
    }

    async fn get_partition(&self, date: Date) -> Result<ColdPartition> {
        let key = partition_key(date);

        let result = match self.inner.get(&ObjectPath::from(key.as_str())).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(Error::PartitionNotFound { key });
            }
            Err(e) => return Err(e.into()),
        };
        let payload = result.bytes().await?;

        debug!("Read partition {} ({} bytes)", key, payload.len());
        Ok(ColdPartition {
            date,
            records: decode_records(&payload)?,
        })
    }
}
