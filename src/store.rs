//! Mapping persistence
//!
//! [`MappingStore`] is the repository interface the service talks to.
//! [`RedbMappingStore`] implements it on top of the embedded database.

use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata};
use thiserror::Error;

use crate::database::{TABLE_ACTIVE_TARGETS, TABLE_MAPPINGS};
use crate::model::{NewMapping, UrlMapping};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("short key `{short_key}` already exists")]
    DuplicateKey { short_key: String },

    /// Another active mapping for the same target URL was inserted first.
    #[error("an active mapping for this target url already exists")]
    ActiveTargetExists(Box<UrlMapping>),

    #[error("no active mapping for short key `{short_key}`")]
    NotFound { short_key: String },

    #[error("failed to (de)serialize mapping: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] redb::Error),

    #[error("blocking task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

macro_rules! impl_from_redb {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for StoreError {
                fn from(e: $ty) -> Self {
                    StoreError::Database(e.into())
                }
            }
        )*
    };
}

impl_from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError
);

/// Repository interface over the persistent mapping collection.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Returns the active mapping for `target_url`, if any.
    async fn find_active_by_target(&self, target_url: &str)
        -> Result<Option<UrlMapping>, StoreError>;

    /// Inserts a new mapping with zero hits.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ActiveTargetExists`] when an active mapping for the
    ///   target URL was committed in the meantime; carries that mapping.
    /// - [`StoreError::DuplicateKey`] when the short key is already taken.
    async fn insert_new(&self, new_mapping: NewMapping) -> Result<UrlMapping, StoreError>;

    /// Returns the active mapping with `short_key`, if any.
    async fn find_by_key(&self, short_key: &str) -> Result<Option<UrlMapping>, StoreError>;

    /// Atomically increments the hit counter of `mapping` and returns the
    /// stored record after the increment.
    async fn record_hit(&self, mapping: &UrlMapping) -> Result<UrlMapping, StoreError>;

    /// Number of mappings in the collection, active or not.
    async fn count(&self) -> Result<u64, StoreError>;
}

/// [`MappingStore`] backed by redb.
///
/// redb allows a single write transaction at a time, so the uniqueness checks
/// in `insert_new` and the read-increment-write in `record_hit` cannot
/// interleave with another writer.
#[derive(Clone)]
pub struct RedbMappingStore {
    db: Arc<Database>,
}

impl RedbMappingStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Runs a blocking database closure off the async runtime.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db)).await?
    }
}

/// Reads the mapping stored under `short_key`
///
/// # Returns
///
/// * `Ok(Some(UrlMapping))` - the mapping exists and is active
/// * `Ok(None)` - no mapping, or the mapping is inactive
fn read_active(db: &Database, short_key: &str) -> Result<Option<UrlMapping>, StoreError> {
    // Begin a read-only transaction
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_MAPPINGS)?;

    // Look up the short key in the main table
    let Some(value) = table.get(short_key)? else {
        return Ok(None);
    };

    // Deserialize the JSON record
    let mapping: UrlMapping = serde_json::from_str(value.value())?;

    Ok(mapping.is_active.then_some(mapping))
}

#[async_trait]
impl MappingStore for RedbMappingStore {
    async fn find_active_by_target(
        &self,
        target_url: &str,
    ) -> Result<Option<UrlMapping>, StoreError> {
        let target_url = target_url.to_owned();
        self.blocking(move |db| {
            // Resolve the target URL to its active short key through the index
            let short_key = {
                let read_txn = db.begin_read()?;
                let index = read_txn.open_table(TABLE_ACTIVE_TARGETS)?;
                let key = match index.get(target_url.as_str())? {
                    Some(key) => key.value().to_owned(),
                    None => return Ok(None),
                };
                key
            };
            // Then load the record itself from the main table
            read_active(db, &short_key)
        })
        .await
    }

    async fn insert_new(&self, new_mapping: NewMapping) -> Result<UrlMapping, StoreError> {
        self.blocking(move |db| {
            let mapping = new_mapping.into_mapping();
            // Serialize the record to JSON for storage
            let record_json = serde_json::to_string(&mapping)?;

            // Begin a write transaction; redb runs one writer at a time, so the
            // checks below and the inserts cannot interleave with another request
            let write_txn = db.begin_write()?;
            {
                let mut mappings = write_txn.open_table(TABLE_MAPPINGS)?;
                let mut index = write_txn.open_table(TABLE_ACTIVE_TARGETS)?;

                // Check if the target URL already has an active mapping
                let winner_key = index
                    .get(mapping.target_url.as_str())?
                    .map(|key| key.value().to_owned());
                if let Some(winner_key) = winner_key {
                    let winner = mappings
                        .get(winner_key.as_str())?
                        .map(|value| serde_json::from_str::<UrlMapping>(value.value()))
                        .transpose()?;
                    if let Some(winner) = winner {
                        return Err(StoreError::ActiveTargetExists(Box::new(winner)));
                    }
                }

                // Check if the short key is already taken
                if mappings.get(mapping.short_key.as_str())?.is_some() {
                    return Err(StoreError::DuplicateKey {
                        short_key: mapping.short_key.clone(),
                    });
                }

                // Insert into the main table and the active-target index
                mappings.insert(mapping.short_key.as_str(), record_json.as_str())?;
                index.insert(mapping.target_url.as_str(), mapping.short_key.as_str())?;
            }
            // Commit the transaction to persist the data
            write_txn.commit()?;

            Ok(mapping)
        })
        .await
    }

    async fn find_by_key(&self, short_key: &str) -> Result<Option<UrlMapping>, StoreError> {
        let short_key = short_key.to_owned();
        self.blocking(move |db| read_active(db, &short_key)).await
    }

    async fn record_hit(&self, mapping: &UrlMapping) -> Result<UrlMapping, StoreError> {
        let short_key = mapping.short_key.clone();
        self.blocking(move |db| {
            let write_txn = db.begin_write()?;
            let updated = {
                let mut mappings = write_txn.open_table(TABLE_MAPPINGS)?;

                // Re-read the stored record inside the write transaction
                let current = mappings
                    .get(short_key.as_str())?
                    .map(|value| serde_json::from_str::<UrlMapping>(value.value()))
                    .transpose()?;
                let mut current = match current {
                    Some(current) if current.is_active => current,
                    _ => return Err(StoreError::NotFound { short_key }),
                };

                // Increment the counter and write the record back
                current.hits += 1;
                let record_json = serde_json::to_string(&current)?;
                mappings.insert(short_key.as_str(), record_json.as_str())?;
                current
            };
            write_txn.commit()?;

            Ok(updated)
        })
        .await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.blocking(|db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(TABLE_MAPPINGS)?;
            Ok(table.len()?)
        })
        .await
    }
}
