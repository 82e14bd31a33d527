//! The pluggable audit store and the persister that drives it.
//!
//! The crate does not ship a database integration. Callers implement
//! [`RecordStore`] over whatever relational backend they use; the
//! client's internal persister handles identity assignment, timestamp
//! stamping, and once-per-table schema provisioning on top of it.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::BoxError;
use crate::record::{now_stamp, RequestRecord};
use crate::{Error, Result};

/// Storage backend for audit records.
///
/// Every operation is keyed by a caller-supplied table name so one store
/// can serve multiple audit tables (per-tenant tables, month shards, and
/// so on).
///
/// # Examples
///
/// ```no_run
/// use async_trait::async_trait;
/// use scrivener::{BoxError, RecordStore, RequestRecord};
///
/// struct SqlStore { /* connection pool */ }
///
/// #[async_trait]
/// impl RecordStore for SqlStore {
///     async fn provision(&self, table: &str) -> Result<(), BoxError> {
///         // CREATE TABLE IF NOT EXISTS ...
///         Ok(())
///     }
///
///     async fn insert(&self, table: &str, record: &RequestRecord) -> Result<(), BoxError> {
///         // INSERT INTO ...
///         Ok(())
///     }
///
///     async fn update(&self, table: &str, record: &RequestRecord) -> Result<(), BoxError> {
///         // UPDATE ... WHERE id = record.id
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Creates the schema for `table` if it does not exist. Must be
    /// idempotent.
    async fn provision(&self, table: &str) -> std::result::Result<(), BoxError>;

    /// Inserts a new record into `table`. The record's `id` is already
    /// assigned.
    async fn insert(&self, table: &str, record: &RequestRecord)
        -> std::result::Result<(), BoxError>;

    /// Applies a partial update to the record in `table` matching the
    /// record's `id`.
    async fn update(&self, table: &str, record: &RequestRecord)
        -> std::result::Result<(), BoxError>;
}

/// Create-or-update writer for audit records.
///
/// Provisions each backing table exactly once per client, regardless of
/// caller concurrency; the provisioning registry is the only cross-call
/// state in the crate. A table is marked provisioned only after the
/// store reports success, so a transient provisioning failure is retried
/// by the next save.
#[derive(Clone)]
pub(crate) struct Persister {
    store: Option<Arc<dyn RecordStore>>,
    provisioned: Arc<Mutex<HashSet<String>>>,
}

impl Persister {
    pub(crate) fn new(store: Option<Arc<dyn RecordStore>>) -> Self {
        Self {
            store,
            provisioned: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Writes the record to `table`: inserts with a fresh identity when
    /// the record has none, otherwise updates in place. Stamps
    /// created/updated timestamps accordingly.
    pub(crate) async fn save(&self, record: &mut RequestRecord, table: &str) -> Result<()> {
        let store = self.store.as_ref().ok_or(Error::BackendUnavailable)?;

        {
            let mut provisioned = self.provisioned.lock().await;
            if !provisioned.contains(table) {
                store
                    .provision(table)
                    .await
                    .map_err(|e| Error::Persistence {
                        context: format!("provisioning table {table}"),
                        source: e,
                    })?;
                provisioned.insert(table.to_string());
            }
        }

        if record.id.is_empty() {
            record.id = uuid::Uuid::new_v4().to_string();
            record.created_at = now_stamp();
            record.updated_at = now_stamp();
            store
                .insert(table, record)
                .await
                .map_err(|e| Error::Persistence {
                    context: format!("inserting audit record into {table}"),
                    source: e,
                })?;
        } else {
            record.updated_at = now_stamp();
            store
                .update(table, record)
                .await
                .map_err(|e| Error::Persistence {
                    context: format!("updating audit record {} in {table}", record.id),
                    source: e,
                })?;
        }

        Ok(())
    }
}
