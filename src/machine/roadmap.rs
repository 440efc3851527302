//! Process-wide directory of pools and snapshots.
//!
//! The roadmap records every live pool (by descriptor, not by owning it)
//! and every snapshot taken in this process, and optionally holds a handle
//! to a persistent snapshot store. `recover` resolves snapshot ids against
//! the in-memory tier first and falls back to the store.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::errors::MachineError;
use crate::protocol::pool::{PoolConfig, Snapshot};
use crate::storage::snapshot_store::SnapshotStore;

/// Registration record for a live pool.
#[derive(Clone, Debug)]
pub struct PoolRecord {
    pub pool_id: Uuid,
    pub config: PoolConfig,
    pub forked_from: Option<Uuid>,
    pub registered_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct Roadmap {
    pools: RwLock<BTreeMap<Uuid, PoolRecord>>,
    snapshots: RwLock<BTreeMap<Uuid, Snapshot>>,
    store: RwLock<Option<Arc<dyn SnapshotStore>>>,
}

impl Roadmap {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The directory used when no explicit roadmap is supplied.
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<Roadmap>> = OnceLock::new();
        SHARED.get_or_init(Self::new).clone()
    }

    /// Attaches (or replaces) the persistent snapshot store handle.
    pub fn attach_store(&self, store: Arc<dyn SnapshotStore>) {
        *self
            .store
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(store);
    }

    fn store_handle(&self) -> Option<Arc<dyn SnapshotStore>> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn register_pool(&self, record: PoolRecord) {
        debug!(pool_id = %record.pool_id, forked_from = ?record.forked_from, "pool registered");
        self.pools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.pool_id, record);
    }

    pub fn pool(&self, pool_id: Uuid) -> Option<PoolRecord> {
        self.pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pool_id)
            .cloned()
    }

    /// All pools forked (directly) from `pool_id`.
    pub fn descendants(&self, pool_id: Uuid) -> Vec<PoolRecord> {
        self.pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|record| record.forked_from == Some(pool_id))
            .cloned()
            .collect()
    }

    pub fn register_snapshot(&self, snapshot: Snapshot) {
        debug!(snapshot_id = %snapshot.id, "snapshot registered");
        self.snapshots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(snapshot.id, snapshot);
    }

    pub fn snapshot_in_memory(&self, snapshot_id: Uuid) -> Option<Snapshot> {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&snapshot_id)
            .cloned()
    }

    /// Resolves a snapshot id, trying memory first and then the attached
    /// store. A store hit is cached back into the in-memory tier.
    pub async fn load_snapshot(&self, snapshot_id: Uuid) -> Result<Snapshot, MachineError> {
        if let Some(snapshot) = self.snapshot_in_memory(snapshot_id) {
            return Ok(snapshot);
        }
        if let Some(store) = self.store_handle() {
            if let Some(snapshot) = store.get(snapshot_id).await? {
                self.register_snapshot(snapshot.clone());
                return Ok(snapshot);
            }
        }
        Err(MachineError::SnapshotNotFound(snapshot_id))
    }

    /// Writes a snapshot through to the attached store.
    pub async fn persist(&self, snapshot: &Snapshot) -> Result<(), MachineError> {
        let store = self.store_handle().ok_or_else(|| {
            MachineError::Storage(crate::errors::StorageError::Io(
                "no snapshot store attached to the roadmap".to_string(),
            ))
        })?;
        store.put(snapshot).await?;
        self.register_snapshot(snapshot.clone());
        Ok(())
    }
}
