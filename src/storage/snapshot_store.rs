//! Snapshot persistence interface.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::StorageError;
use crate::protocol::pool::Snapshot;

/// Key-value store of whole-state snapshots by id. Writes must be atomic;
/// a missing id is `Ok(None)`, not an error.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Snapshot>, StorageError>;
    async fn put(&self, snapshot: &Snapshot) -> Result<(), StorageError>;
}

/// In-process store, used by tests and as a stand-in when no database is
/// configured.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<BTreeMap<Uuid, Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get(&self, id: Uuid) -> Result<Option<Snapshot>, StorageError> {
        Ok(self
            .snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }

    async fn put(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        self.snapshots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(snapshot.id, snapshot.clone());
        Ok(())
    }
}
