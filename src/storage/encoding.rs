//! Canonical snapshot encoding.
//!
//! Snapshots encode to JSON with the three large tables flattened into
//! key-sorted pair vectors, so equal states always produce byte-identical
//! encodings and their hashes are comparable across runs.

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::StorageError;
use crate::protocol::pool::{PoolConfig, Snapshot};
use crate::protocol::position::{PositionInfo, PositionKey};
use crate::protocol::tick::TickInfo;

/// The three big tables as sorted `(key, value)` runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableBlob {
    pub ticks: Vec<(i32, TickInfo)>,
    pub tick_bitmap: Vec<(i16, U256)>,
    pub positions: Vec<(PositionKey, PositionInfo)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: Uuid,
    pub description: String,
    pub config: PoolConfig,
    pub sqrt_price_x96: U256,
    pub tick_current: i32,
    pub liquidity: u128,
    pub fee_growth_global_0_x128: U256,
    pub fee_growth_global_1_x128: U256,
    pub tables: TableBlob,
    pub created_at: DateTime<Utc>,
}

impl From<&Snapshot> for SnapshotRecord {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            id: snapshot.id,
            description: snapshot.description.clone(),
            config: snapshot.config.clone(),
            sqrt_price_x96: snapshot.sqrt_price_x96,
            tick_current: snapshot.tick_current,
            liquidity: snapshot.liquidity,
            fee_growth_global_0_x128: snapshot.fee_growth_global_0_x128,
            fee_growth_global_1_x128: snapshot.fee_growth_global_1_x128,
            tables: TableBlob {
                ticks: snapshot
                    .ticks
                    .iter()
                    .map(|(tick, info)| (*tick, info.clone()))
                    .collect(),
                tick_bitmap: snapshot
                    .tick_bitmap
                    .iter()
                    .map(|(word, bits)| (*word, *bits))
                    .collect(),
                positions: snapshot
                    .positions
                    .iter()
                    .map(|(key, info)| (key.clone(), info.clone()))
                    .collect(),
            },
            created_at: snapshot.created_at,
        }
    }
}

impl From<SnapshotRecord> for Snapshot {
    fn from(record: SnapshotRecord) -> Self {
        Self {
            id: record.id,
            description: record.description,
            config: record.config,
            sqrt_price_x96: record.sqrt_price_x96,
            tick_current: record.tick_current,
            liquidity: record.liquidity,
            fee_growth_global_0_x128: record.fee_growth_global_0_x128,
            fee_growth_global_1_x128: record.fee_growth_global_1_x128,
            ticks: record.tables.ticks.into_iter().collect(),
            tick_bitmap: record.tables.tick_bitmap.into_iter().collect(),
            positions: record.tables.positions.into_iter().collect(),
            created_at: record.created_at,
        }
    }
}

pub fn encode_tables(snapshot: &Snapshot) -> Result<String, StorageError> {
    let record = SnapshotRecord::from(snapshot);
    serde_json::to_string(&record.tables).map_err(|e| StorageError::Corrupt(e.to_string()))
}

pub fn decode_tables(raw: &str) -> Result<TableBlob, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Corrupt(e.to_string()))
}

pub fn encode_snapshot(snapshot: &Snapshot) -> Result<String, StorageError> {
    serde_json::to_string(&SnapshotRecord::from(snapshot))
        .map_err(|e| StorageError::Corrupt(e.to_string()))
}

pub fn decode_snapshot(raw: &str) -> Result<Snapshot, StorageError> {
    let record: SnapshotRecord =
        serde_json::from_str(raw).map_err(|e| StorageError::Corrupt(e.to_string()))?;
    Ok(record.into())
}
