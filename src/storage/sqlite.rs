//! sqlite-backed snapshot store.
//!
//! One row per snapshot: scalar columns for everything small, one JSON blob
//! for the tick/position/bitmap tables. `put` is a single-row upsert, which
//! gives the atomicity the state machine relies on.

use std::str::FromStr;

use alloy::primitives::U256;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::errors::StorageError;
use crate::protocol::pool::{PoolConfig, Snapshot};
use crate::storage::encoding::{decode_tables, encode_tables};
use crate::storage::snapshot_store::SnapshotStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS snapshots (
    id                         TEXT PRIMARY KEY,
    description                TEXT NOT NULL,
    config                     TEXT NOT NULL,
    sqrt_price_x96             TEXT NOT NULL,
    tick_current               INTEGER NOT NULL,
    liquidity                  TEXT NOT NULL,
    fee_growth_global_0_x128   TEXT NOT NULL,
    fee_growth_global_1_x128   TEXT NOT NULL,
    tables_json                TEXT NOT NULL,
    created_at                 TEXT NOT NULL
)
"#;

pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    /// Connects and creates the schema if needed. Accepts any sqlx sqlite
    /// URL, e.g. `sqlite://snapshots.db?mode=rwc` or `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(io_error)?;
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(io_error)?;
        debug!(url, "sqlite snapshot store ready");
        Ok(Self { pool })
    }
}

fn io_error(err: sqlx::Error) -> StorageError {
    StorageError::Io(err.to_string())
}

fn corrupt(message: impl ToString) -> StorageError {
    StorageError::Corrupt(message.to_string())
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn get(&self, id: Uuid) -> Result<Option<Snapshot>, StorageError> {
        let row = sqlx::query("SELECT * FROM snapshots WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(io_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let config: PoolConfig =
            serde_json::from_str(row.try_get::<String, _>("config").map_err(io_error)?.as_str())
                .map_err(corrupt)?;
        let tables =
            decode_tables(row.try_get::<String, _>("tables_json").map_err(io_error)?.as_str())?;

        let sqrt_price_x96 =
            U256::from_str(row.try_get::<String, _>("sqrt_price_x96").map_err(io_error)?.as_str())
                .map_err(corrupt)?;
        let fee_growth_global_0_x128 = U256::from_str(
            row.try_get::<String, _>("fee_growth_global_0_x128")
                .map_err(io_error)?
                .as_str(),
        )
        .map_err(corrupt)?;
        let fee_growth_global_1_x128 = U256::from_str(
            row.try_get::<String, _>("fee_growth_global_1_x128")
                .map_err(io_error)?
                .as_str(),
        )
        .map_err(corrupt)?;
        let liquidity = row
            .try_get::<String, _>("liquidity")
            .map_err(io_error)?
            .parse::<u128>()
            .map_err(corrupt)?;
        let created_at = DateTime::parse_from_rfc3339(
            row.try_get::<String, _>("created_at").map_err(io_error)?.as_str(),
        )
        .map_err(corrupt)?
        .with_timezone(&Utc);

        Ok(Some(Snapshot {
            id,
            description: row.try_get("description").map_err(io_error)?,
            config,
            sqrt_price_x96,
            tick_current: row.try_get::<i64, _>("tick_current").map_err(io_error)? as i32,
            liquidity,
            fee_growth_global_0_x128,
            fee_growth_global_1_x128,
            ticks: tables.ticks.into_iter().collect(),
            tick_bitmap: tables.tick_bitmap.into_iter().collect(),
            positions: tables.positions.into_iter().collect(),
            created_at,
        }))
    }

    async fn put(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let config = serde_json::to_string(&snapshot.config).map_err(corrupt)?;
        let tables = encode_tables(snapshot)?;

        sqlx::query(
            "INSERT OR REPLACE INTO snapshots (
                id, description, config, sqrt_price_x96, tick_current, liquidity,
                fee_growth_global_0_x128, fee_growth_global_1_x128, tables_json, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(snapshot.id.to_string())
        .bind(&snapshot.description)
        .bind(config)
        .bind(snapshot.sqrt_price_x96.to_string())
        .bind(snapshot.tick_current as i64)
        .bind(snapshot.liquidity.to_string())
        .bind(snapshot.fee_growth_global_0_x128.to_string())
        .bind(snapshot.fee_growth_global_1_x128.to_string())
        .bind(tables)
        .bind(snapshot.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(io_error)?;

        debug!(snapshot_id = %snapshot.id, "snapshot written");
        Ok(())
    }
}
