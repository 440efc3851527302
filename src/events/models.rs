//! On-chain event records, as exported by an indexer.
//!
//! Numeric amounts are decimal strings on the wire (CSV columns and JSON
//! fields alike) and exact integers in memory.

use alloy::primitives::{I256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub(crate) mod u256_decimal {
    use std::str::FromStr;

    use alloy::primitives::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        U256::from_str(raw.trim()).map_err(de::Error::custom)
    }
}

pub(crate) mod i256_decimal {
    use alloy::primitives::I256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &I256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<I256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        I256::from_dec_str(raw.trim()).map_err(de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LiquidityEventKind {
    Mint,
    Burn,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityEvent {
    pub id: String,
    pub block_number: u64,
    pub log_index: u32,
    #[serde(rename = "type")]
    pub kind: LiquidityEventKind,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    #[serde(with = "u256_decimal")]
    pub amount0: U256,
    #[serde(with = "u256_decimal")]
    pub amount1: U256,
    pub date: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapEvent {
    pub id: String,
    pub block_number: u64,
    pub log_index: u32,
    #[serde(with = "i256_decimal")]
    pub amount0: I256,
    #[serde(with = "i256_decimal")]
    pub amount1: I256,
    #[serde(with = "u256_decimal")]
    pub sqrt_price_x96: U256,
    pub liquidity: u128,
    pub tick: i32,
    pub date: DateTime<Utc>,
}

/// A liquidity or swap event, merged for replay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolEvent {
    Liquidity(LiquidityEvent),
    Swap(SwapEvent),
}

impl PoolEvent {
    pub fn id(&self) -> &str {
        match self {
            PoolEvent::Liquidity(event) => &event.id,
            PoolEvent::Swap(event) => &event.id,
        }
    }

    /// Replay order: ascending `(block_number, log_index)`.
    pub fn sort_key(&self) -> (u64, u32) {
        match self {
            PoolEvent::Liquidity(event) => (event.block_number, event.log_index),
            PoolEvent::Swap(event) => (event.block_number, event.log_index),
        }
    }

    pub fn date(&self) -> DateTime<Utc> {
        match self {
            PoolEvent::Liquidity(event) => event.date,
            PoolEvent::Swap(event) => event.date,
        }
    }
}
