//! Error taxonomy for the simulator.
//!
//! Arithmetic and validation failures abort the current operation and leave
//! the pool untouched; state-machine failures additionally roll back the
//! transition being recorded. Persistence failures surface to the caller and
//! never touch in-memory state. Retry policy lives in the driver, not here.

use alloy::primitives::U256;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("bit scan on zero value")]
    ZeroValue,
    #[error("liquidity addition overflow")]
    LiquidityAdd,
    #[error("liquidity subtraction underflow")]
    LiquiditySub,
    #[error("liquidity exceeds the per-tick maximum")]
    MaxLiquidityPerTick,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("tick spacing {0} must be positive")]
    InvalidTickSpacing(i32),
    #[error("tick {0} outside the usable range")]
    TickOutOfRange(i32),
    #[error("tick {tick} not aligned to spacing {spacing}")]
    TickMisaligned { tick: i32, spacing: i32 },
    #[error("tick range inverted: {lower} >= {upper}")]
    TickOrder { lower: i32, upper: i32 },
    #[error("zero liquidity")]
    ZeroLiquidity,
    #[error("pool already initialized")]
    AlreadyInitialized,
    #[error("pool not initialized")]
    NotInitialized,
    #[error("sqrt price limit {0} on the wrong side of the current price")]
    BadPriceLimit(U256),
    #[error("sqrt price {0} outside the representable range")]
    SqrtPriceOutOfBounds(U256),
    #[error("requested amount exceeds pool reserves")]
    InsufficientReserves,
    #[error(transparent)]
    Math(#[from] MathError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("snapshot store io failure: {0}")]
    Io(String),
    #[error("corrupt snapshot record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("no transition to step back")]
    NoTransition,
    #[error("snapshot {0} not found")]
    SnapshotNotFound(Uuid),
    #[error("post-processor rejected transition: {0}")]
    PostProcessor(String),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("failed to read event file: {0}")]
    Io(String),
    #[error("malformed event record at row {row}: {message}")]
    Parse { row: usize, message: String },
    #[error("event {event_id}: replayed amounts do not match the record")]
    AmountMismatch { event_id: String },
    #[error("event {event_id}: post-swap price {actual} differs from recorded {expected}")]
    PriceMismatch { event_id: String, expected: U256, actual: U256 },
    #[error("event {event_id}: {source}")]
    Machine {
        event_id: String,
        #[source]
        source: MachineError,
    },
}
