//! Deterministic, off-chain simulator of a concentrated-liquidity AMM pool
//! of the Uniswap-v3 family.
//!
//! The crate reproduces, bit for bit, the on-chain effects of `mint`,
//! `burn`, and `swap` on a single pool so that historical event streams can
//! be replayed, hypothetical trades explored, and pool states branched and
//! compared.
//!
//! Two subsystems make up the core:
//!
//! * [`protocol`] — the pure pool engine: tick-indexed liquidity, position
//!   accounting, fee growth tracking, and the swap step loop, all in exact
//!   256-bit integer arithmetic.
//! * [`machine`] — a transactional shell around the engine that records
//!   every state transition and supports dry-run queries, forking,
//!   snapshots, step-back, and recovery.
//!
//! Around them sit the [`storage`] layer (snapshot persistence) and the
//! [`events`] layer (event loading and deterministic replay).

pub mod errors;
pub mod events;
pub mod machine;
pub mod protocol;
pub mod storage;

pub use errors::{EventError, MachineError, MathError, PoolError, StorageError};
pub use machine::pool_machine::{ConfigurableCorePool, TransitionObserver};
pub use machine::roadmap::Roadmap;
pub use machine::transition::{Transition, TransitionEvent};
pub use protocol::pool::{CorePool, PoolConfig, PoolState, Snapshot};
