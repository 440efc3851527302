//! Transition records.
//!
//! Every successful mutating call on a [`ConfigurableCorePool`] emits one
//! `Transition`. Transitions form a DAG rooted at the pool's first
//! `Initialize` (or at a `Fork`/`Recover` marker for derived pools); the
//! parent link is the previous transition's id.
//!
//! [`ConfigurableCorePool`]: crate::machine::pool_machine::ConfigurableCorePool

use alloy::primitives::{I256, U256};
use uuid::Uuid;

/// Inputs and outputs of one recorded state mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionEvent {
    Initialize {
        sqrt_price_x96: U256,
    },
    Mint {
        owner: String,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
        amount0: U256,
        amount1: U256,
    },
    Burn {
        owner: String,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
        amount0: U256,
        amount1: U256,
    },
    Swap {
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: Option<U256>,
        amount0: I256,
        amount1: I256,
    },
    Collect {
        owner: String,
        tick_lower: i32,
        tick_upper: i32,
        amount0_requested: u128,
        amount1_requested: u128,
        amount0: u128,
        amount1: u128,
    },
    Fork {
        source_pool_id: Uuid,
    },
    Snapshot {
        snapshot_id: Uuid,
    },
    Recover {
        snapshot_id: Uuid,
    },
}

impl TransitionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TransitionEvent::Initialize { .. } => "INITIALIZE",
            TransitionEvent::Mint { .. } => "MINT",
            TransitionEvent::Burn { .. } => "BURN",
            TransitionEvent::Swap { .. } => "SWAP",
            TransitionEvent::Collect { .. } => "COLLECT",
            TransitionEvent::Fork { .. } => "FORK",
            TransitionEvent::Snapshot { .. } => "SNAPSHOT",
            TransitionEvent::Recover { .. } => "RECOVER",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub event: TransitionEvent,
    /// Id of the pool state this transition produced.
    pub post_state_id: Uuid,
}

impl Transition {
    pub fn new(parent_id: Option<Uuid>, event: TransitionEvent, post_state_id: Uuid) -> Self {
        Self { id: Uuid::new_v4(), parent_id, event, post_state_id }
    }
}
