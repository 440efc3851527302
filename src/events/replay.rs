//! Deterministic event replay.
//!
//! Events are merged across both streams, ordered by `(block_number,
//! log_index)`, optionally restricted to a date window, and applied one by
//! one. Each replayed event is checked against the recorded amounts (and,
//! for swaps, the recorded post price); a mismatch undoes the offending
//! transition and aborts with the event id.

use alloy::primitives::I256;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info};

use crate::errors::{EventError, MachineError};
use crate::events::models::{LiquidityEvent, LiquidityEventKind, PoolEvent, SwapEvent};
use crate::machine::pool_machine::ConfigurableCorePool;

/// Positions created by replay are booked under this synthetic owner; the
/// distilled event schema does not carry the on-chain one.
pub const REPLAY_OWNER: &str = "replayer";

/// Merges both streams into replay order.
pub fn merge_events(
    liquidity: Vec<LiquidityEvent>,
    swaps: Vec<SwapEvent>,
) -> Vec<PoolEvent> {
    let mut events: Vec<PoolEvent> = liquidity
        .into_iter()
        .map(PoolEvent::Liquidity)
        .chain(swaps.into_iter().map(PoolEvent::Swap))
        .collect();
    events.sort_by_key(|event| event.sort_key());
    events
}

/// Midnight UTC at the start of `date`; replay windows are half-open
/// `[start, end)` in these units.
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Keeps events inside the half-open window.
pub fn window(
    events: Vec<PoolEvent>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Vec<PoolEvent> {
    events
        .into_iter()
        .filter(|event| {
            start.is_none_or(|s| event.date() >= s) && end.is_none_or(|e| event.date() < e)
        })
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub mints: usize,
    pub burns: usize,
    pub swaps: usize,
}

pub fn replay_events(
    machine: &mut ConfigurableCorePool,
    events: &[PoolEvent],
) -> Result<ReplayStats, EventError> {
    let mut stats = ReplayStats::default();
    for event in events {
        match event {
            PoolEvent::Liquidity(event) => {
                apply_liquidity(machine, event)?;
                match event.kind {
                    LiquidityEventKind::Mint => stats.mints += 1,
                    LiquidityEventKind::Burn => stats.burns += 1,
                }
            }
            PoolEvent::Swap(event) => {
                apply_swap(machine, event)?;
                stats.swaps += 1;
            }
        }
    }
    info!(?stats, "replay finished");
    Ok(stats)
}

fn machine_err(event_id: &str, source: MachineError) -> EventError {
    EventError::Machine { event_id: event_id.to_string(), source }
}

/// Undoes the event's own transition, if one was recorded.
fn unwind(
    machine: &mut ConfigurableCorePool,
    depth_before: usize,
    event_id: &str,
) -> Result<(), EventError> {
    if machine.transitions().len() > depth_before {
        machine.step_back().map_err(|e| machine_err(event_id, e))?;
    }
    Ok(())
}

fn apply_liquidity(
    machine: &mut ConfigurableCorePool,
    event: &LiquidityEvent,
) -> Result<(), EventError> {
    let depth = machine.transitions().len();
    let (amount0, amount1) = match event.kind {
        LiquidityEventKind::Mint => machine
            .mint(REPLAY_OWNER, event.tick_lower, event.tick_upper, event.liquidity)
            .map_err(|e| machine_err(&event.id, e))?,
        LiquidityEventKind::Burn => machine
            .burn(REPLAY_OWNER, event.tick_lower, event.tick_upper, event.liquidity)
            .map_err(|e| machine_err(&event.id, e))?,
    };
    debug!(id = %event.id, kind = ?event.kind, %amount0, %amount1, "liquidity event applied");

    if amount0 != event.amount0 || amount1 != event.amount1 {
        unwind(machine, depth, &event.id)?;
        return Err(EventError::AmountMismatch { event_id: event.id.clone() });
    }
    Ok(())
}

/// The event records both amounts but not which side the trader specified;
/// probe `amount0` first, then `amount1`, and commit whichever candidate
/// reproduces both the recorded amounts and the recorded post price. A
/// candidate whose commit misses the record is undone before the next one
/// is tried.
fn apply_swap(machine: &mut ConfigurableCorePool, event: &SwapEvent) -> Result<(), EventError> {
    let zero_for_one = event.amount0 > I256::ZERO;

    // Commits are bounded by the recorded post price. A fee-only swap leaves
    // the price where it was, which would make that bound degenerate; those
    // commit unbounded, exactly as probed.
    let limit = if event.sqrt_price_x96 == machine.state().sqrt_price_x96 {
        None
    } else {
        Some(event.sqrt_price_x96)
    };

    let mut price_mismatch = None;
    for candidate in [event.amount0, event.amount1] {
        let Ok((amount0, amount1)) = machine.query_swap(zero_for_one, candidate, None) else {
            continue;
        };
        if amount0 != event.amount0 || amount1 != event.amount1 {
            continue;
        }

        let depth = machine.transitions().len();
        let (amount0, amount1) = machine
            .swap(zero_for_one, candidate, limit)
            .map_err(|e| machine_err(&event.id, e))?;
        let post_price = machine.state().sqrt_price_x96;
        if amount0 == event.amount0
            && amount1 == event.amount1
            && post_price == event.sqrt_price_x96
        {
            debug!(id = %event.id, zero_for_one, %candidate, "swap event applied");
            return Ok(());
        }
        if amount0 == event.amount0 && amount1 == event.amount1 {
            price_mismatch = Some(post_price);
        }
        unwind(machine, depth, &event.id)?;
    }

    match price_mismatch {
        Some(actual) => Err(EventError::PriceMismatch {
            event_id: event.id.clone(),
            expected: event.sqrt_price_x96,
            actual,
        }),
        None => Err(EventError::AmountMismatch { event_id: event.id.clone() }),
    }
}
