//! Per-tick liquidity and fee-growth bookkeeping.

use std::collections::BTreeMap;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::errors::{MathError, PoolError};
use crate::protocol::liquidity_math::add_delta;

/// State tracked for every initialized tick.
///
/// `initialized` is true exactly when `liquidity_gross > 0`; entries whose
/// gross liquidity drops to zero are removed from the table by the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickInfo {
    pub liquidity_gross: u128,
    pub liquidity_net: i128,
    pub fee_growth_outside_0_x128: U256,
    pub fee_growth_outside_1_x128: U256,
    pub initialized: bool,
}

/// Applies a liquidity delta to `tick`, returning whether the tick flipped
/// between initialized and uninitialized.
///
/// A tick crossing from uninitialized to initialized at or below the current
/// tick seeds its `fee_growth_outside` accumulators with the globals, so
/// that growth "outside" is measured relative to this moment.
#[allow(clippy::too_many_arguments)]
pub fn update(
    ticks: &mut BTreeMap<i32, TickInfo>,
    tick: i32,
    tick_current: i32,
    liquidity_delta: i128,
    fee_growth_global_0_x128: U256,
    fee_growth_global_1_x128: U256,
    upper: bool,
    max_liquidity: u128,
) -> Result<bool, PoolError> {
    let info = ticks.entry(tick).or_default();

    let liquidity_gross_before = info.liquidity_gross;
    let liquidity_gross_after = add_delta(liquidity_gross_before, liquidity_delta)?;

    if liquidity_gross_after > max_liquidity {
        return Err(MathError::MaxLiquidityPerTick.into());
    }

    let flipped = (liquidity_gross_after == 0) != (liquidity_gross_before == 0);

    if liquidity_gross_before == 0 {
        if tick <= tick_current {
            info.fee_growth_outside_0_x128 = fee_growth_global_0_x128;
            info.fee_growth_outside_1_x128 = fee_growth_global_1_x128;
        }
        info.initialized = true;
    }

    info.liquidity_gross = liquidity_gross_after;
    info.liquidity_net = if upper {
        info.liquidity_net
            .checked_sub(liquidity_delta)
            .ok_or(MathError::Overflow)?
    } else {
        info.liquidity_net
            .checked_add(liquidity_delta)
            .ok_or(MathError::Overflow)?
    };

    Ok(flipped)
}

/// Removes a tick whose gross liquidity has dropped to zero.
pub fn clear(ticks: &mut BTreeMap<i32, TickInfo>, tick: i32) {
    ticks.remove(&tick);
}

/// Transitions a tick as the price moves across it, flipping the outside
/// accumulators. Returns the tick's net liquidity for the caller to apply.
pub fn cross(
    ticks: &mut BTreeMap<i32, TickInfo>,
    tick: i32,
    fee_growth_global_0_x128: U256,
    fee_growth_global_1_x128: U256,
) -> i128 {
    let info = ticks.entry(tick).or_default();
    info.fee_growth_outside_0_x128 =
        fee_growth_global_0_x128.wrapping_sub(info.fee_growth_outside_0_x128);
    info.fee_growth_outside_1_x128 =
        fee_growth_global_1_x128.wrapping_sub(info.fee_growth_outside_1_x128);
    info.liquidity_net
}

/// Reconstructs the fee growth accumulated inside `[tick_lower, tick_upper)`
/// from the globals and the two boundary ticks' outside accumulators.
/// All subtraction wraps; wrap at 2^256 is expected and harmless.
pub fn fee_growth_inside(
    ticks: &BTreeMap<i32, TickInfo>,
    tick_lower: i32,
    tick_upper: i32,
    tick_current: i32,
    fee_growth_global_0_x128: U256,
    fee_growth_global_1_x128: U256,
) -> (U256, U256) {
    let lower = ticks.get(&tick_lower).cloned().unwrap_or_default();
    let upper = ticks.get(&tick_upper).cloned().unwrap_or_default();

    let (below_0, below_1) = if tick_current >= tick_lower {
        (lower.fee_growth_outside_0_x128, lower.fee_growth_outside_1_x128)
    } else {
        (
            fee_growth_global_0_x128.wrapping_sub(lower.fee_growth_outside_0_x128),
            fee_growth_global_1_x128.wrapping_sub(lower.fee_growth_outside_1_x128),
        )
    };

    let (above_0, above_1) = if tick_current < tick_upper {
        (upper.fee_growth_outside_0_x128, upper.fee_growth_outside_1_x128)
    } else {
        (
            fee_growth_global_0_x128.wrapping_sub(upper.fee_growth_outside_0_x128),
            fee_growth_global_1_x128.wrapping_sub(upper.fee_growth_outside_1_x128),
        )
    };

    (
        fee_growth_global_0_x128
            .wrapping_sub(below_0)
            .wrapping_sub(above_0),
        fee_growth_global_1_x128
            .wrapping_sub(below_1)
            .wrapping_sub(above_1),
    )
}
