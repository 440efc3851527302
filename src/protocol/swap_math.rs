//! Single-step swap computation.

use alloy::primitives::{I256, U256};

use crate::errors::PoolError;
use crate::protocol::safe_math::safe_sub_u256;
use crate::protocol::solidity_math::{mul_div, mul_div_rounding_up};
use crate::protocol::sqrt_price_math;

/// Computes one step of a swap within the current liquidity range.
///
/// `amount_remaining > 0` is an exact-in step, `< 0` exact-out. The step
/// stops at whichever comes first: the target price, or exhaustion of the
/// remaining amount. Direction is inferred from the price relationship:
/// `zero_for_one` iff `sqrt_ratio_current >= sqrt_ratio_target`.
///
/// Returns `(sqrt_ratio_next, amount_in, amount_out, fee_amount)`. The fee
/// plus `amount_in` never exceeds `amount_remaining` on an exact-in step.
pub fn compute_swap_step(
    sqrt_ratio_current: U256,
    sqrt_ratio_target: U256,
    liquidity: u128,
    amount_remaining: I256,
    fee_pips: u32,
) -> Result<(U256, U256, U256, U256), PoolError> {
    let zero_for_one = sqrt_ratio_current >= sqrt_ratio_target;
    let exact_in = amount_remaining >= I256::ZERO;
    let sqrt_ratio_next: U256;
    let mut amount_in = U256::ZERO;
    let mut amount_out = U256::ZERO;

    if exact_in {
        let amount_remaining_less_fee = mul_div(
            amount_remaining.into_raw(),
            U256::from(1_000_000 - fee_pips),
            U256::from(1_000_000u32),
        )?;
        amount_in = if zero_for_one {
            sqrt_price_math::get_amount_0_delta(
                sqrt_ratio_target,
                sqrt_ratio_current,
                liquidity,
                true,
            )?
        } else {
            sqrt_price_math::get_amount_1_delta(
                sqrt_ratio_current,
                sqrt_ratio_target,
                liquidity,
                true,
            )?
        };
        if amount_remaining_less_fee >= amount_in {
            sqrt_ratio_next = sqrt_ratio_target;
        } else {
            sqrt_ratio_next = sqrt_price_math::get_next_sqrt_price_from_input(
                sqrt_ratio_current,
                liquidity,
                amount_remaining_less_fee,
                zero_for_one,
            )?;
        }
    } else {
        amount_out = if zero_for_one {
            sqrt_price_math::get_amount_1_delta(
                sqrt_ratio_target,
                sqrt_ratio_current,
                liquidity,
                false,
            )?
        } else {
            sqrt_price_math::get_amount_0_delta(
                sqrt_ratio_current,
                sqrt_ratio_target,
                liquidity,
                false,
            )?
        };
        if amount_remaining.unsigned_abs() > amount_out {
            sqrt_ratio_next = sqrt_ratio_target;
        } else {
            sqrt_ratio_next = sqrt_price_math::get_next_sqrt_price_from_output(
                sqrt_ratio_current,
                liquidity,
                amount_remaining.unsigned_abs(),
                zero_for_one,
            )?;
        }
    }

    let max = sqrt_ratio_target == sqrt_ratio_next;

    if zero_for_one {
        if !(max && exact_in) {
            amount_in = sqrt_price_math::get_amount_0_delta(
                sqrt_ratio_next,
                sqrt_ratio_current,
                liquidity,
                true,
            )?;
        }
        if !(max && !exact_in) {
            amount_out = sqrt_price_math::get_amount_1_delta(
                sqrt_ratio_next,
                sqrt_ratio_current,
                liquidity,
                false,
            )?;
        }
    } else {
        if !(max && exact_in) {
            amount_in = sqrt_price_math::get_amount_1_delta(
                sqrt_ratio_current,
                sqrt_ratio_next,
                liquidity,
                true,
            )?;
        }
        if !(max && !exact_in) {
            amount_out = sqrt_price_math::get_amount_0_delta(
                sqrt_ratio_current,
                sqrt_ratio_next,
                liquidity,
                false,
            )?;
        }
    }

    // Exact-out never pays out more than requested.
    if !exact_in && amount_out > amount_remaining.unsigned_abs() {
        amount_out = amount_remaining.unsigned_abs();
    }

    let fee_amount = if exact_in && sqrt_ratio_next != sqrt_ratio_target {
        // The step ended on amount exhaustion; the leftover is the fee.
        safe_sub_u256(amount_remaining.unsigned_abs(), amount_in)?
    } else {
        mul_div_rounding_up(amount_in, U256::from(fee_pips), U256::from(1_000_000 - fee_pips))?
    };

    Ok((sqrt_ratio_next, amount_in, amount_out, fee_amount))
}
