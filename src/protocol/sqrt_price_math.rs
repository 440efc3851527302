//! Price/amount relations within a single liquidity range.
//!
//! Rounding discipline follows the reference contract: amounts the pool is
//! owed round up, amounts the pool pays out round down, and next-price
//! computations round in the pool's favor.

use alloy::primitives::{I256, U256};

use crate::errors::{MathError, PoolError};
use crate::protocol::solidity_math::{div_rounding_up, mul_div, mul_div_rounding_up, Q96, RESOLUTION};

/// Largest sqrt price representable on-chain (uint160).
const U160_MAX: U256 = U256::from_limbs([u64::MAX, u64::MAX, u32::MAX as u64, 0]);

/// Next sqrt price from a token0 amount, rounding up.
pub fn get_next_sqrt_price_from_amount_0_rounding_up(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, PoolError> {
    if amount.is_zero() {
        return Ok(sqrt_price_x96);
    }

    let numerator1: U256 = U256::from(liquidity) << RESOLUTION;
    let product: U256 = amount.wrapping_mul(sqrt_price_x96);

    if add {
        if product / amount == sqrt_price_x96 {
            let denominator = numerator1.wrapping_add(product);
            if denominator >= numerator1 {
                return Ok(mul_div_rounding_up(numerator1, sqrt_price_x96, denominator)?);
            }
        }
        Ok(div_rounding_up(numerator1, (numerator1 / sqrt_price_x96) + amount))
    } else {
        if product / amount != sqrt_price_x96 || numerator1 <= product {
            return Err(PoolError::InsufficientReserves);
        }
        let denominator = numerator1 - product;
        Ok(mul_div_rounding_up(numerator1, sqrt_price_x96, denominator)?)
    }
}

/// Next sqrt price from a token1 amount, rounding down.
pub fn get_next_sqrt_price_from_amount_1_rounding_down(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, PoolError> {
    let liquidity = U256::from(liquidity);
    if add {
        let quotient = if amount <= U160_MAX {
            (amount << RESOLUTION) / liquidity
        } else {
            mul_div(amount, Q96, liquidity)?
        };

        let result = sqrt_price_x96
            .checked_add(quotient)
            .ok_or(MathError::Overflow)?;
        if result <= U160_MAX {
            Ok(result)
        } else {
            Err(MathError::Overflow.into())
        }
    } else {
        let quotient = if amount <= U160_MAX {
            div_rounding_up(amount << RESOLUTION, liquidity)
        } else {
            mul_div_rounding_up(amount, Q96, liquidity)?
        };

        if sqrt_price_x96 <= quotient {
            return Err(PoolError::InsufficientReserves);
        }
        Ok(sqrt_price_x96 - quotient)
    }
}

/// token0 amount between two sqrt prices for `liquidity`, optionally rounded
/// up.
pub fn get_amount_0_delta(
    mut sqrt_ratio_a_x96: U256,
    mut sqrt_ratio_b_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, PoolError> {
    if sqrt_ratio_a_x96 > sqrt_ratio_b_x96 {
        (sqrt_ratio_a_x96, sqrt_ratio_b_x96) = (sqrt_ratio_b_x96, sqrt_ratio_a_x96);
    }

    if sqrt_ratio_a_x96.is_zero() {
        return Err(PoolError::SqrtPriceOutOfBounds(sqrt_ratio_a_x96));
    }

    let numerator1 = U256::from(liquidity) << RESOLUTION;
    let numerator2 = sqrt_ratio_b_x96 - sqrt_ratio_a_x96;

    if round_up {
        Ok(div_rounding_up(
            mul_div_rounding_up(numerator1, numerator2, sqrt_ratio_b_x96)?,
            sqrt_ratio_a_x96,
        ))
    } else {
        Ok(mul_div(numerator1, numerator2, sqrt_ratio_b_x96)? / sqrt_ratio_a_x96)
    }
}

/// token1 amount between two sqrt prices for `liquidity`, optionally rounded
/// up.
pub fn get_amount_1_delta(
    mut sqrt_ratio_a_x96: U256,
    mut sqrt_ratio_b_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, PoolError> {
    if sqrt_ratio_a_x96 > sqrt_ratio_b_x96 {
        (sqrt_ratio_a_x96, sqrt_ratio_b_x96) = (sqrt_ratio_b_x96, sqrt_ratio_a_x96);
    }
    let liquidity = U256::from(liquidity);

    if round_up {
        Ok(mul_div_rounding_up(liquidity, sqrt_ratio_b_x96 - sqrt_ratio_a_x96, Q96)?)
    } else {
        Ok(mul_div(liquidity, sqrt_ratio_b_x96 - sqrt_ratio_a_x96, Q96)?)
    }
}

/// Signed token0 delta: positive liquidity rounds against the caller,
/// negative rounds in the caller's favor.
pub fn get_amount_0_delta_signed(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: i128,
) -> Result<I256, PoolError> {
    if liquidity < 0 {
        Ok(-I256::from_raw(get_amount_0_delta(
            sqrt_ratio_a_x96,
            sqrt_ratio_b_x96,
            liquidity.unsigned_abs(),
            false,
        )?))
    } else {
        Ok(I256::from_raw(get_amount_0_delta(
            sqrt_ratio_a_x96,
            sqrt_ratio_b_x96,
            liquidity as u128,
            true,
        )?))
    }
}

/// Signed token1 delta, symmetric with [`get_amount_0_delta_signed`].
pub fn get_amount_1_delta_signed(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: i128,
) -> Result<I256, PoolError> {
    if liquidity < 0 {
        Ok(-I256::from_raw(get_amount_1_delta(
            sqrt_ratio_a_x96,
            sqrt_ratio_b_x96,
            liquidity.unsigned_abs(),
            false,
        )?))
    } else {
        Ok(I256::from_raw(get_amount_1_delta(
            sqrt_ratio_a_x96,
            sqrt_ratio_b_x96,
            liquidity as u128,
            true,
        )?))
    }
}

/// Next sqrt price after paying `amount_in` into the pool.
pub fn get_next_sqrt_price_from_input(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount_in: U256,
    zero_for_one: bool,
) -> Result<U256, PoolError> {
    if sqrt_price_x96.is_zero() {
        return Err(PoolError::NotInitialized);
    }
    if liquidity == 0 {
        return Err(PoolError::ZeroLiquidity);
    }

    if zero_for_one {
        get_next_sqrt_price_from_amount_0_rounding_up(sqrt_price_x96, liquidity, amount_in, true)
    } else {
        get_next_sqrt_price_from_amount_1_rounding_down(sqrt_price_x96, liquidity, amount_in, true)
    }
}

/// Next sqrt price after the pool pays out `amount_out`.
pub fn get_next_sqrt_price_from_output(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount_out: U256,
    zero_for_one: bool,
) -> Result<U256, PoolError> {
    if sqrt_price_x96.is_zero() {
        return Err(PoolError::NotInitialized);
    }
    if liquidity == 0 {
        return Err(PoolError::ZeroLiquidity);
    }

    if zero_for_one {
        get_next_sqrt_price_from_amount_1_rounding_down(sqrt_price_x96, liquidity, amount_out, false)
    } else {
        get_next_sqrt_price_from_amount_0_rounding_up(sqrt_price_x96, liquidity, amount_out, false)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn price_1_1() -> U256 {
        U256::from_str("79228162514264337593543950336").unwrap()
    }

    #[test]
    fn next_price_from_input_rejects_bad_state() {
        let result =
            get_next_sqrt_price_from_input(U256::ZERO, 0, U256::from(100000000000000000u128), false);
        assert!(matches!(result, Err(PoolError::NotInitialized)));

        let result =
            get_next_sqrt_price_from_input(U256::ONE, 0, U256::from(100000000000000000u128), true);
        assert!(matches!(result, Err(PoolError::ZeroLiquidity)));
    }

    #[test]
    fn next_price_from_input_overflow_price() {
        let result = get_next_sqrt_price_from_input(U160_MAX, 1024, U256::from(1024u64), false);
        assert!(matches!(result, Err(PoolError::Math(MathError::Overflow))));
    }

    #[test]
    fn next_price_from_input_cannot_underflow() {
        let huge = U256::from_str(
            "57896044618658097711785492504343953926634992332820282019728792003956564819968",
        )
        .unwrap();
        assert_eq!(get_next_sqrt_price_from_input(U256::ONE, 1, huge, true).unwrap(), U256::ONE);
    }

    #[test]
    fn next_price_from_input_zero_amount_is_identity() {
        assert_eq!(
            get_next_sqrt_price_from_input(price_1_1(), 1e17 as u128, U256::ZERO, true).unwrap(),
            price_1_1()
        );
        assert_eq!(
            get_next_sqrt_price_from_input(price_1_1(), 1e17 as u128, U256::ZERO, false).unwrap(),
            price_1_1()
        );
    }

    #[test]
    fn next_price_from_input_reference_values() {
        // 0.1 token1 in
        assert_eq!(
            get_next_sqrt_price_from_input(
                price_1_1(),
                1e18 as u128,
                U256::from_str("100000000000000000").unwrap(),
                false
            )
            .unwrap(),
            U256::from_str("87150978765690771352898345369").unwrap()
        );
        // 0.1 token0 in
        assert_eq!(
            get_next_sqrt_price_from_input(
                price_1_1(),
                1e18 as u128,
                U256::from_str("100000000000000000").unwrap(),
                true
            )
            .unwrap(),
            U256::from_str("72025602285694852357767227579").unwrap()
        );
        // amount_in > uint96 max, zero_for_one
        assert_eq!(
            get_next_sqrt_price_from_input(
                price_1_1(),
                1e19 as u128,
                U256::from_str("1267650600228229401496703205376").unwrap(),
                true
            )
            .unwrap(),
            U256::from_str("624999999995069620").unwrap()
        );
        // can land on 1 with enough input
        assert_eq!(
            get_next_sqrt_price_from_input(price_1_1(), 1, U256::MAX / U256::from(2u8), true)
                .unwrap(),
            U256::ONE
        );
    }

    #[test]
    fn next_price_from_output_reserve_exhaustion() {
        let price = U256::from_str("20282409603651670423947251286016").unwrap();
        for (amount, zero_for_one) in
            [(4u64, false), (5, false), (262144, true), (262145, true)]
        {
            let result =
                get_next_sqrt_price_from_output(price, 1024, U256::from(amount), zero_for_one);
            assert!(matches!(result, Err(PoolError::InsufficientReserves)));
        }

        assert_eq!(
            get_next_sqrt_price_from_output(price, 1024, U256::from(262143u64), true).unwrap(),
            U256::from_str("77371252455336267181195264").unwrap()
        );
    }

    #[test]
    fn next_price_from_output_reference_values() {
        assert_eq!(
            get_next_sqrt_price_from_output(price_1_1(), 1e18 as u128, U256::from(1e17 as u128), false)
                .unwrap(),
            U256::from_str("88031291682515930659493278152").unwrap()
        );
        assert_eq!(
            get_next_sqrt_price_from_output(price_1_1(), 1e18 as u128, U256::from(1e17 as u128), true)
                .unwrap(),
            U256::from_str("71305346262837903834189555302").unwrap()
        );
    }

    #[test]
    fn amount_0_delta_cases() {
        assert_eq!(get_amount_0_delta(price_1_1(), price_1_1(), 0, true).unwrap(), U256::ZERO);

        let upper = U256::from_str("87150978765690771352898345369").unwrap();
        let up = get_amount_0_delta(price_1_1(), upper, 1e18 as u128, true).unwrap();
        assert_eq!(up, U256::from_str("90909090909090910").unwrap());
        let down = get_amount_0_delta(price_1_1(), upper, 1e18 as u128, false).unwrap();
        assert_eq!(down, up - U256::ONE);

        // prices whose product overflows 256 bits
        let a = U256::from_str("2787593149816327892691964784081045188247552").unwrap();
        let b = U256::from_str("22300745198530623141535718272648361505980416").unwrap();
        let up = get_amount_0_delta(a, b, 1e18 as u128, true).unwrap();
        let down = get_amount_0_delta(a, b, 1e18 as u128, false).unwrap();
        assert_eq!(up, down + U256::ONE);
    }

    #[test]
    fn amount_1_delta_cases() {
        assert_eq!(get_amount_1_delta(price_1_1(), price_1_1(), 0, true).unwrap(), U256::ZERO);

        let upper = U256::from_str("87150978765690771352898345369").unwrap();
        let up = get_amount_1_delta(price_1_1(), upper, 1e18 as u128, true).unwrap();
        assert_eq!(up, U256::from_str("100000000000000000").unwrap());
        let down = get_amount_1_delta(price_1_1(), upper, 1e18 as u128, false).unwrap();
        assert_eq!(down, up - U256::ONE);
    }

    #[test]
    fn signed_deltas_flip_rounding() {
        let upper = U256::from_str("87150978765690771352898345369").unwrap();
        let pos = get_amount_0_delta_signed(price_1_1(), upper, 1e18 as i128).unwrap();
        let neg = get_amount_0_delta_signed(price_1_1(), upper, -(1e18 as i128)).unwrap();
        assert!(pos > I256::ZERO);
        assert!(neg < I256::ZERO);
        // positive rounds up, negative rounds down: |pos| = |neg| + 1
        assert_eq!(pos.into_raw(), (-neg).into_raw() + U256::ONE);

        let pos1 = get_amount_1_delta_signed(price_1_1(), upper, 1e18 as i128).unwrap();
        let neg1 = get_amount_1_delta_signed(price_1_1(), upper, -(1e18 as i128)).unwrap();
        assert_eq!(pos1.into_raw(), (-neg1).into_raw() + U256::ONE);
    }

    #[test]
    fn swap_computation_regression() {
        let sqrt_price =
            U256::from_str("1025574284609383690408304870162715216695788925244").unwrap();
        let liquidity = 50015962439936049619261659728067971248u128;
        let amount_in = U256::from(406u64);

        let sqrt_q =
            get_next_sqrt_price_from_input(sqrt_price, liquidity, amount_in, true).unwrap();
        assert_eq!(
            sqrt_q,
            U256::from_str("1025574284609383582644711336373707553698163132913").unwrap()
        );

        let amount_0 = get_amount_0_delta(sqrt_q, sqrt_price, liquidity, true).unwrap();
        assert_eq!(amount_0, U256::from(406u64));
    }
}
