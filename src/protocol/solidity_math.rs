//! Full-precision multiply-divide.
//!
//! `mul_div` computes `floor(a * b / denominator)` with a 512-bit
//! intermediate product, matching the reference `FullMath` library bit for
//! bit. It is the single most exercised primitive in the engine; every price
//! and fee computation funnels through it.

use alloy::primitives::U256;

use crate::errors::MathError;

pub const RESOLUTION: u8 = 96;

/// 2^96, the Q64.96 scaling factor for sqrt prices.
pub const Q96: U256 = U256::from_limbs([0, 4294967296, 0, 0]);

/// 2^128, the Q128.128 scaling factor for fee growth accumulators.
pub const Q128: U256 = U256::from_limbs([0, 0, 1, 0]);

const U256_TWO: U256 = U256::from_limbs([2, 0, 0, 0]);
const U256_THREE: U256 = U256::from_limbs([3, 0, 0, 0]);

/// Computes `a * b / denominator` with full 256-bit precision, flooring the
/// result. Fails on division by zero or when the quotient does not fit in
/// 256 bits.
pub fn mul_div(a: U256, b: U256, mut denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }

    // 512-bit product as prod1 * 2^256 + prod0.
    let mm = a.mul_mod(b, U256::MAX);
    let mut prod0 = a.wrapping_mul(b);
    let (p1, borrow) = mm.overflowing_sub(prod0);
    let mut prod1 = if borrow { p1.wrapping_sub(U256::ONE) } else { p1 };

    if prod1.is_zero() {
        return Ok(prod0.wrapping_div(denominator));
    }

    if denominator <= prod1 {
        return Err(MathError::Overflow);
    }

    // Subtract the 512-bit remainder so [prod1 prod0] is divisible.
    let remainder = a.mul_mod(b, denominator);
    let (p0, borrow) = prod0.overflowing_sub(remainder);
    prod0 = p0;
    if borrow {
        prod1 = prod1.wrapping_sub(U256::ONE);
    }

    // Factor powers of two out of the denominator.
    let twos = denominator & denominator.wrapping_neg();
    denominator = denominator.wrapping_div(twos);
    prod0 = prod0.wrapping_div(twos);
    let twos_complement = twos
        .wrapping_neg()
        .wrapping_div(twos)
        .wrapping_add(U256::ONE);
    prod0 |= prod1.wrapping_mul(twos_complement);

    // Modular inverse of the (now odd) denominator via Newton iteration,
    // correct to 2^256 after six doublings of precision.
    let mut inverse = U256_THREE.wrapping_mul(denominator) ^ U256_TWO;
    for _ in 0..6 {
        inverse = inverse.wrapping_mul(U256_TWO.wrapping_sub(denominator.wrapping_mul(inverse)));
    }

    Ok(prod0.wrapping_mul(inverse))
}

/// Like [`mul_div`], but rounds up when the division leaves a remainder.
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    let mut result = mul_div(a, b, denominator)?;
    if a.mul_mod(b, denominator) > U256::ZERO {
        if result == U256::MAX {
            return Err(MathError::Overflow);
        }
        result += U256::ONE;
    }
    Ok(result)
}

/// Divides `a` by `b`, rounding up on a non-zero remainder. `b` must be
/// non-zero; all call sites divide by a known-positive quantity.
pub fn div_rounding_up(a: U256, b: U256) -> U256 {
    let (quotient, remainder) = a.div_rem(b);
    if remainder.is_zero() {
        quotient
    } else {
        quotient + U256::ONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_simple() {
        let result = mul_div(U256::from(10u8), U256::from(20u8), U256::from(5u8)).unwrap();
        assert_eq!(result, U256::from(40u8));
    }

    #[test]
    fn mul_div_floors() {
        // 7 * 10 / 8 = 8.75
        let result = mul_div(U256::from(7u8), U256::from(10u8), U256::from(8u8)).unwrap();
        assert_eq!(result, U256::from(8u8));
    }

    #[test]
    fn mul_div_division_by_zero() {
        let result = mul_div(U256::from(10u8), U256::from(20u8), U256::ZERO);
        assert!(matches!(result, Err(MathError::DivisionByZero)));
    }

    #[test]
    fn mul_div_wide_intermediate() {
        // a * b overflows 256 bits but the quotient fits.
        let result = mul_div(U256::MAX, U256::MAX, U256::MAX).unwrap();
        assert_eq!(result, U256::MAX);

        let q128 = U256::from(1u8) << 128;
        let result = mul_div(q128, q128, U256::from(2u8)).unwrap();
        assert_eq!(result, U256::from(1u8) << 255);
    }

    #[test]
    fn mul_div_quotient_overflow() {
        let result = mul_div(U256::MAX, U256::from(2u8), U256::ONE);
        assert!(matches!(result, Err(MathError::Overflow)));
    }

    #[test]
    fn mul_div_rounding_up_exact_and_inexact() {
        assert_eq!(
            mul_div_rounding_up(U256::from(20u8), U256::from(10u8), U256::from(5u8)).unwrap(),
            U256::from(40u8)
        );
        // 7 * 10 / 3 = 23.33..
        assert_eq!(
            mul_div_rounding_up(U256::from(7u8), U256::from(10u8), U256::from(3u8)).unwrap(),
            U256::from(24u8)
        );
    }

    #[test]
    fn mul_div_rounding_up_propagates_overflow() {
        let result = mul_div_rounding_up(U256::MAX, U256::from(2u8), U256::ONE);
        assert!(matches!(result, Err(MathError::Overflow)));
    }

    #[test]
    fn div_rounding_up_cases() {
        assert_eq!(div_rounding_up(U256::from(10u8), U256::from(5u8)), U256::from(2u8));
        assert_eq!(div_rounding_up(U256::from(10u8), U256::from(3u8)), U256::from(4u8));
        assert_eq!(div_rounding_up(U256::MAX, U256::MAX - U256::ONE), U256::from(2u8));
    }

    #[test]
    fn q_constants() {
        assert_eq!(Q96, U256::from(1u8) << 96);
        assert_eq!(Q128, U256::from(1u8) << 128);
    }
}
