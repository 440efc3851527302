//! Checked arithmetic on the alloy integer types.
//!
//! Every helper returns a [`MathError`] instead of wrapping or panicking, so
//! callers can propagate overflow out of the engine with `?`.

use alloy::primitives::{I256, U256};

use crate::errors::MathError;

pub fn safe_add_u256(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

pub fn safe_sub_u256(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_sub(b).ok_or(MathError::Overflow)
}

pub fn safe_mul_u256(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_mul(b).ok_or(MathError::Overflow)
}

pub fn safe_div_u256(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    a.checked_div(b).ok_or(MathError::Overflow)
}

pub fn safe_add_i256(a: I256, b: I256) -> Result<I256, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

pub fn safe_sub_i256(a: I256, b: I256) -> Result<I256, MathError> {
    a.checked_sub(b).ok_or(MathError::Overflow)
}

/// Keeps the low 128 bits, discarding the rest.
///
/// Fee accounting truncates to `u128` exactly like the reference contract's
/// narrowing cast, so overflow of owed tokens wraps rather than failing.
pub fn u256_to_u128_truncated(x: U256) -> u128 {
    let limbs = x.as_limbs();
    (limbs[0] as u128) | ((limbs[1] as u128) << 64)
}
