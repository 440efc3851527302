//! Position accounting.

use std::collections::BTreeMap;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::errors::PoolError;
use crate::protocol::liquidity_math::add_delta;
use crate::protocol::safe_math::u256_to_u128_truncated;
use crate::protocol::solidity_math::{mul_div, Q128};

/// Identity of a position: owner plus its tick range. Ordered so the
/// position table iterates deterministically.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionKey {
    pub owner: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
}

impl PositionKey {
    pub fn new(owner: impl Into<String>, tick_lower: i32, tick_upper: i32) -> Self {
        Self { owner: owner.into(), tick_lower, tick_upper }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub liquidity: u128,
    pub fee_growth_inside_0_last_x128: U256,
    pub fee_growth_inside_1_last_x128: U256,
    pub tokens_owed_0: u128,
    pub tokens_owed_1: u128,
}

/// Credits accrued fees since the last touch and applies the liquidity
/// delta. A zero delta is a fee poke and is rejected on positions that hold
/// no liquidity.
pub fn update(
    positions: &mut BTreeMap<PositionKey, PositionInfo>,
    key: &PositionKey,
    liquidity_delta: i128,
    fee_growth_inside_0_x128: U256,
    fee_growth_inside_1_x128: U256,
) -> Result<(), PoolError> {
    let info = positions.entry(key.clone()).or_default();

    let liquidity_next = if liquidity_delta == 0 {
        if info.liquidity == 0 {
            return Err(PoolError::ZeroLiquidity);
        }
        info.liquidity
    } else {
        add_delta(info.liquidity, liquidity_delta)?
    };

    // Owed tokens wrap at u128 just like the reference contract's narrowing
    // cast; the owner is expected to collect before that point.
    let owed_0 = u256_to_u128_truncated(mul_div(
        fee_growth_inside_0_x128.wrapping_sub(info.fee_growth_inside_0_last_x128),
        U256::from(info.liquidity),
        Q128,
    )?);
    let owed_1 = u256_to_u128_truncated(mul_div(
        fee_growth_inside_1_x128.wrapping_sub(info.fee_growth_inside_1_last_x128),
        U256::from(info.liquidity),
        Q128,
    )?);

    info.liquidity = liquidity_next;
    info.fee_growth_inside_0_last_x128 = fee_growth_inside_0_x128;
    info.fee_growth_inside_1_last_x128 = fee_growth_inside_1_x128;
    if owed_0 > 0 || owed_1 > 0 {
        info.tokens_owed_0 = info.tokens_owed_0.wrapping_add(owed_0);
        info.tokens_owed_1 = info.tokens_owed_1.wrapping_add(owed_1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> PositionKey {
        PositionKey::new("alice", -60, 60)
    }

    #[test]
    fn create_and_grow_position()  {
        let mut positions = BTreeMap::new();
        update(&mut positions, &key(), 100, U256::ZERO, U256::ZERO).unwrap();
        update(&mut positions, &key(), 50, U256::ZERO, U256::ZERO).unwrap();
        assert_eq!(positions.get(&key()).unwrap().liquidity, 150);
    }

    #[test]
    fn poke_on_empty_position_is_rejected() {
        let mut positions = BTreeMap::new();
        let result = update(&mut positions, &key(), 0, U256::ZERO, U256::ZERO);
        assert!(matches!(result, Err(PoolError::ZeroLiquidity)));
    }

    #[test]
    fn accrues_owed_tokens_from_fee_growth() {
        let mut positions = BTreeMap::new();
        update(&mut positions, &key(), 100, U256::ZERO, U256::ZERO).unwrap();

        // 1.5 Q128 units of growth per unit of liquidity
        let growth = Q128 + (Q128 >> 1);
        update(&mut positions, &key(), 0, growth, U256::ZERO).unwrap();

        let info = positions.get(&key()).unwrap();
        assert_eq!(info.tokens_owed_0, 150);
        assert_eq!(info.tokens_owed_1, 0);
        assert_eq!(info.fee_growth_inside_0_last_x128, growth);
    }

    #[test]
    fn accrual_uses_pre_delta_liquidity() {
        let mut positions = BTreeMap::new();
        update(&mut positions, &key(), 100, U256::ZERO, U256::ZERO).unwrap();
        // growth lands while the position still has 100 units
        update(&mut positions, &key(), 100, Q128, U256::ZERO).unwrap();

        let info = positions.get(&key()).unwrap();
        assert_eq!(info.liquidity, 200);
        assert_eq!(info.tokens_owed_0, 100);
    }

    #[test]
    fn burn_below_zero_is_rejected() {
        let mut positions = BTreeMap::new();
        update(&mut positions, &key(), 100, U256::ZERO, U256::ZERO).unwrap();
        let result = update(&mut positions, &key(), -200, U256::ZERO, U256::ZERO);
        assert!(result.is_err());
    }

    #[test]
    fn keys_order_by_owner_then_range() {
        let mut positions = BTreeMap::new();
        for key in [
            PositionKey::new("bob", 0, 60),
            PositionKey::new("alice", 60, 120),
            PositionKey::new("alice", 0, 60),
        ] {
            update(&mut positions, &key, 1, U256::ZERO, U256::ZERO).unwrap();
        }
        let keys: Vec<_> = positions.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                PositionKey::new("alice", 0, 60),
                PositionKey::new("alice", 60, 120),
                PositionKey::new("bob", 0, 60),
            ]
        );
    }
}
