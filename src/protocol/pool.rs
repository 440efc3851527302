//! The pool engine: pure state plus the mint/burn/swap/collect operations.
//!
//! Operations mutate a scratch copy of the state and commit it only on
//! success, so a failed call leaves the pool exactly as it was. Every
//! successful mutating call stamps the state with a fresh id.

use std::collections::BTreeMap;

use alloy::primitives::{Sign, I256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

use crate::errors::{MathError, PoolError};
use crate::protocol::liquidity_math::add_delta;
use crate::protocol::position::{self, PositionInfo, PositionKey};
use crate::protocol::safe_math::{
    safe_add_i256, safe_add_u256, safe_sub_i256, u256_to_u128_truncated,
};
use crate::protocol::solidity_math::{mul_div, Q128};
use crate::protocol::sqrt_price_math::{get_amount_0_delta_signed, get_amount_1_delta_signed};
use crate::protocol::swap_math::compute_swap_step;
use crate::protocol::tick::{self, TickInfo};
use crate::protocol::tick_bitmap;
use crate::protocol::tick_math::{
    get_sqrt_ratio_at_tick, get_tick_at_sqrt_ratio, MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO,
    MIN_TICK,
};

/// Immutable pool parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub token0: String,
    pub token1: String,
    /// Fee in hundredths of a bip (3000 = 0.3%).
    pub fee_pips: u32,
    pub tick_spacing: i32,
    /// Protocol fee denominators packed like the reference contract's
    /// `feeProtocol` (low nibble token0, high nibble token1). Zero disables
    /// the split, and nothing in this crate sets it.
    pub fee_protocol: u8,
    pub max_liquidity_per_tick: u128,
}

impl PoolConfig {
    pub fn new(
        token0: impl Into<String>,
        token1: impl Into<String>,
        fee_pips: u32,
        tick_spacing: i32,
    ) -> Result<Self, PoolError> {
        if tick_spacing <= 0 || tick_spacing > MAX_TICK {
            return Err(PoolError::InvalidTickSpacing(tick_spacing));
        }
        Ok(Self {
            token0: token0.into(),
            token1: token1.into(),
            fee_pips,
            tick_spacing,
            fee_protocol: 0,
            max_liquidity_per_tick: max_liquidity_per_tick(tick_spacing),
        })
    }
}

/// Maximum `liquidity_gross` a single tick may carry, spreading the u128
/// range over every usable spacing-aligned tick.
pub fn max_liquidity_per_tick(tick_spacing: i32) -> u128 {
    let min_tick = (MIN_TICK / tick_spacing) * tick_spacing;
    let max_tick = (MAX_TICK / tick_spacing) * tick_spacing;
    let num_ticks = ((max_tick - min_tick) / tick_spacing) as u128 + 1;
    u128::MAX / num_ticks
}

/// The mutable state of one pool at one instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolState {
    pub id: Uuid,
    pub sqrt_price_x96: U256,
    pub tick_current: i32,
    pub liquidity: u128,
    pub fee_growth_global_0_x128: U256,
    pub fee_growth_global_1_x128: U256,
    pub protocol_fees_0: u128,
    pub protocol_fees_1: u128,
    pub ticks: BTreeMap<i32, TickInfo>,
    pub tick_bitmap: BTreeMap<i16, U256>,
    pub positions: BTreeMap<PositionKey, PositionInfo>,
    pub snapshot: Option<Snapshot>,
}

impl PoolState {
    /// Uninitialized state; `sqrt_price_x96 == 0` until `initialize`.
    pub fn blank() -> Self {
        Self {
            id: Uuid::new_v4(),
            sqrt_price_x96: U256::ZERO,
            tick_current: 0,
            liquidity: 0,
            fee_growth_global_0_x128: U256::ZERO,
            fee_growth_global_1_x128: U256::ZERO,
            protocol_fees_0: 0,
            protocol_fees_1: 0,
            ticks: BTreeMap::new(),
            tick_bitmap: BTreeMap::new(),
            positions: BTreeMap::new(),
            snapshot: None,
        }
    }
}

/// A durable, by-value copy of a pool state. Shares no mutable structure
/// with the live pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub id: Uuid,
    pub description: String,
    pub config: PoolConfig,
    pub sqrt_price_x96: U256,
    pub tick_current: i32,
    pub liquidity: u128,
    pub fee_growth_global_0_x128: U256,
    pub fee_growth_global_1_x128: U256,
    pub ticks: BTreeMap<i32, TickInfo>,
    pub tick_bitmap: BTreeMap<i16, U256>,
    pub positions: BTreeMap<PositionKey, PositionInfo>,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Captures the given state under a fresh snapshot id.
    pub fn capture(description: impl Into<String>, config: &PoolConfig, state: &PoolState) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            config: config.clone(),
            sqrt_price_x96: state.sqrt_price_x96,
            tick_current: state.tick_current,
            liquidity: state.liquidity,
            fee_growth_global_0_x128: state.fee_growth_global_0_x128,
            fee_growth_global_1_x128: state.fee_growth_global_1_x128,
            ticks: state.ticks.clone(),
            tick_bitmap: state.tick_bitmap.clone(),
            positions: state.positions.clone(),
            created_at: Utc::now(),
        }
    }

    /// Rebuilds a live state carrying this snapshot's id.
    pub fn restore(&self) -> PoolState {
        PoolState {
            id: self.id,
            sqrt_price_x96: self.sqrt_price_x96,
            tick_current: self.tick_current,
            liquidity: self.liquidity,
            fee_growth_global_0_x128: self.fee_growth_global_0_x128,
            fee_growth_global_1_x128: self.fee_growth_global_1_x128,
            protocol_fees_0: 0,
            protocol_fees_1: 0,
            ticks: self.ticks.clone(),
            tick_bitmap: self.tick_bitmap.clone(),
            positions: self.positions.clone(),
            snapshot: Some(self.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorePool {
    config: PoolConfig,
    state: PoolState,
}

impl CorePool {
    pub fn new(config: PoolConfig) -> Self {
        Self { config, state: PoolState::blank() }
    }

    pub fn from_parts(config: PoolConfig, state: PoolState) -> Self {
        Self { config, state }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn state(&self) -> &PoolState {
        &self.state
    }

    pub(crate) fn replace_state(&mut self, state: PoolState) {
        self.state = state;
    }

    pub(crate) fn state_mut(&mut self) -> &mut PoolState {
        &mut self.state
    }

    fn ensure_initialized(&self) -> Result<(), PoolError> {
        if self.state.sqrt_price_x96.is_zero() {
            return Err(PoolError::NotInitialized);
        }
        Ok(())
    }

    fn check_ticks(&self, tick_lower: i32, tick_upper: i32) -> Result<(), PoolError> {
        if tick_lower >= tick_upper {
            return Err(PoolError::TickOrder { lower: tick_lower, upper: tick_upper });
        }
        if tick_lower < MIN_TICK {
            return Err(PoolError::TickOutOfRange(tick_lower));
        }
        if tick_upper > MAX_TICK {
            return Err(PoolError::TickOutOfRange(tick_upper));
        }
        let spacing = self.config.tick_spacing;
        if tick_lower % spacing != 0 {
            return Err(PoolError::TickMisaligned { tick: tick_lower, spacing });
        }
        if tick_upper % spacing != 0 {
            return Err(PoolError::TickMisaligned { tick: tick_upper, spacing });
        }
        Ok(())
    }

    /// Sets the starting price. Fails if the pool already has one.
    pub fn initialize(&mut self, sqrt_price_x96: U256) -> Result<(), PoolError> {
        if !self.state.sqrt_price_x96.is_zero() {
            return Err(PoolError::AlreadyInitialized);
        }
        let tick = get_tick_at_sqrt_ratio(sqrt_price_x96)?;
        self.state.sqrt_price_x96 = sqrt_price_x96;
        self.state.tick_current = tick;
        self.state.id = Uuid::new_v4();
        trace!(%sqrt_price_x96, tick, "initialize");
        Ok(())
    }

    /// Adds liquidity to a position. Returns the token amounts the caller
    /// owes the pool.
    pub fn mint(
        &mut self,
        owner: &str,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
    ) -> Result<(U256, U256), PoolError> {
        self.ensure_initialized()?;
        self.check_ticks(tick_lower, tick_upper)?;
        if amount == 0 {
            return Err(PoolError::ZeroLiquidity);
        }
        // Anything beyond i128 cannot fit a single tick either.
        let delta =
            i128::try_from(amount).map_err(|_| MathError::MaxLiquidityPerTick)?;

        let mut next = self.state.clone();
        let key = PositionKey::new(owner, tick_lower, tick_upper);
        let (amount0, amount1) = Self::modify_position(&self.config, &mut next, &key, delta)?;
        next.id = Uuid::new_v4();
        self.state = next;
        trace!(owner, tick_lower, tick_upper, amount, %amount0, %amount1, "mint");
        Ok((amount0.into_raw(), amount1.into_raw()))
    }

    /// Removes liquidity from a position, crediting the freed token amounts
    /// to the position's owed balances. `amount == 0` is a fee poke.
    pub fn burn(
        &mut self,
        owner: &str,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
    ) -> Result<(U256, U256), PoolError> {
        self.ensure_initialized()?;
        self.check_ticks(tick_lower, tick_upper)?;
        let delta = i128::try_from(amount).map_err(|_| MathError::LiquiditySub)?;

        let mut next = self.state.clone();
        let key = PositionKey::new(owner, tick_lower, tick_upper);
        let (amount0, amount1) = Self::modify_position(&self.config, &mut next, &key, -delta)?;
        let amount0 = (-amount0).into_raw();
        let amount1 = (-amount1).into_raw();

        if !amount0.is_zero() || !amount1.is_zero() {
            if let Some(info) = next.positions.get_mut(&key) {
                info.tokens_owed_0 =
                    info.tokens_owed_0.wrapping_add(u256_to_u128_truncated(amount0));
                info.tokens_owed_1 =
                    info.tokens_owed_1.wrapping_add(u256_to_u128_truncated(amount1));
            }
        }

        next.id = Uuid::new_v4();
        self.state = next;
        trace!(owner, tick_lower, tick_upper, amount, %amount0, %amount1, "burn");
        Ok((amount0, amount1))
    }

    /// Withdraws owed tokens, capping each request at the owed balance.
    pub fn collect(
        &mut self,
        owner: &str,
        tick_lower: i32,
        tick_upper: i32,
        amount0_requested: u128,
        amount1_requested: u128,
    ) -> Result<(u128, u128), PoolError> {
        self.ensure_initialized()?;
        let key = PositionKey::new(owner, tick_lower, tick_upper);

        let mut next = self.state.clone();
        let (amount0, amount1) = match next.positions.get_mut(&key) {
            Some(info) => {
                let amount0 = amount0_requested.min(info.tokens_owed_0);
                let amount1 = amount1_requested.min(info.tokens_owed_1);
                info.tokens_owed_0 -= amount0;
                info.tokens_owed_1 -= amount1;
                (amount0, amount1)
            }
            None => (0, 0),
        };
        next.id = Uuid::new_v4();
        self.state = next;
        trace!(owner, tick_lower, tick_upper, amount0, amount1, "collect");
        Ok((amount0, amount1))
    }

    fn modify_position(
        config: &PoolConfig,
        state: &mut PoolState,
        key: &PositionKey,
        liquidity_delta: i128,
    ) -> Result<(I256, I256), PoolError> {
        let flipped_lower = tick::update(
            &mut state.ticks,
            key.tick_lower,
            state.tick_current,
            liquidity_delta,
            state.fee_growth_global_0_x128,
            state.fee_growth_global_1_x128,
            false,
            config.max_liquidity_per_tick,
        )?;
        let flipped_upper = tick::update(
            &mut state.ticks,
            key.tick_upper,
            state.tick_current,
            liquidity_delta,
            state.fee_growth_global_0_x128,
            state.fee_growth_global_1_x128,
            true,
            config.max_liquidity_per_tick,
        )?;

        if flipped_lower {
            tick_bitmap::flip_tick(&mut state.tick_bitmap, key.tick_lower, config.tick_spacing)?;
        }
        if flipped_upper {
            tick_bitmap::flip_tick(&mut state.tick_bitmap, key.tick_upper, config.tick_spacing)?;
        }

        let (inside_0, inside_1) = tick::fee_growth_inside(
            &state.ticks,
            key.tick_lower,
            key.tick_upper,
            state.tick_current,
            state.fee_growth_global_0_x128,
            state.fee_growth_global_1_x128,
        );
        position::update(&mut state.positions, key, liquidity_delta, inside_0, inside_1)?;

        if liquidity_delta < 0 {
            if flipped_lower {
                tick::clear(&mut state.ticks, key.tick_lower);
            }
            if flipped_upper {
                tick::clear(&mut state.ticks, key.tick_upper);
            }
        }

        let mut amount0 = I256::ZERO;
        let mut amount1 = I256::ZERO;
        if liquidity_delta != 0 {
            if state.tick_current < key.tick_lower {
                // Range entirely above the current price: token0 only.
                amount0 = get_amount_0_delta_signed(
                    get_sqrt_ratio_at_tick(key.tick_lower)?,
                    get_sqrt_ratio_at_tick(key.tick_upper)?,
                    liquidity_delta,
                )?;
            } else if state.tick_current < key.tick_upper {
                amount0 = get_amount_0_delta_signed(
                    state.sqrt_price_x96,
                    get_sqrt_ratio_at_tick(key.tick_upper)?,
                    liquidity_delta,
                )?;
                amount1 = get_amount_1_delta_signed(
                    get_sqrt_ratio_at_tick(key.tick_lower)?,
                    state.sqrt_price_x96,
                    liquidity_delta,
                )?;
                state.liquidity = add_delta(state.liquidity, liquidity_delta)?;
            } else {
                // Range entirely below the current price: token1 only.
                amount1 = get_amount_1_delta_signed(
                    get_sqrt_ratio_at_tick(key.tick_lower)?,
                    get_sqrt_ratio_at_tick(key.tick_upper)?,
                    liquidity_delta,
                )?;
            }
        }

        Ok((amount0, amount1))
    }

    /// Executes a swap. Positive amounts flow into the pool, negative out.
    ///
    /// `amount_specified > 0` is exact-in, `< 0` exact-out. With no explicit
    /// limit the swap may run to the edge of the price range. A limit equal
    /// to the current price is a no-op returning `(0, 0)`, as is
    /// `amount_specified == 0`.
    pub fn swap(
        &mut self,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: Option<U256>,
    ) -> Result<(I256, I256), PoolError> {
        self.ensure_initialized()?;
        if amount_specified.is_zero() {
            return Ok((I256::ZERO, I256::ZERO));
        }

        let price_limit = match sqrt_price_limit_x96 {
            Some(limit) => limit,
            None if zero_for_one => MIN_SQRT_RATIO + U256::ONE,
            None => MAX_SQRT_RATIO - U256::ONE,
        };
        if zero_for_one {
            if price_limit > self.state.sqrt_price_x96 || price_limit <= MIN_SQRT_RATIO {
                return Err(PoolError::BadPriceLimit(price_limit));
            }
        } else if price_limit < self.state.sqrt_price_x96 || price_limit >= MAX_SQRT_RATIO {
            return Err(PoolError::BadPriceLimit(price_limit));
        }
        if price_limit == self.state.sqrt_price_x96 {
            return Ok((I256::ZERO, I256::ZERO));
        }

        let exact_input = amount_specified > I256::ZERO;
        let fee_protocol = if zero_for_one {
            self.config.fee_protocol % 16
        } else {
            self.config.fee_protocol >> 4
        };

        let mut next = self.state.clone();
        let mut amount_remaining = amount_specified;
        let mut amount_calculated = I256::ZERO;
        let mut sqrt_price = next.sqrt_price_x96;
        let mut tick = next.tick_current;
        let mut liquidity = next.liquidity;
        let mut fee_growth_global = if zero_for_one {
            next.fee_growth_global_0_x128
        } else {
            next.fee_growth_global_1_x128
        };
        let mut protocol_fee: u128 = 0;

        while !amount_remaining.is_zero() && sqrt_price != price_limit {
            let step_start = sqrt_price;
            let (mut next_tick, initialized) = tick_bitmap::next_initialized_tick_within_one_word(
                &next.tick_bitmap,
                tick,
                self.config.tick_spacing,
                zero_for_one,
            )?;
            next_tick = next_tick.clamp(MIN_TICK, MAX_TICK);

            let sqrt_price_next = get_sqrt_ratio_at_tick(next_tick)?;
            let target = if (zero_for_one && sqrt_price_next < price_limit)
                || (!zero_for_one && sqrt_price_next > price_limit)
            {
                price_limit
            } else {
                sqrt_price_next
            };

            let (price_after, amount_in, amount_out, mut fee_amount) = compute_swap_step(
                sqrt_price,
                target,
                liquidity,
                amount_remaining,
                self.config.fee_pips,
            )?;
            sqrt_price = price_after;

            let step_in_plus_fee =
                I256::checked_from_sign_and_abs(Sign::Positive, safe_add_u256(amount_in, fee_amount)?)
                    .ok_or(MathError::Overflow)?;
            let step_out = I256::checked_from_sign_and_abs(Sign::Positive, amount_out)
                .ok_or(MathError::Overflow)?;
            if exact_input {
                amount_remaining = safe_sub_i256(amount_remaining, step_in_plus_fee)?;
                amount_calculated = safe_sub_i256(amount_calculated, step_out)?;
            } else {
                amount_remaining = safe_add_i256(amount_remaining, step_out)?;
                amount_calculated = safe_add_i256(amount_calculated, step_in_plus_fee)?;
            }

            if fee_protocol > 0 {
                let delta = fee_amount / U256::from(fee_protocol);
                fee_amount -= delta;
                protocol_fee = protocol_fee.wrapping_add(u256_to_u128_truncated(delta));
            }

            if liquidity > 0 {
                fee_growth_global = fee_growth_global
                    .wrapping_add(mul_div(fee_amount, Q128, U256::from(liquidity))?);
            }

            if sqrt_price == sqrt_price_next {
                if initialized {
                    let mut liquidity_net = tick::cross(
                        &mut next.ticks,
                        next_tick,
                        if zero_for_one { fee_growth_global } else { next.fee_growth_global_0_x128 },
                        if zero_for_one { next.fee_growth_global_1_x128 } else { fee_growth_global },
                    );
                    if zero_for_one {
                        liquidity_net = -liquidity_net;
                    }
                    liquidity = add_delta(liquidity, liquidity_net)?;
                }
                tick = if zero_for_one { next_tick - 1 } else { next_tick };
            } else if sqrt_price != step_start {
                tick = get_tick_at_sqrt_ratio(sqrt_price)?;
            }
        }

        next.sqrt_price_x96 = sqrt_price;
        next.tick_current = tick;
        next.liquidity = liquidity;
        if zero_for_one {
            next.fee_growth_global_0_x128 = fee_growth_global;
            next.protocol_fees_0 = next.protocol_fees_0.wrapping_add(protocol_fee);
        } else {
            next.fee_growth_global_1_x128 = fee_growth_global;
            next.protocol_fees_1 = next.protocol_fees_1.wrapping_add(protocol_fee);
        }

        let (amount0, amount1) = if zero_for_one == exact_input {
            (safe_sub_i256(amount_specified, amount_remaining)?, amount_calculated)
        } else {
            (amount_calculated, safe_sub_i256(amount_specified, amount_remaining)?)
        };

        next.id = Uuid::new_v4();
        self.state = next;
        trace!(zero_for_one, %amount_specified, %amount0, %amount1, tick, "swap");
        Ok((amount0, amount1))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    fn usdc_weth_config() -> PoolConfig {
        PoolConfig::new("USDC", "WETH", 3000, 60).unwrap()
    }

    fn spot_price() -> U256 {
        U256::from_str_radix("43efef20f018fdc58e7a5cf0416a", 16).unwrap()
    }

    fn price_at_tick_0() -> U256 {
        U256::from_str("79228162514264337593543950336").unwrap()
    }

    fn initialized_pool() -> CorePool {
        let mut pool = CorePool::new(usdc_weth_config());
        pool.initialize(spot_price()).unwrap();
        pool
    }

    /// Pool at price 1.0 with one full-range position, the workhorse for
    /// swap behavior tests.
    fn full_range_pool(liquidity: u128) -> CorePool {
        let mut pool = CorePool::new(usdc_weth_config());
        pool.initialize(price_at_tick_0()).unwrap();
        pool.mint("lp", -887220, 887220, liquidity).unwrap();
        pool
    }

    fn net_liquidity_at_or_below(pool: &CorePool, tick: i32) -> i128 {
        pool.state()
            .ticks
            .iter()
            .filter(|(t, _)| **t <= tick)
            .map(|(_, info)| info.liquidity_net)
            .sum()
    }

    #[rstest]
    #[case(10, 1917569901783203986719870431555990u128)]
    #[case(60, 11505743598341114571880798222544994u128)]
    #[case(200, 38350317471085141830651933667504588u128)]
    fn max_liquidity_per_tick_reference_values(#[case] spacing: i32, #[case] expected: u128) {
        assert_eq!(max_liquidity_per_tick(spacing), expected);
    }

    #[test]
    fn initialize_derives_the_current_tick() {
        let pool = initialized_pool();
        assert_eq!(pool.state().tick_current, 195285);
        assert_eq!(pool.state().liquidity, 0);
    }

    #[test]
    fn initialize_boundary_prices() {
        let mut pool = CorePool::new(usdc_weth_config());
        pool.initialize(MIN_SQRT_RATIO).unwrap();
        assert_eq!(pool.state().tick_current, MIN_TICK);

        let mut pool = CorePool::new(usdc_weth_config());
        pool.initialize(MAX_SQRT_RATIO - U256::ONE).unwrap();
        assert_eq!(pool.state().tick_current, MAX_TICK - 1);

        let mut pool = CorePool::new(usdc_weth_config());
        assert!(matches!(
            pool.initialize(MIN_SQRT_RATIO - U256::ONE),
            Err(PoolError::SqrtPriceOutOfBounds(_))
        ));
        assert!(matches!(
            pool.initialize(MAX_SQRT_RATIO),
            Err(PoolError::SqrtPriceOutOfBounds(_))
        ));
    }

    #[test]
    fn initialize_twice_fails() {
        let mut pool = initialized_pool();
        assert!(matches!(
            pool.initialize(spot_price()),
            Err(PoolError::AlreadyInitialized)
        ));
    }

    #[test]
    fn operations_require_initialization() {
        let mut pool = CorePool::new(usdc_weth_config());
        assert!(matches!(
            pool.mint("alice", -60, 60, 1000),
            Err(PoolError::NotInitialized)
        ));
        assert!(matches!(
            pool.swap(true, I256::exp10(6), None),
            Err(PoolError::NotInitialized)
        ));
    }

    #[test]
    fn mint_records_the_position() {
        let mut pool = initialized_pool();
        let amount = 10_860_507_277_202u128;
        pool.mint("user", 192180, 193380, amount).unwrap();

        let key = PositionKey::new("user", 192180, 193380);
        assert_eq!(pool.state().positions.get(&key).unwrap().liquidity, amount);
        // range sits below the current tick, so the pool owes only token1
        assert!(pool.state().ticks.contains_key(&192180));
        assert!(pool.state().ticks.contains_key(&193380));
        assert_eq!(pool.state().liquidity, 0);
    }

    #[test]
    fn mint_validation_errors() {
        let mut pool = initialized_pool();
        assert!(matches!(
            pool.mint("a", 60, 60, 1),
            Err(PoolError::TickOrder { .. })
        ));
        assert!(matches!(
            pool.mint("a", -887280, 0, 1),
            Err(PoolError::TickOutOfRange(_))
        ));
        assert!(matches!(
            pool.mint("a", -61, 60, 1),
            Err(PoolError::TickMisaligned { .. })
        ));
        assert!(matches!(pool.mint("a", -60, 60, 0), Err(PoolError::ZeroLiquidity)));
    }

    #[test]
    fn mint_max_u128_rejected_by_per_tick_cap() {
        let mut pool = initialized_pool();
        let result = pool.mint("a", -887220, 887220, u128::MAX);
        assert!(matches!(
            result,
            Err(PoolError::Math(MathError::MaxLiquidityPerTick))
        ));
        // failed mint leaves no residue
        assert!(pool.state().ticks.is_empty());
        assert!(pool.state().tick_bitmap.is_empty());
        assert!(pool.state().positions.is_empty());
    }

    #[test]
    fn failed_mint_preserves_state_and_id() {
        let mut pool = initialized_pool();
        let before = pool.state().clone();
        let _ = pool.mint("a", -61, 60, 10);
        assert_eq!(*pool.state(), before);
    }

    #[test]
    fn in_range_mint_activates_liquidity() {
        let pool = full_range_pool(2_000_000_000_000_000_000u128);
        assert_eq!(pool.state().liquidity, 2_000_000_000_000_000_000);
        assert_eq!(
            net_liquidity_at_or_below(&pool, pool.state().tick_current),
            pool.state().liquidity as i128
        );
    }

    #[test]
    fn mint_burn_round_trip_within_one_wei() {
        let liquidity = 2_000_000_000_000_000_000u128;
        let mut pool = full_range_pool(1_000_000_000_000u128);
        let blank = pool.state().clone();

        let (mint0, mint1) = pool.mint("alice", -600, 600, liquidity).unwrap();
        let (burn0, burn1) = pool.burn("alice", -600, 600, liquidity).unwrap();
        assert!(mint0 - burn0 <= U256::ONE);
        assert!(mint1 - burn1 <= U256::ONE);

        let (collected0, collected1) = pool
            .collect("alice", -600, 600, u128::MAX, u128::MAX)
            .unwrap();
        assert_eq!(U256::from(collected0), burn0);
        assert_eq!(U256::from(collected1), burn1);

        // tick table, bitmap, and liquidity are back to the pre-mint state
        assert_eq!(pool.state().ticks, blank.ticks);
        assert_eq!(pool.state().tick_bitmap, blank.tick_bitmap);
        assert_eq!(pool.state().liquidity, blank.liquidity);
    }

    #[test]
    fn burn_missing_position_fails() {
        let mut pool = initialized_pool();
        assert!(pool.burn("ghost", -60, 60, 10).is_err());
        assert!(matches!(pool.burn("ghost", -60, 60, 0), Err(PoolError::ZeroLiquidity)));
    }

    #[test]
    fn collect_caps_at_owed() {
        let mut pool = full_range_pool(1_000_000_000_000u128);
        pool.mint("alice", -600, 600, 1_000_000u128).unwrap();
        pool.burn("alice", -600, 600, 1_000_000u128).unwrap();
        let owed = pool
            .state()
            .positions
            .get(&PositionKey::new("alice", -600, 600))
            .unwrap()
            .tokens_owed_0;

        let (got0, _) = pool.collect("alice", -600, 600, 5, u128::MAX).unwrap();
        assert_eq!(got0, owed.min(5));
        let (rest0, _) = pool.collect("alice", -600, 600, u128::MAX, 0).unwrap();
        assert_eq!(rest0, owed - got0);

        // nothing left and unknown positions yield zero
        assert_eq!(pool.collect("alice", -600, 600, u128::MAX, 0).unwrap().0, 0);
        assert_eq!(pool.collect("bob", -600, 600, 1, 1).unwrap(), (0, 0));
    }

    #[test]
    fn swap_zero_amount_is_a_noop() {
        let mut pool = full_range_pool(2_000_000_000_000_000_000u128);
        let before = pool.state().clone();
        assert_eq!(pool.swap(true, I256::ZERO, None).unwrap(), (I256::ZERO, I256::ZERO));
        assert_eq!(*pool.state(), before);
    }

    #[test]
    fn swap_limit_at_current_price_is_a_noop() {
        let mut pool = full_range_pool(2_000_000_000_000_000_000u128);
        let before = pool.state().clone();
        let current = pool.state().sqrt_price_x96;
        assert_eq!(
            pool.swap(true, I256::exp10(18), Some(current)).unwrap(),
            (I256::ZERO, I256::ZERO)
        );
        assert_eq!(*pool.state(), before);
    }

    #[test]
    fn swap_rejects_wrong_side_limits() {
        let mut pool = full_range_pool(2_000_000_000_000_000_000u128);
        let current = pool.state().sqrt_price_x96;
        assert!(matches!(
            pool.swap(true, I256::exp10(18), Some(current + U256::ONE)),
            Err(PoolError::BadPriceLimit(_))
        ));
        assert!(matches!(
            pool.swap(false, I256::exp10(18), Some(current - U256::ONE)),
            Err(PoolError::BadPriceLimit(_))
        ));
        assert!(matches!(
            pool.swap(true, I256::exp10(18), Some(MIN_SQRT_RATIO)),
            Err(PoolError::BadPriceLimit(_))
        ));
        assert!(matches!(
            pool.swap(false, I256::exp10(18), Some(MAX_SQRT_RATIO)),
            Err(PoolError::BadPriceLimit(_))
        ));
    }

    #[test]
    fn exact_in_swap_matches_single_step_math() {
        let liquidity = 2_000_000_000_000_000_000u128;
        let mut pool = full_range_pool(liquidity);
        let price_before = pool.state().sqrt_price_x96;

        let amount_in = I256::exp10(15);
        let (amount0, amount1) = pool.swap(true, amount_in, None).unwrap();

        // the pool received exactly the specified input
        assert_eq!(amount0, amount_in);
        assert!(amount1 < I256::ZERO);

        // reproduce the single step by hand
        let (expected_price, step_in, step_out, step_fee) = compute_swap_step(
            price_before,
            MIN_SQRT_RATIO + U256::ONE,
            liquidity,
            amount_in,
            3000,
        )
        .unwrap();
        assert_eq!(pool.state().sqrt_price_x96, expected_price);
        assert_eq!(amount0.into_raw(), step_in + step_fee);
        assert_eq!((-amount1).into_raw(), step_out);
        assert_eq!(
            pool.state().tick_current,
            get_tick_at_sqrt_ratio(expected_price).unwrap()
        );

        // fee growth advanced by fee * Q128 / L
        assert_eq!(
            pool.state().fee_growth_global_0_x128,
            mul_div(step_fee, Q128, U256::from(liquidity)).unwrap()
        );
        assert_eq!(pool.state().fee_growth_global_1_x128, U256::ZERO);
    }

    #[test]
    fn exact_out_swap_delivers_requested_output() {
        let liquidity = 2_000_000_000_000_000_000u128;
        let mut pool = full_range_pool(liquidity);

        let amount_out = I256::exp10(15);
        let (amount0, amount1) = pool.swap(true, -amount_out, None).unwrap();
        assert_eq!(amount1, -amount_out);
        assert!(amount0 > I256::ZERO);
    }

    #[test]
    fn one_for_zero_swap_moves_price_up() {
        let liquidity = 2_000_000_000_000_000_000u128;
        let mut pool = full_range_pool(liquidity);
        let price_before = pool.state().sqrt_price_x96;

        let (amount0, amount1) = pool.swap(false, I256::exp10(15), None).unwrap();
        assert_eq!(amount1, I256::exp10(15));
        assert!(amount0 < I256::ZERO);
        assert!(pool.state().sqrt_price_x96 > price_before);
        assert!(pool.state().fee_growth_global_1_x128 > U256::ZERO);
        assert_eq!(pool.state().fee_growth_global_0_x128, U256::ZERO);
    }

    #[test]
    fn swap_stops_at_price_limit() {
        let liquidity = 2_000_000_000_000_000_000u128;
        let mut pool = full_range_pool(liquidity);
        let price_before = pool.state().sqrt_price_x96;
        let limit = get_sqrt_ratio_at_tick(-60).unwrap();

        let (amount0, amount1) = pool.swap(true, I256::exp10(30), Some(limit)).unwrap();
        assert_eq!(pool.state().sqrt_price_x96, limit);
        // partial fill: far less than specified was consumed
        assert!(amount0 < I256::exp10(30));

        // no initialized tick sits between the start and the limit, so the
        // whole traversal is one step
        let (price_after, step_in, step_out, step_fee) =
            compute_swap_step(price_before, limit, liquidity, I256::exp10(30), 3000).unwrap();
        assert_eq!(price_after, limit);
        assert_eq!(amount0.into_raw(), step_in + step_fee);
        assert_eq!((-amount1).into_raw(), step_out);
    }

    #[test]
    fn crossing_a_tick_adjusts_liquidity() {
        let base = 2_000_000_000_000_000_000u128;
        let extra = 500_000_000_000_000_000u128;
        let mut pool = full_range_pool(base);
        // a narrow band just below the current price
        pool.mint("band", -120, -60, extra).unwrap();
        assert_eq!(pool.state().liquidity, base);

        // swap down into the band
        let limit = get_sqrt_ratio_at_tick(-90).unwrap();
        pool.swap(true, I256::exp10(30), Some(limit)).unwrap();

        assert!(pool.state().tick_current < -60);
        assert_eq!(pool.state().liquidity, base + extra);
        assert_eq!(
            net_liquidity_at_or_below(&pool, pool.state().tick_current),
            pool.state().liquidity as i128
        );

        // and back out of it
        let limit = get_sqrt_ratio_at_tick(0).unwrap();
        pool.swap(false, I256::exp10(30), Some(limit)).unwrap();
        assert_eq!(pool.state().liquidity, base);
        assert_eq!(
            net_liquidity_at_or_below(&pool, pool.state().tick_current),
            pool.state().liquidity as i128
        );
    }

    #[test]
    fn fees_accrue_to_in_range_positions() {
        let liquidity = 2_000_000_000_000_000_000u128;
        let mut pool = full_range_pool(liquidity);
        let price_before = pool.state().sqrt_price_x96;

        let amount_in = I256::exp10(15);
        pool.swap(true, amount_in, None).unwrap();

        // poke the position to settle fees, then collect
        pool.burn("lp", -887220, 887220, 0).unwrap();
        let key = PositionKey::new("lp", -887220, 887220);
        let owed = pool.state().positions.get(&key).unwrap().tokens_owed_0;

        // the single LP earns the whole step fee, minus at most the two
        // floor roundings through the Q128 accumulator
        let (_, _, _, step_fee) = compute_swap_step(
            price_before,
            MIN_SQRT_RATIO + U256::ONE,
            liquidity,
            amount_in,
            3000,
        )
        .unwrap();
        assert!(U256::from(owed) <= step_fee);
        assert!(step_fee - U256::from(owed) <= U256::from(2u8));

        let (collected, _) = pool.collect("lp", -887220, 887220, u128::MAX, u128::MAX).unwrap();
        assert_eq!(collected, owed);
        assert_eq!(pool.state().positions.get(&key).unwrap().tokens_owed_0, 0);
    }

    #[test]
    fn fee_growth_only_increases() {
        let mut pool = full_range_pool(2_000_000_000_000_000_000u128);
        let mut last = U256::ZERO;
        for _ in 0..4 {
            pool.swap(true, I256::exp10(14), None).unwrap();
            let now = pool.state().fee_growth_global_0_x128;
            assert!(now > last);
            last = now;
        }
    }

    #[test]
    fn swap_assigns_fresh_state_ids() {
        let mut pool = full_range_pool(2_000_000_000_000_000_000u128);
        let id_before = pool.state().id;
        pool.swap(true, I256::exp10(14), None).unwrap();
        assert_ne!(pool.state().id, id_before);
    }

    #[test]
    fn price_tick_consistency_after_swaps() {
        let mut pool = full_range_pool(2_000_000_000_000_000_000u128);
        pool.swap(true, I256::exp10(16), None).unwrap();
        let state = pool.state();
        let tick = state.tick_current;
        assert!(get_sqrt_ratio_at_tick(tick).unwrap() <= state.sqrt_price_x96);
        assert!(state.sqrt_price_x96 < get_sqrt_ratio_at_tick(tick + 1).unwrap());
    }
}
