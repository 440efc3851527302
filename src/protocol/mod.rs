pub mod bit_math;
pub mod liquidity_math;
pub mod pool;
pub mod position;
pub mod safe_math;
pub mod solidity_math;
pub mod sqrt_price_math;
pub mod swap_math;
pub mod tick;
pub mod tick_bitmap;
pub mod tick_math;
