//! Bit scans on `U256`, used by the tick bitmap search.

use alloy::primitives::U256;

use crate::errors::MathError;

/// Index (0-255) of the most significant set bit.
pub fn most_significant_bit(x: U256) -> Result<u8, MathError> {
    if x.is_zero() {
        return Err(MathError::ZeroValue);
    }
    Ok(255 - x.leading_zeros() as u8)
}

/// Index (0-255) of the least significant set bit.
pub fn least_significant_bit(x: U256) -> Result<u8, MathError> {
    if x.is_zero() {
        return Err(MathError::ZeroValue);
    }
    Ok(x.trailing_zeros() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msb_errors_on_zero() {
        assert!(matches!(most_significant_bit(U256::ZERO), Err(MathError::ZeroValue)));
    }

    #[test]
    fn msb_values() {
        assert_eq!(most_significant_bit(U256::from(1u64 << 7)).unwrap(), 7);
        assert_eq!(most_significant_bit(U256::from(0b1001_0100u64)).unwrap(), 7);
        assert_eq!(most_significant_bit(U256::MAX).unwrap(), 255);
    }

    #[test]
    fn lsb_errors_on_zero() {
        assert!(matches!(least_significant_bit(U256::ZERO), Err(MathError::ZeroValue)));
    }

    #[test]
    fn lsb_values() {
        assert_eq!(least_significant_bit(U256::from(1u64 << 12)).unwrap(), 12);
        assert_eq!(least_significant_bit(U256::from(0b1011001000u64)).unwrap(), 3);
        assert_eq!(least_significant_bit(U256::MAX).unwrap(), 0);
    }
}
