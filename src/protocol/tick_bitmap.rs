//! Sparse bitmap of initialized ticks.
//!
//! One bit per spacing-compressed tick, 256 bits per word. Words that drop
//! to zero are removed from the map so that equal pool states always have
//! equal bitmaps.

use std::collections::BTreeMap;

use alloy::primitives::U256;

use crate::errors::PoolError;
use crate::protocol::bit_math::{least_significant_bit, most_significant_bit};

/// Maps a compressed tick to its `(word, bit)` coordinates.
pub fn position(compressed: i32) -> (i16, u8) {
    ((compressed >> 8) as i16, (compressed % 256) as u8)
}

fn get_word(bitmap: &BTreeMap<i16, U256>, word: i16) -> U256 {
    bitmap.get(&word).copied().unwrap_or(U256::ZERO)
}

/// Toggles the initialized bit of `tick`, which must be spacing-aligned.
pub fn flip_tick(
    bitmap: &mut BTreeMap<i16, U256>,
    tick: i32,
    tick_spacing: i32,
) -> Result<(), PoolError> {
    if tick % tick_spacing != 0 {
        return Err(PoolError::TickMisaligned { tick, spacing: tick_spacing });
    }

    let (word_pos, bit_pos) = position(tick / tick_spacing);
    let mask = U256::ONE << bit_pos;
    let word = get_word(bitmap, word_pos) ^ mask;
    if word.is_zero() {
        bitmap.remove(&word_pos);
    } else {
        bitmap.insert(word_pos, word);
    }
    Ok(())
}

/// Finds the next initialized tick within the word containing `tick`,
/// searching left (`lte`) or right. When the word holds no candidate the
/// word-boundary tick is returned with `initialized = false`, which the swap
/// loop uses as a step target.
pub fn next_initialized_tick_within_one_word(
    bitmap: &BTreeMap<i16, U256>,
    tick: i32,
    tick_spacing: i32,
    lte: bool,
) -> Result<(i32, bool), PoolError> {
    let mut compressed = tick / tick_spacing;
    if tick < 0 && tick % tick_spacing != 0 {
        compressed -= 1;
    }

    if lte {
        let (word_pos, bit_pos) = position(compressed);
        // bits at or below bit_pos
        let mask = (U256::ONE << bit_pos) - U256::ONE + (U256::ONE << bit_pos);
        let masked = get_word(bitmap, word_pos) & mask;

        let initialized = !masked.is_zero();
        let next = if initialized {
            (compressed - (bit_pos - most_significant_bit(masked)?) as i32) * tick_spacing
        } else {
            (compressed - bit_pos as i32) * tick_spacing
        };
        Ok((next, initialized))
    } else {
        let (word_pos, bit_pos) = position(compressed + 1);
        // bits at or above bit_pos
        let mask = !((U256::ONE << bit_pos) - U256::ONE);
        let masked = get_word(bitmap, word_pos) & mask;

        let initialized = !masked.is_zero();
        let next = if initialized {
            (compressed + 1 + (least_significant_bit(masked)? - bit_pos) as i32) * tick_spacing
        } else {
            (compressed + 1 + (255u8 - bit_pos) as i32) * tick_spacing
        };
        Ok((next, initialized))
    }
}
