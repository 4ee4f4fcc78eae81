//! Circular sequence number arithmetic.

/// Maximum packet sequence value before the space wraps to zero.
pub const MAX_SEQUENCE: u32 = u32::MAX;

/// Half of the sequence space, used for wrap detection.
const HALF_RANGE: u32 = MAX_SEQUENCE / 2;

/// Returns true if sequence `a` is newer than sequence `b`.
///
/// A sequence is newer when it is ahead of the other by at most half the
/// sequence space. A plain `>` comparison fails once the space wraps:
/// sequence `0` follows `MAX_SEQUENCE` and must compare as newer.
pub fn is_more_recent(a: u32, b: u32) -> bool {
    (a > b && a - b <= HALF_RANGE) || (b > a && b - a > HALF_RANGE)
}

/// Finds the ack vector bit index for the given sequence number.
///
/// Bit 0 corresponds to `ack - 1`, bit 1 to `ack - 2`, and so on down to
/// bit 31 for `ack - 32`. The arithmetic wraps modulo 2^32, so the index
/// is well defined when `sequence` and `ack` straddle the wrap point.
pub fn bit_index(sequence: u32, ack: u32) -> u32 {
    if sequence > ack {
        ack.wrapping_add(MAX_SEQUENCE.wrapping_sub(sequence))
    } else {
        ack.wrapping_sub(1).wrapping_sub(sequence)
    }
}
