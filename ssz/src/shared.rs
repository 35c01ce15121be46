// Set operations over the raw bytes of bitfields.
// Callers must pass slices of the same length with unused trailing bits cleared.

use bitvec::{order::Lsb0, slice::BitSlice};

pub fn is_subset(bytes: &[u8], other_bytes: &[u8]) -> bool {
    core::iter::zip(bytes, other_bytes).all(|(byte, other_byte)| byte & !other_byte == 0)
}

pub fn count_not_in(bytes: &[u8], other_bytes: &[u8]) -> usize {
    core::iter::zip(bytes, other_bytes)
        .map(|(byte, other_byte)| count_ones_in_byte(byte & !other_byte))
        .sum()
}

fn count_ones_in_byte(byte: u8) -> usize {
    BitSlice::<u8, Lsb0>::from_element(&byte).count_ones()
}
