//! Raw sample conversion and L/R interleaving

use super::buffer::{DmaBuffer, OutputBuffer};
use std::ops::Range;

/// Reduce a raw extended-resolution sample to 16 bits
///
/// Arithmetic shift right by 8, then saturate to the i16 range.
#[inline]
pub fn convert_sample(raw: i32) -> i16 {
    (raw >> 8).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Convert `range` of both raw buffers into `output`, left at `2*i` and
/// right at `2*i + 1`
pub fn interleave_range(
    left: &DmaBuffer,
    right: &DmaBuffer,
    output: &OutputBuffer,
    range: Range<usize>,
) {
    for i in range {
        output.write(2 * i, convert_sample(left.read(i)));
        output.write(2 * i + 1, convert_sample(right.read(i)));
    }
}

/// Slice form of [`interleave_range`] over whole buffers
///
/// `output` must hold `2 * left.len()` samples and `right` must match `left`.
pub fn interleave(left: &[i32], right: &[i32], output: &mut [i16]) {
    debug_assert_eq!(left.len(), right.len());
    debug_assert_eq!(output.len(), left.len() * 2);

    for ((frame, &l), &r) in output.chunks_exact_mut(2).zip(left).zip(right) {
        frame[0] = convert_sample(l);
        frame[1] = convert_sample(r);
    }
}
