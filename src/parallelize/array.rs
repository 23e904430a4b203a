//! Range splitting for array parallelization

use std::ops::Range;

/// Split the half-open range `[first, last)` into exactly `pieces` contiguous
/// chunks. Left-to-right greedy: chunk `k` receives `ceil(remaining / pieces
/// left)` indices, so sizes differ by at most one and any remainder lands in
/// the earliest chunks. Trailing chunks may be empty when there are more pieces
/// than indices.
pub fn split_range(first: u64, last: u64, pieces: usize) -> Vec<Range<u64>> {
    debug_assert!(first <= last);
    let pieces = pieces.max(1);
    let mut chunks = Vec::with_capacity(pieces);
    let mut cursor = first;
    for piece in 0..pieces {
        let remaining = last - cursor;
        let len = remaining.div_ceil((pieces - piece) as u64);
        chunks.push(cursor..cursor + len);
        cursor += len;
    }
    debug_assert_eq!(cursor, last);
    chunks
}
