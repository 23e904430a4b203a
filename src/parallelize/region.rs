//! Region splitting for N-dimensional parallelization

use super::array::split_range;
use crate::executor::Threader;
use crate::progress::ProgressSink;
use smallvec::SmallVec;

/// Typical pipelines stay at or below 4-D (volume + time); chunks up to 6-D
/// avoid heap allocation.
type IndexVec = SmallVec<[i64; 6]>;
type SizeVec = SmallVec<[u64; 6]>;

/// One axis-aligned piece of a split region, assigned to exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionChunk {
    pub index: IndexVec,
    pub size: SizeVec,
}

impl RegionChunk {
    fn from_parts(index: &[i64], size: &[u64]) -> Self {
        Self { index: IndexVec::from_slice(index), size: SizeVec::from_slice(size) }
    }

    pub fn element_count(&self) -> u64 {
        self.size.iter().product()
    }
}

/// Split a region into at most `pieces` axis-aligned slabs along its
/// slowest-varying splittable dimension (the highest dimension with size > 1).
/// The slabs exactly cover the region and never overlap. Regions with no
/// splittable dimension come back as a single chunk.
pub(crate) fn split_region(index: &[i64], size: &[u64], pieces: usize) -> Vec<RegionChunk> {
    let Some(axis) = size.iter().rposition(|&extent| extent > 1) else {
        return vec![RegionChunk::from_parts(index, size)];
    };
    let pieces = (pieces as u64).clamp(1, size[axis]) as usize;
    split_range(0, size[axis], pieces)
        .into_iter()
        .map(|span| {
            let mut chunk = RegionChunk::from_parts(index, size);
            chunk.index[axis] = index[axis] + span.start as i64;
            chunk.size[axis] = span.end - span.start;
            chunk
        })
        .collect()
}

/// An axis-aligned N-dimensional region described by a starting index and a
/// per-dimension size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRegion<const D: usize> {
    pub index: [i64; D],
    pub size: [u64; D],
}

impl<const D: usize> ImageRegion<D> {
    pub fn new(index: [i64; D], size: [u64; D]) -> Self {
        Self { index, size }
    }

    pub fn index(&self, dimension: usize) -> i64 {
        self.index[dimension]
    }

    pub fn size(&self, dimension: usize) -> u64 {
        self.size[dimension]
    }

    pub fn element_count(&self) -> u64 {
        self.size.iter().product()
    }
}

/// Strongly-typed convenience wrapper over
/// [`Threader::parallelize_region`]: flattens the region into index/size
/// arrays, then rebuilds an [`ImageRegion`] per chunk for the functor. Pure
/// adaptation, no invariants of its own.
pub fn parallelize_image_region<const D: usize>(
    threader: &dyn Threader,
    region: &ImageRegion<D>,
    functor: impl Fn(&ImageRegion<D>) -> crate::Result<()> + Sync,
    progress: Option<&dyn ProgressSink>,
) -> crate::Result<()> {
    threader.parallelize_region(
        D,
        &region.index,
        &region.size,
        &|index: &[i64], size: &[u64]| {
            let mut chunk = ImageRegion { index: [0; D], size: [0; D] };
            chunk.index.copy_from_slice(index);
            chunk.size.copy_from_slice(size);
            functor(&chunk)
        },
        progress,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_partition(index: &[i64], size: &[u64], chunks: &[RegionChunk]) {
        let total: u64 = size.iter().product();
        let counted: u64 = chunks.iter().map(RegionChunk::element_count).sum();
        assert_eq!(counted, total, "chunk volumes must add up to the region volume");

        // Pairwise disjointness: boxes overlap only if they overlap on every axis
        for (a, b) in chunks.iter().enumerate().flat_map(|(i, a)| {
            chunks[i + 1..].iter().map(move |b| (a, b))
        }) {
            let overlaps = (0..size.len()).all(|d| {
                let (a_lo, a_hi) = (a.index[d], a.index[d] + a.size[d] as i64);
                let (b_lo, b_hi) = (b.index[d], b.index[d] + b.size[d] as i64);
                a_lo < b_hi && b_lo < a_hi
            });
            assert!(!overlaps, "chunks {a:?} and {b:?} overlap");
        }

        // Containment
        for chunk in chunks {
            for d in 0..size.len() {
                assert!(chunk.index[d] >= index[d]);
                assert!(
                    chunk.index[d] + chunk.size[d] as i64 <= index[d] + size[d] as i64,
                    "chunk {chunk:?} escapes the region"
                );
            }
        }
    }

    #[test]
    fn test_split_along_slowest_dimension() {
        let index = [10, -5, 0];
        let size = [64, 64, 16];
        let chunks = split_region(&index, &size, 4);
        assert_eq!(chunks.len(), 4);
        // Slabs move along the last dimension only
        for chunk in &chunks {
            assert_eq!(chunk.size[0], 64);
            assert_eq!(chunk.size[1], 64);
            assert_eq!(chunk.size[2], 4);
        }
        assert_exact_partition(&index, &size, &chunks);
    }

    #[test]
    fn test_split_skips_flat_trailing_dimensions() {
        // Last dimension is flat, so the split falls back to dimension 1
        let index = [0, 0, 7];
        let size = [32, 10, 1];
        let chunks = split_region(&index, &size, 4);
        assert_eq!(chunks.len(), 4);
        for chunk in &chunks {
            assert_eq!(chunk.size[0], 32);
            assert_eq!(chunk.size[2], 1);
        }
        assert_exact_partition(&index, &size, &chunks);
    }

    #[test]
    fn test_more_pieces_than_extent() {
        let chunks = split_region(&[0, 0], &[100, 3], 8);
        assert_eq!(chunks.len(), 3);
        assert_exact_partition(&[0, 0], &[100, 3], &chunks);
    }

    #[test]
    fn test_single_element_region() {
        let chunks = split_region(&[2], &[1], 6);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].element_count(), 1);
    }

    #[test]
    fn test_uneven_extent_remainder_first() {
        let chunks = split_region(&[0, 0], &[8, 101], 4);
        let extents: Vec<u64> = chunks.iter().map(|c| c.size[1]).collect();
        assert_eq!(extents, vec![26, 25, 25, 25]);
        assert_exact_partition(&[0, 0], &[8, 101], &chunks);
    }

    #[test]
    fn test_image_region_accessors() {
        let region = ImageRegion::new([1, 2], [30, 40]);
        assert_eq!(region.index(0), 1);
        assert_eq!(region.size(1), 40);
        assert_eq!(region.element_count(), 1200);
    }
}
