//! Chunk planning for array and region parallelization
//!
//! Pure splitting logic shared by the [`crate::executor::Threader`] provided
//! methods: ranges become contiguous per-worker chunks, regions become
//! axis-aligned slabs. Both plans are exact partitions: their union is the
//! original input and no two chunks overlap.

pub mod array;
pub mod region;

pub use array::split_range;
pub use region::{ImageRegion, RegionChunk, parallelize_image_region};
