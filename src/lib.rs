//! # Fanout - Bounded Worker-Thread Parallelization
//!
//! Fanout fans computation out over one-dimensional index ranges and axis-aligned
//! N-dimensional regions, using a bounded cohort of worker threads. It is the
//! concurrency coordination layer of a numeric/image-processing pipeline: backends
//! are pluggable, chunk plans are exact partitions, and worker faults are captured
//! and aggregated instead of crashing the process.
//!
//! ## Features
//!
//! - **Pluggable backends**: per-call spawned threads, a reusable worker pool, or a
//!   rayon task pool, selected globally or per instance
//! - **Exact chunking**: ranges and regions are split into contiguous,
//!   non-overlapping chunks covering the whole input
//! - **Fault capture**: a panicking or failing functor never disappears silently;
//!   one aggregated error surfaces after the join barrier
//! - **Single-threaded progress**: many workers feed one atomic counter, but only
//!   the calling thread ever talks to the progress sink
//!
//! ## Quick Start
//!
//! ```rust
//! use fanout::{Threader, new_threader};
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! let threader = new_threader().unwrap();
//! let sum = AtomicU64::new(0);
//! threader
//!     .parallelize_array(
//!         0,
//!         1000,
//!         &|i| {
//!             sum.fetch_add(i, Ordering::Relaxed);
//!             Ok(())
//!         },
//!         None,
//!     )
//!     .unwrap();
//! assert_eq!(sum.into_inner(), 499_500);
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod parallelize;
pub mod progress;

pub use config::BackendKind;
pub use error::{Fault, FaultKind};
pub use executor::{Threader, new_threader};
pub use parallelize::region::{ImageRegion, parallelize_image_region};
pub use progress::ProgressSink;

/// Result type alias for fanout operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
