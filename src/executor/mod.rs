//! Worker-pool execution contract
//!
//! [`Threader`] is the contract every backend satisfies: dispatch exactly
//! `thread_count` logical workers with unique ids, join them all, and surface at
//! most one aggregated fault picked by ascending thread id. The provided methods
//! build the array and region parallelizers on top of that primitive, so a
//! backend only has to implement `run`.

pub mod platform;
pub mod pool;
pub mod proxy;
pub mod task_library;

pub use platform::PlatformThreader;
pub use pool::PoolThreader;
pub use task_library::TaskThreader;

use crate::config::{self, BackendKind};
use crate::error::FaultKind;
use crate::parallelize::{array, region};
use crate::progress::ProgressSink;
use anyhow::{anyhow, ensure};
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-worker execution context handed to the work callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerContext {
    /// 0-based id, unique within one run and below `thread_count`
    pub thread_id: usize,
    /// Total number of logical workers in this run
    pub thread_count: usize,
}

/// Outcome of one worker, recorded instead of raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    Success,
    Fault(FaultKind, String),
}

/// One record per worker per run; consumed when the run joins.
#[derive(Debug, Clone)]
pub struct WorkerRecord {
    pub thread_id: usize,
    pub exit: WorkerExit,
}

/// Context passed to a registered single method, carrying the opaque payload.
pub struct WorkerInfo {
    pub thread_id: usize,
    pub thread_count: usize,
    pub user_data: Option<Arc<dyn Any + Send + Sync>>,
}

/// Legacy callback-plus-payload surface: one callback run on every worker.
/// Prefer the typed closures taken by [`Threader::run`] and the parallelizers;
/// this shape is kept for callers porting from callback-style APIs.
#[derive(Clone)]
pub struct SingleMethod {
    pub method: Arc<dyn Fn(&WorkerInfo) -> crate::Result<()> + Send + Sync>,
    pub user_data: Option<Arc<dyn Any + Send + Sync>>,
}

impl SingleMethod {
    pub fn new(method: impl Fn(&WorkerInfo) -> crate::Result<()> + Send + Sync + 'static) -> Self {
        Self { method: Arc::new(method), user_data: None }
    }

    pub fn with_user_data(mut self, user_data: Arc<dyn Any + Send + Sync>) -> Self {
        self.user_data = Some(user_data);
        self
    }
}

/// Shared per-instance state embedded in every backend.
#[derive(Debug)]
pub(crate) struct ThreaderCore {
    threads: usize,
    single: Option<SingleMethod>,
}

impl std::fmt::Debug for SingleMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleMethod")
            .field("user_data", &self.user_data.is_some())
            .finish_non_exhaustive()
    }
}

impl ThreaderCore {
    pub(crate) fn new() -> Self {
        Self { threads: config::global_default_threads(), single: None }
    }

    pub(crate) fn thread_count(&self) -> usize {
        // Re-clamp on read so a lowered global maximum takes effect without a
        // new set_thread_count call.
        self.threads.clamp(1, config::global_maximum_threads())
    }

    pub(crate) fn set_thread_count(&mut self, threads: usize) {
        self.threads = threads.clamp(1, config::global_maximum_threads());
    }

    pub(crate) fn single_method(&self) -> Option<&SingleMethod> {
        self.single.as_ref()
    }

    pub(crate) fn set_single_method(&mut self, method: SingleMethod) {
        self.single = Some(method);
    }
}

/// Abstract worker-pool contract.
pub trait Threader: Send + Sync {
    /// Which backend this instance is.
    fn backend(&self) -> BackendKind;

    /// The clamped thread count actually in effect.
    fn thread_count(&self) -> usize;

    /// Store `clamp(threads, 1, global maximum)`. Read the value back rather
    /// than assuming the request was honored verbatim.
    fn set_thread_count(&mut self, threads: usize);

    /// Register the legacy single method run on every worker by
    /// [`Threader::run_single_method`].
    fn set_single_method(&mut self, method: SingleMethod);

    fn single_method(&self) -> Option<&SingleMethod>;

    /// Dispatch exactly `thread_count` logical workers, each receiving a
    /// [`WorkerContext`] with a unique `thread_id`, and block until every worker
    /// has finished. Each invocation runs through the fault guard; after the
    /// join, the first non-success record by ascending thread id becomes the
    /// single aggregated error.
    fn run(&self, work: &(dyn Fn(&WorkerContext) -> crate::Result<()> + Sync)) -> crate::Result<()>;

    /// Run the registered single method on every worker.
    fn run_single_method(&self) -> crate::Result<()> {
        let single = self
            .single_method()
            .ok_or_else(|| anyhow!("no single method registered"))?
            .clone();
        self.run(&move |ctx: &WorkerContext| {
            let info = WorkerInfo {
                thread_id: ctx.thread_id,
                thread_count: ctx.thread_count,
                user_data: single.user_data.clone(),
            };
            (single.method)(&info)
        })
    }

    /// Parallelize `functor` over the half-open index range `[first, last)`.
    ///
    /// The range is split into exactly `thread_count` contiguous chunks whose
    /// sizes differ by at most one, remainder to the earliest chunks. Workers
    /// iterate their own chunk in ascending order; there is no ordering across
    /// chunks. Progress is counted atomically, but only the worker executing on
    /// the calling thread forwards fractions to `progress`, so the sink never
    /// sees concurrent calls. An empty range is a no-op that still reports 1.0.
    fn parallelize_array(
        &self,
        first: u64,
        last: u64,
        functor: &(dyn Fn(u64) -> crate::Result<()> + Sync),
        progress: Option<&dyn ProgressSink>,
    ) -> crate::Result<()> {
        ensure!(first <= last, "invalid index range [{first}, {last})");
        let total = last - first;
        if total == 0 {
            if let Some(sink) = progress {
                sink.set_fraction(1.0);
            }
            return Ok(());
        }

        let chunks = array::split_range(first, last, self.thread_count());
        tracing::trace!("array [{first}, {last}) split into {} chunks", chunks.len());
        let caller = std::thread::current().id();
        let done = AtomicU64::new(0);
        let chunks = &chunks;

        self.run(&|ctx: &WorkerContext| {
            let Some(chunk) = chunks.get(ctx.thread_id) else {
                return Ok(());
            };
            let on_calling_thread = std::thread::current().id() == caller;
            for i in chunk.clone() {
                functor(i)?;
                let completed = done.fetch_add(1, Ordering::Relaxed) + 1;
                if on_calling_thread && let Some(sink) = progress {
                    sink.set_fraction(completed as f64 / total as f64);
                }
            }
            Ok(())
        })?;

        if let Some(sink) = progress {
            sink.set_fraction(1.0);
        }
        Ok(())
    }

    /// Parallelize `functor` over an axis-aligned N-dimensional region given as
    /// per-dimension `index`/`size` arrays.
    ///
    /// The region is split into axis-aligned chunks that exactly cover it
    /// without overlap (currently slabs along the slowest-varying splittable
    /// dimension; only the cover/non-overlap property is contractual). The
    /// functor runs once per chunk and iterates the chunk's elements itself.
    /// Progress is accounted in whole chunks against the region's element
    /// count, with the same calling-thread-only sink rule as
    /// [`Threader::parallelize_array`]. A zero-volume region is a no-op that
    /// still reports 1.0.
    fn parallelize_region(
        &self,
        dimension: usize,
        index: &[i64],
        size: &[u64],
        functor: &(dyn Fn(&[i64], &[u64]) -> crate::Result<()> + Sync),
        progress: Option<&dyn ProgressSink>,
    ) -> crate::Result<()> {
        ensure!(dimension >= 1, "region dimension must be at least 1");
        ensure!(
            index.len() == dimension && size.len() == dimension,
            "index/size arrays must have {dimension} entries"
        );
        let total: u64 = size.iter().product();
        if total == 0 {
            if let Some(sink) = progress {
                sink.set_fraction(1.0);
            }
            return Ok(());
        }

        let chunks = region::split_region(index, size, self.thread_count());
        tracing::trace!("region of {total} elements split into {} chunks", chunks.len());
        let caller = std::thread::current().id();
        let done = AtomicU64::new(0);
        let chunks = &chunks;

        self.run(&|ctx: &WorkerContext| {
            let Some(chunk) = chunks.get(ctx.thread_id) else {
                return Ok(());
            };
            functor(&chunk.index, &chunk.size)?;
            let count = chunk.element_count();
            let completed = done.fetch_add(count, Ordering::Relaxed) + count;
            if std::thread::current().id() == caller
                && let Some(sink) = progress
            {
                sink.set_fraction(completed as f64 / total as f64);
            }
            Ok(())
        })?;

        if let Some(sink) = progress {
            sink.set_fraction(1.0);
        }
        Ok(())
    }
}

/// Construct a threader for the process-wide default backend.
pub fn new_threader() -> crate::Result<Box<dyn Threader>> {
    with_backend(config::global_default_backend())
}

/// Construct a threader for a specific backend. `Unknown` falls back to the
/// compiled default.
pub fn with_backend(kind: BackendKind) -> crate::Result<Box<dyn Threader>> {
    match kind {
        BackendKind::Platform => Ok(Box::new(PlatformThreader::new())),
        BackendKind::Pool => Ok(Box::new(PoolThreader::new()?)),
        BackendKind::TaskLibrary => Ok(Box::new(TaskThreader::new()?)),
        BackendKind::Unknown => {
            tracing::warn!(
                "cannot construct an Unknown threader, using {}",
                config::COMPILED_DEFAULT_BACKEND
            );
            with_backend(config::COMPILED_DEFAULT_BACKEND)
        }
    }
}
