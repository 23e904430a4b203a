//! Task-library backend: rayon thread pool
//!
//! Logical workers become rayon scope tasks on a pool sized to the global
//! maximum. Rayon may coalesce several workers onto one OS thread through work
//! stealing; worker ids stay unique and the scope is the join barrier. Because
//! the dispatching thread blocks outside the pool, progress sinks only hear
//! from it at the end of a parallel operation.

use super::{SingleMethod, Threader, ThreaderCore, WorkerContext, WorkerRecord, proxy};
use crate::config::{self, BackendKind};
use anyhow::{Context, anyhow};
use std::sync::Mutex;

pub struct TaskThreader {
    core: ThreaderCore,
    pool: rayon::ThreadPool,
}

impl TaskThreader {
    pub fn new() -> crate::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config::global_maximum_threads())
            .thread_name(|i| format!("fanout-task-{i}"))
            .build()
            .context("building rayon pool")?;
        Ok(Self { core: ThreaderCore::new(), pool })
    }
}

impl Threader for TaskThreader {
    fn backend(&self) -> BackendKind {
        BackendKind::TaskLibrary
    }

    fn thread_count(&self) -> usize {
        self.core.thread_count()
    }

    fn set_thread_count(&mut self, threads: usize) {
        self.core.set_thread_count(threads);
    }

    fn set_single_method(&mut self, method: SingleMethod) {
        self.core.set_single_method(method);
    }

    fn single_method(&self) -> Option<&SingleMethod> {
        self.core.single_method()
    }

    fn run(&self, work: &(dyn Fn(&WorkerContext) -> crate::Result<()> + Sync)) -> crate::Result<()> {
        let total = self.thread_count();
        let records = Mutex::new(Vec::with_capacity(total));

        self.pool.scope(|s| {
            for thread_id in 0..total {
                let records = &records;
                s.spawn(move |_| {
                    let ctx = WorkerContext { thread_id, thread_count: total };
                    let exit = proxy::run_guarded(&ctx, work);
                    if let Ok(mut records) = records.lock() {
                        records.push(WorkerRecord { thread_id, exit });
                    }
                });
            }
        });

        let records = records
            .into_inner()
            .map_err(|_| anyhow!("worker record store poisoned"))?;
        if records.len() != total {
            return Err(anyhow!("a task worker terminated without reporting"));
        }
        proxy::reduce(records)
    }
}

impl std::fmt::Debug for TaskThreader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskThreader")
            .field("core", &self.core)
            .field("pool_threads", &self.pool.current_num_threads())
            .finish()
    }
}
