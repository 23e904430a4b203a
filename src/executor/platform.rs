//! Platform backend: fresh OS threads per call
//!
//! Spawns `thread_count - 1` scoped threads and runs the last worker id inline
//! on the calling thread, so the calling thread always hosts one worker and can
//! forward progress. The scope doubles as the join barrier.

use super::{SingleMethod, Threader, ThreaderCore, WorkerContext, WorkerExit, WorkerRecord, proxy};
use crate::config::BackendKind;
use crate::error::FaultKind;
use anyhow::anyhow;

#[derive(Debug)]
pub struct PlatformThreader {
    core: ThreaderCore,
}

impl PlatformThreader {
    pub fn new() -> Self {
        Self { core: ThreaderCore::new() }
    }
}

impl Default for PlatformThreader {
    fn default() -> Self {
        Self::new()
    }
}

impl Threader for PlatformThreader {
    fn backend(&self) -> BackendKind {
        BackendKind::Platform
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
        let records = crossbeam::thread::scope(|s| {
            let mut handles = Vec::with_capacity(total - 1);
            for thread_id in 0..total - 1 {
                handles.push(s.spawn(move |_| {
                    let ctx = WorkerContext { thread_id, thread_count: total };
                    WorkerRecord { thread_id, exit: proxy::run_guarded(&ctx, work) }
                }));
            }

            // Calling thread takes the last worker id
            let ctx = WorkerContext { thread_id: total - 1, thread_count: total };
            let mut records = Vec::with_capacity(total);
            records.push(WorkerRecord { thread_id: total - 1, exit: proxy::run_guarded(&ctx, work) });

            for (thread_id, handle) in handles.into_iter().enumerate() {
                // run_guarded never unwinds, so a join failure means the worker
                // died before reporting
                let record = handle.join().unwrap_or(WorkerRecord {
                    thread_id,
                    exit: WorkerExit::Fault(
                        FaultKind::Unknown,
                        "worker terminated without reporting".to_string(),
                    ),
                });
                records.push(record);
            }
            records
        })
        .map_err(|_| anyhow!("worker thread panicked outside the fault guard"))?;

        proxy::reduce(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_calling_thread_hosts_a_worker() {
        let threader = PlatformThreader::new();
        let caller = std::thread::current().id();
        let hits = AtomicUsize::new(0);
        threader
            .run(&|_ctx| {
                if std::thread::current().id() == caller {
                    hits.fetch_add(1, Ordering::Relaxed);
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(hits.into_inner(), 1);
    }

    #[test]
    fn test_single_worker_runs_inline() {
        let mut threader = PlatformThreader::new();
        threader.set_thread_count(1);
        let caller = std::thread::current().id();
        threader
            .run(&|ctx| {
                assert_eq!(ctx.thread_id, 0);
                assert_eq!(ctx.thread_count, 1);
                assert_eq!(std::thread::current().id(), caller);
                Ok(())
            })
            .unwrap();
    }
}
