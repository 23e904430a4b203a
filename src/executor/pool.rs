//! Pool backend: reusable worker threads fed through channels
//!
//! OS threads are spawned once at construction and reused across runs, avoiding
//! per-call spawn cost. Each run dispatches `thread_count - 1` jobs into the
//! pool and executes the last worker id inline on the calling thread, then
//! blocks collecting one record per job as the join barrier. If a run asks for
//! more workers than the pool has threads, pool threads process several jobs
//! back to back; worker ids stay unique either way.

use super::{SingleMethod, Threader, ThreaderCore, WorkerContext, WorkerRecord, proxy};
use crate::config::BackendKind;
use anyhow::{Context, anyhow};
use crossbeam::channel::{Receiver, Sender, bounded, unbounded};
use std::thread::JoinHandle;

type PoolJob = Box<dyn FnOnce() + Send + 'static>;

pub struct PoolThreader {
    core: ThreaderCore,
    job_tx: Option<Sender<PoolJob>>,
    workers: Vec<JoinHandle<()>>,
}

impl PoolThreader {
    pub fn new() -> crate::Result<Self> {
        let core = ThreaderCore::new();
        // The calling thread always hosts one worker, so the pool only needs
        // threads for the rest
        let pool_size = core.thread_count().saturating_sub(1).max(1);
        let (job_tx, job_rx) = unbounded::<PoolJob>();

        let mut workers = Vec::with_capacity(pool_size);
        for slot in 0..pool_size {
            let job_rx: Receiver<PoolJob> = job_rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("fanout-pool-{slot}"))
                .spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        job();
                    }
                })
                .with_context(|| format!("spawning pool worker {slot}"))?;
            workers.push(handle);
        }
        tracing::debug!("pool backend ready with {pool_size} threads");

        Ok(Self { core, job_tx: Some(job_tx), workers })
    }
}

impl Threader for PoolThreader {
    fn backend(&self) -> BackendKind {
        BackendKind::Pool
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
        let Some(job_tx) = &self.job_tx else {
            return Err(anyhow!("worker pool already shut down"));
        };

        // Erase the borrow so jobs can cross into the long-lived pool threads.
        // Sound because the record loop below blocks until every dispatched job
        // has finished, so no job outlives this call.
        let work: &'static (dyn Fn(&WorkerContext) -> crate::Result<()> + Sync) =
            unsafe { std::mem::transmute(work) };

        let (record_tx, record_rx) = bounded::<WorkerRecord>(total);
        for thread_id in 0..total - 1 {
            let record_tx = record_tx.clone();
            let job: PoolJob = Box::new(move || {
                let ctx = WorkerContext { thread_id, thread_count: total };
                let exit = proxy::run_guarded(&ctx, work);
                let _ = record_tx.send(WorkerRecord { thread_id, exit });
            });
            job_tx.send(job).map_err(|_| anyhow!("worker pool threads exited early"))?;
        }

        // Calling thread takes the last worker id
        let ctx = WorkerContext { thread_id: total - 1, thread_count: total };
        let mut records = Vec::with_capacity(total);
        records.push(WorkerRecord {
            thread_id: total - 1,
            exit: proxy::run_guarded(&ctx, work),
        });

        // Join barrier: one record per dispatched job
        for _ in 0..total - 1 {
            let record = record_rx
                .recv()
                .map_err(|_| anyhow!("worker pool dropped a record before the join"))?;
            records.push(record);
        }

        proxy::reduce(records)
    }
}

impl Drop for PoolThreader {
    fn drop(&mut self) {
        // Closing the channel lets the workers drain and exit
        self.job_tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for PoolThreader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolThreader")
            .field("core", &self.core)
            .field("pool_size", &self.workers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn distinct_ids(threader: &PoolThreader) -> (usize, usize) {
        let seen = Mutex::new(HashSet::new());
        threader
            .run(&|ctx| {
                seen.lock().unwrap().insert((ctx.thread_id, ctx.thread_count));
                Ok(())
            })
            .unwrap();
        let seen = seen.into_inner().unwrap();
        let reported = seen.iter().map(|&(_, count)| count).max().unwrap_or(0);
        (seen.len(), reported)
    }

    #[test]
    fn test_pool_reuse_across_runs() {
        let threader = PoolThreader::new().unwrap();
        for _ in 0..3 {
            let (distinct, reported) = distinct_ids(&threader);
            assert_eq!(distinct, reported);
        }
    }

    #[test]
    fn test_more_workers_than_pool_threads() {
        let mut threader = PoolThreader::new().unwrap();
        // Pool was sized for the default; ask for more logical workers
        threader.set_thread_count(config::global_maximum_threads().min(16));
        let (distinct, reported) = distinct_ids(&threader);
        assert_eq!(distinct, reported);
        assert!(distinct >= 1);
    }

    #[test]
    fn test_calling_thread_hosts_a_worker() {
        let threader = PoolThreader::new().unwrap();
        let caller = std::thread::current().id();
        let seen = Mutex::new(Vec::new());
        threader
            .run(&|ctx| {
                if std::thread::current().id() == caller {
                    seen.lock().unwrap().push(ctx.thread_id);
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(seen.into_inner().unwrap().len(), 1);
    }
}
