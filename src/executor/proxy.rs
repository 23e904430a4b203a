//! Fault guard between backends and user callbacks
//!
//! Every worker invocation runs through [`run_guarded`], which converts any
//! failure raised inside the callback, including panics, into a [`WorkerExit`]
//! written to the worker's record. Nothing escapes a worker's execution
//! context; [`reduce`] turns the joined records into at most one error.

use super::{WorkerContext, WorkerExit, WorkerRecord};
use crate::error::{AbortSignal, DomainFault, Fault, FaultKind};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Run `work` for one worker, classifying any failure instead of raising it.
pub(crate) fn run_guarded(
    ctx: &WorkerContext,
    work: &(dyn Fn(&WorkerContext) -> crate::Result<()> + Sync),
) -> WorkerExit {
    match catch_unwind(AssertUnwindSafe(|| work(ctx))) {
        Ok(Ok(())) => WorkerExit::Success,
        Ok(Err(err)) => classify_error(err),
        Err(payload) => classify_panic(payload.as_ref()),
    }
}

fn classify_error(err: anyhow::Error) -> WorkerExit {
    if err.is::<AbortSignal>() {
        WorkerExit::Fault(FaultKind::Aborted, err.to_string())
    } else if err.is::<DomainFault>() {
        WorkerExit::Fault(FaultKind::Domain, err.to_string())
    } else {
        WorkerExit::Fault(FaultKind::Runtime, format!("{err:#}"))
    }
}

fn classify_panic(payload: &(dyn std::any::Any + Send)) -> WorkerExit {
    if let Some(message) = payload.downcast_ref::<&str>() {
        WorkerExit::Fault(FaultKind::Runtime, (*message).to_string())
    } else if let Some(message) = payload.downcast_ref::<String>() {
        WorkerExit::Fault(FaultKind::Runtime, message.clone())
    } else {
        WorkerExit::Fault(FaultKind::Unknown, "worker panicked with an opaque payload".to_string())
    }
}

/// Reduce joined worker records to at most one aggregated fault, chosen by
/// ascending thread id among the non-success records.
pub(crate) fn reduce(mut records: Vec<WorkerRecord>) -> crate::Result<()> {
    records.sort_by_key(|record| record.thread_id);
    for record in records {
        if let WorkerExit::Fault(kind, message) = record.exit {
            tracing::debug!("worker {} raised {:?}: {}", record.thread_id, kind, message);
            return Err(Fault { thread_id: record.thread_id, kind, message }.into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{abort_signal, domain_fault};
    use anyhow::anyhow;

    const CTX: WorkerContext = WorkerContext { thread_id: 0, thread_count: 1 };

    #[test]
    fn test_success_passes_through() {
        assert_eq!(run_guarded(&CTX, &|_| Ok(())), WorkerExit::Success);
    }

    #[test]
    fn test_error_classification() {
        assert!(matches!(
            run_guarded(&CTX, &|_| Err(domain_fault("bad sample"))),
            WorkerExit::Fault(FaultKind::Domain, _)
        ));
        assert!(matches!(
            run_guarded(&CTX, &|_| Err(abort_signal())),
            WorkerExit::Fault(FaultKind::Aborted, _)
        ));
        assert!(matches!(
            run_guarded(&CTX, &|_| Err(anyhow!("io went sideways"))),
            WorkerExit::Fault(FaultKind::Runtime, _)
        ));
    }

    #[test]
    fn test_panic_is_captured() {
        let exit = run_guarded(&CTX, &|_| panic!("boom at {}", 7));
        assert_eq!(exit, WorkerExit::Fault(FaultKind::Runtime, "boom at 7".to_string()));

        struct Opaque;
        let exit = run_guarded(&CTX, &|_| std::panic::panic_any(Opaque));
        assert!(matches!(exit, WorkerExit::Fault(FaultKind::Unknown, _)));
    }

    #[test]
    fn test_reduce_orders_by_thread_id() {
        let records = vec![
            WorkerRecord { thread_id: 3, exit: WorkerExit::Fault(FaultKind::Runtime, "late".into()) },
            WorkerRecord { thread_id: 0, exit: WorkerExit::Success },
            WorkerRecord { thread_id: 1, exit: WorkerExit::Fault(FaultKind::Domain, "early".into()) },
            WorkerRecord { thread_id: 2, exit: WorkerExit::Success },
        ];
        let fault = reduce(records).unwrap_err().downcast::<Fault>().unwrap();
        assert_eq!(fault.thread_id, 1);
        assert_eq!(fault.kind(), FaultKind::Domain);
        assert_eq!(fault.message, "early");
    }

    #[test]
    fn test_reduce_all_success() {
        let records = (0..4)
            .map(|thread_id| WorkerRecord { thread_id, exit: WorkerExit::Success })
            .collect();
        assert!(reduce(records).is_ok());
    }
}
