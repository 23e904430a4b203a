//! Worker fault taxonomy
//!
//! A functor running on a worker thread can fail three ways: by raising a
//! domain-specific condition, by signalling an early abort of its own chunk, or
//! by any other runtime failure (including a panic). All of them are captured
//! per worker and reduced to at most one [`Fault`] after the join barrier.
//! Out-of-range configuration values are never errors; they are clamped where
//! they occur.

use thiserror::Error;

/// Classification of a captured worker failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Domain-specific condition raised through [`domain_fault`]
    Domain,
    /// Early stop of the worker's own chunk, raised through [`abort_signal`]
    Aborted,
    /// Generic runtime failure, including panics carrying a message
    Runtime,
    /// Failure that could not be classified
    Unknown,
}

/// The single aggregated error surfaced to the caller of a parallel operation.
///
/// When several workers fail, the fault of the lowest-numbered failing thread
/// wins. Downcast from the `anyhow::Error` returned by a parallel call to
/// inspect the kind.
#[derive(Debug, Error)]
#[error("worker {thread_id} failed ({kind:?}): {message}")]
pub struct Fault {
    pub thread_id: usize,
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn kind(&self) -> FaultKind {
        self.kind
    }
}

/// Marker error a functor returns to stop its own chunk early. Sibling workers
/// keep running; already-started iterations are not interrupted.
#[derive(Debug, Error)]
#[error("chunk aborted by functor")]
pub struct AbortSignal;

/// Domain-specific failure raised inside a functor.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DomainFault(pub String);

/// Build an abort signal for returning from a functor.
pub fn abort_signal() -> anyhow::Error {
    AbortSignal.into()
}

/// Build a domain fault for returning from a functor.
pub fn domain_fault(message: impl Into<String>) -> anyhow::Error {
    DomainFault(message.into()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display_names_thread() {
        let fault = Fault { thread_id: 3, kind: FaultKind::Domain, message: "bad voxel".into() };
        let rendered = fault.to_string();
        assert!(rendered.contains("worker 3"));
        assert!(rendered.contains("bad voxel"));
    }

    #[test]
    fn test_constructors_downcast() {
        assert!(abort_signal().is::<AbortSignal>());
        assert!(domain_fault("x").is::<DomainFault>());
    }
}
