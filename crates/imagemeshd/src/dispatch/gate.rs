//! Global dispatch gate serialising access to the worker pool.
//!
//! Sessions reach the pool only through the gate, so none of them manages
//! the lock or its poisoning.

use std::sync::{Arc, Mutex};

use tracing::warn;

use super::DISPATCH_TARGET;
use super::pool::WorkerPool;

/// Shared handle to the single worker pool.
///
/// Concurrent sessions queue on the gate; only one of them talks to the
/// workers at a time, so unit frames from different sessions never
/// interleave on a link.
#[derive(Clone)]
pub(crate) struct DispatchGate {
    inner: Arc<Mutex<WorkerPool>>,
}

impl DispatchGate {
    pub(crate) fn new(pool: WorkerPool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pool)),
        }
    }

    /// Executes a closure with exclusive access to the pool.
    ///
    /// A session that panicked while holding the pool may have left a reply
    /// unread on some link. The next caller drops every link before using the
    /// pool, so later sessions start on fresh connections.
    pub(crate) fn with_pool<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut WorkerPool) -> R,
    {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| {
            warn!(
                target: DISPATCH_TARGET,
                "a session panicked while dispatching; resetting worker links"
            );
            let mut recovered = poisoned.into_inner();
            recovered.reset_links();
            self.inner.clear_poison();
            recovered
        });
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use rstest::{fixture, rstest};

    use super::*;
    use crate::cluster::{UnitReply, UnitRequest};
    use crate::dispatch::{DispatchError, WorkerLink};
    use crate::health::StructuredHealthReporter;

    /// Link that only counts how often it was reset.
    struct ResetCounter {
        resets: Arc<AtomicUsize>,
    }

    impl WorkerLink for ResetCounter {
        fn rank(&self) -> usize {
            1
        }

        fn endpoint(&self) -> String {
            "tcp://127.0.0.1:1".to_owned()
        }

        fn ensure_connected(&mut self) -> Result<(), DispatchError> {
            Ok(())
        }

        fn round_trip(&mut self, request: &UnitRequest) -> Result<UnitReply, DispatchError> {
            Ok(UnitReply::failed(request.ticket, "unused"))
        }

        fn reset(&mut self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn gate_with(links: Vec<Box<dyn WorkerLink>>) -> DispatchGate {
        DispatchGate::new(WorkerPool::new(
            links,
            Arc::new(StructuredHealthReporter::new()),
        ))
    }

    #[fixture]
    fn gate() -> DispatchGate {
        gate_with(Vec::new())
    }

    #[rstest]
    fn with_pool_provides_access(gate: DispatchGate) {
        assert_eq!(gate.with_pool(|pool| pool.len()), 0);
    }

    #[rstest]
    fn sessions_never_hold_the_pool_together(gate: DispatchGate) {
        let inside = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));
        thread::scope(|scope| {
            for _ in 0..4 {
                let session_gate = gate.clone();
                let session_inside = Arc::clone(&inside);
                let session_overlap = Arc::clone(&overlap);
                scope.spawn(move || {
                    session_gate.with_pool(|_| {
                        if session_inside.fetch_add(1, Ordering::SeqCst) > 0 {
                            session_overlap.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_millis(10));
                        session_inside.fetch_sub(1, Ordering::SeqCst);
                    });
                });
            }
        });
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicked_session_resets_links_and_later_sessions_proceed() {
        let resets = Arc::new(AtomicUsize::new(0));
        let links = (0..2)
            .map(|_| {
                Box::new(ResetCounter {
                    resets: Arc::clone(&resets),
                }) as Box<dyn WorkerLink>
            })
            .collect();
        let gate = gate_with(links);
        let doomed = gate.clone();
        let outcome =
            thread::spawn(move || doomed.with_pool(|_| -> usize { panic!("session panicked") }))
                .join();
        assert!(outcome.is_err());

        assert_eq!(gate.with_pool(|pool| pool.len()), 2);
        assert_eq!(resets.load(Ordering::SeqCst), 2, "every link reset once");

        gate.with_pool(|_| ());
        assert_eq!(resets.load(Ordering::SeqCst), 2, "recovery happens once");
    }
}
