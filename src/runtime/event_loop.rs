//! Single-threaded cooperative event loop.
//!
//! Deferred work is a FIFO of tasks. One task is one tick: a task deferred
//! from inside another task runs on a later tick, never inline.
//!
//! # Driving the loop
//!
//! - [`EventLoop::turn`] / [`EventLoop::run_until_idle`] drive the loop
//!   manually, which keeps ordering fully deterministic in tests.
//! - [`EventLoop::run`] consumes tasks as they arrive and is meant to be
//!   spawned on tokio, mirroring a connection event loop.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;
use tracing::{debug, trace};

// ============================================================================
// Types
// ============================================================================

/// A unit of deferred work.
type Task = Box<dyn FnOnce() + Send + 'static>;

/// Messages accepted by the loop.
enum LoopMessage {
    /// Run a task on a later tick.
    Run(Task),
    /// Stop accepting tasks; buffered ones still run.
    Shutdown,
}

// ============================================================================
// Scheduler
// ============================================================================

/// Cloneable handle used to defer work onto an [`EventLoop`].
#[derive(Clone)]
pub struct Scheduler {
    tx: mpsc::UnboundedSender<LoopMessage>,
}

impl Scheduler {
    /// Defers `task` to a later tick.
    ///
    /// Silently dropped if the loop has shut down.
    pub fn defer<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(LoopMessage::Run(Box::new(task))).is_err() {
            trace!("Event loop closed, task dropped");
        }
    }

    /// Asks the loop to stop once its buffered tasks have run.
    pub fn shutdown(&self) {
        let _ = self.tx.send(LoopMessage::Shutdown);
    }

    /// Returns `true` if the loop no longer accepts tasks.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// EventLoop
// ============================================================================

/// The task queue and its consumer.
pub struct EventLoop {
    scheduler: Scheduler,
    rx: mpsc::UnboundedReceiver<LoopMessage>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    /// Creates an empty loop.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            scheduler: Scheduler { tx },
            rx,
        }
    }

    /// Returns a handle for deferring work onto this loop.
    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> Scheduler {
        self.scheduler.clone()
    }

    /// Runs a single task, if one is queued.
    ///
    /// Returns `true` if a task ran.
    pub fn turn(&mut self) -> bool {
        loop {
            match self.rx.try_recv() {
                Ok(LoopMessage::Run(task)) => {
                    task();
                    return true;
                }
                Ok(LoopMessage::Shutdown) => {
                    debug!("Event loop shutdown requested");
                    self.rx.close();
                }
                Err(_) => return false,
            }
        }
    }

    /// Runs tasks until the queue is empty, including tasks deferred while
    /// running.
    ///
    /// Returns the number of tasks run.
    pub fn run_until_idle(&mut self) -> usize {
        let mut count = 0;
        while self.turn() {
            count += 1;
        }
        count
    }

    /// Processes tasks as they arrive until [`Scheduler::shutdown`].
    pub async fn run(mut self) {
        debug!("Event loop started");

        while let Some(message) = self.rx.recv().await {
            match message {
                LoopMessage::Run(task) => task(),
                LoopMessage::Shutdown => {
                    debug!("Event loop shutdown requested");
                    self.rx.close();
                }
            }
        }

        debug!("Event loop terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex;

    #[test]
    fn test_defer_never_runs_inline() {
        let mut event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = Arc::clone(&log);
        scheduler.defer(move || l.lock().push("task"));
        log.lock().push("caller");

        assert_eq!(*log.lock(), vec!["caller"]);
        assert_eq!(event_loop.run_until_idle(), 1);
        assert_eq!(*log.lock(), vec!["caller", "task"]);
    }

    #[test]
    fn test_nested_defer_runs_on_later_tick() {
        let mut event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let log = Arc::new(Mutex::new(Vec::new()));

        let (l, s) = (Arc::clone(&log), scheduler.clone());
        scheduler.defer(move || {
            let inner = Arc::clone(&l);
            s.defer(move || inner.lock().push(2));
            l.lock().push(1);
        });
        let l = Arc::clone(&log);
        scheduler.defer(move || l.lock().push(3));

        assert!(event_loop.turn());
        assert_eq!(*log.lock(), vec![1]);
        assert_eq!(event_loop.run_until_idle(), 2);
        assert_eq!(*log.lock(), vec![1, 3, 2]);
    }

    #[test]
    fn test_shutdown_drains_then_rejects() {
        let mut event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let log = Arc::new(Mutex::new(0));

        let l = Arc::clone(&log);
        scheduler.defer(move || *l.lock() += 1);
        scheduler.shutdown();

        assert_eq!(event_loop.run_until_idle(), 1);
        assert!(scheduler.is_closed());

        let l = Arc::clone(&log);
        scheduler.defer(move || *l.lock() += 1);
        assert_eq!(event_loop.run_until_idle(), 0);
        assert_eq!(*log.lock(), 1);
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let handle = tokio::spawn(event_loop.run());

        let (tx, rx) = tokio::sync::oneshot::channel();
        scheduler.defer(move || {
            let _ = tx.send(42);
        });
        assert_eq!(rx.await.expect("task ran"), 42);

        scheduler.shutdown();
        handle.await.expect("loop exits");
    }
}
