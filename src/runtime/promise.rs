//! Deferred/promise primitive.
//!
//! A [`Promise`] settles exactly once, to a value or a reason, and
//! accumulates handlers on that one shared state. It is not a
//! value-transforming chain: [`Promise::then`] returns the same promise.
//!
//! # Scheduling
//!
//! - The executor passed to [`Promise::new`] runs on a later tick, so
//!   handlers attached right after construction are always in place first.
//! - Settling a pending promise flushes its queued handlers on a later
//!   tick, never inside the `resolve`/`reject` call.
//! - A handler attached after the flush fires immediately, inside the
//!   attaching call. A handler attached between settlement and the flush
//!   joins the queued batch, so registration order is kept.

// ============================================================================
// Imports
// ============================================================================

use std::convert::Infallible;
use std::fmt;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

use crate::error::Result;

use super::event_loop::Scheduler;

// ============================================================================
// Types
// ============================================================================

type FulfillHandler<T> = Box<dyn FnOnce(&T) + Send + 'static>;
type RejectHandler<E> = Box<dyn FnOnce(&E) + Send + 'static>;
type SettleHandler<T, E> = Box<dyn FnOnce(std::result::Result<&T, &E>) + Send + 'static>;

/// Observable state of a promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with a reason.
    Rejected,
}

/// Settled payload, shared so handlers run without holding the lock.
enum Outcome<T, E> {
    Pending,
    Fulfilled(Arc<T>),
    Rejected(Arc<E>),
}

impl<T, E> Clone for Outcome<T, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Pending => Self::Pending,
            Self::Fulfilled(value) => Self::Fulfilled(Arc::clone(value)),
            Self::Rejected(reason) => Self::Rejected(Arc::clone(reason)),
        }
    }
}

struct Shared<T, E> {
    outcome: Outcome<T, E>,
    on_fulfilled: Vec<FulfillHandler<T>>,
    on_rejected: Vec<RejectHandler<E>>,
    on_settled: Vec<SettleHandler<T, E>>,
    /// A flush task is queued or running.
    flushing: bool,
}

impl<T, E> Shared<T, E> {
    fn new() -> Self {
        Self {
            outcome: Outcome::Pending,
            on_fulfilled: Vec::new(),
            on_rejected: Vec::new(),
            on_settled: Vec::new(),
            flushing: false,
        }
    }

    fn has_handlers(&self) -> bool {
        !(self.on_fulfilled.is_empty() && self.on_rejected.is_empty() && self.on_settled.is_empty())
    }
}

/// Handlers taken out of the shared state for one invocation round.
struct Batch<T, E> {
    on_fulfilled: Vec<FulfillHandler<T>>,
    on_rejected: Vec<RejectHandler<E>>,
    on_settled: Vec<SettleHandler<T, E>>,
}

impl<T, E> Batch<T, E> {
    fn take(shared: &mut Shared<T, E>) -> Self {
        Self {
            on_fulfilled: mem::take(&mut shared.on_fulfilled),
            on_rejected: mem::take(&mut shared.on_rejected),
            on_settled: mem::take(&mut shared.on_settled),
        }
    }

    fn invoke(self, outcome: &Outcome<T, E>) {
        match outcome {
            Outcome::Fulfilled(value) => {
                let value = value.as_ref();
                for handler in self.on_fulfilled {
                    handler(value);
                }
                for handler in self.on_settled {
                    handler(Ok(value));
                }
            }
            Outcome::Rejected(reason) => {
                let reason = reason.as_ref();
                for handler in self.on_rejected {
                    handler(reason);
                }
                for handler in self.on_settled {
                    handler(Err(reason));
                }
            }
            Outcome::Pending => {}
        }
    }
}

// ============================================================================
// Promise
// ============================================================================

/// A future value with one-time settlement.
///
/// Cloning yields another handle to the same state.
pub struct Promise<T, E = Infallible> {
    shared: Arc<Mutex<Shared<T, E>>>,
    scheduler: Scheduler,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<T, E> Promise<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Creates a pending promise and defers `executor` to the next tick.
    pub fn new<F>(scheduler: &Scheduler, executor: F) -> Self
    where
        F: FnOnce(Resolver<T, E>) + Send + 'static,
    {
        let promise = Self::pending(scheduler);
        let resolver = promise.resolver();
        scheduler.defer(move || executor(resolver));
        promise
    }

    fn pending(scheduler: &Scheduler) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::new())),
            scheduler: scheduler.clone(),
        }
    }

    fn resolver(&self) -> Resolver<T, E> {
        Resolver {
            shared: Arc::clone(&self.shared),
            scheduler: self.scheduler.clone(),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> PromiseState {
        match self.shared.lock().outcome {
            Outcome::Pending => PromiseState::Pending,
            Outcome::Fulfilled(_) => PromiseState::Fulfilled,
            Outcome::Rejected(_) => PromiseState::Rejected,
        }
    }

    /// Returns `true` while the promise is unsettled.
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state() == PromiseState::Pending
    }

    /// Registers a fulfillment and a rejection handler.
    ///
    /// Returns the same promise so registrations can be accumulated.
    pub fn then<F, R>(&self, on_fulfilled: F, on_rejected: R) -> &Self
    where
        F: FnOnce(&T) + Send + 'static,
        R: FnOnce(&E) + Send + 'static,
    {
        self.attach(Some(Box::new(on_fulfilled)), Some(Box::new(on_rejected)), None)
    }

    /// Registers only a fulfillment handler.
    pub fn on_fulfilled<F>(&self, on_fulfilled: F) -> &Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.attach(Some(Box::new(on_fulfilled)), None, None)
    }

    /// Registers only a rejection handler.
    pub fn catch<R>(&self, on_rejected: R) -> &Self
    where
        R: FnOnce(&E) + Send + 'static,
    {
        self.attach(None, Some(Box::new(on_rejected)), None)
    }

    /// Registers a handler that fires once on either outcome.
    pub fn all<A>(&self, on_settled: A) -> &Self
    where
        A: FnOnce(std::result::Result<&T, &E>) + Send + 'static,
    {
        self.attach(None, None, Some(Box::new(on_settled)))
    }

    fn attach(
        &self,
        on_fulfilled: Option<FulfillHandler<T>>,
        on_rejected: Option<RejectHandler<E>>,
        on_settled: Option<SettleHandler<T, E>>,
    ) -> &Self {
        let outcome = {
            let mut shared = self.shared.lock();
            if matches!(shared.outcome, Outcome::Pending) || shared.flushing {
                shared.on_fulfilled.extend(on_fulfilled);
                shared.on_rejected.extend(on_rejected);
                shared.on_settled.extend(on_settled);
                return self;
            }
            shared.outcome.clone()
        };

        Batch {
            on_fulfilled: on_fulfilled.into_iter().collect(),
            on_rejected: on_rejected.into_iter().collect(),
            on_settled: on_settled.into_iter().collect(),
        }
        .invoke(&outcome);

        self
    }

    /// Waits for settlement from async code.
    ///
    /// The loop that owns this promise's scheduler must be running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`](crate::Error::ChannelClosed) if the
    /// promise is dropped before it settles.
    pub async fn wait(&self) -> Result<std::result::Result<T, E>>
    where
        T: Clone,
        E: Clone,
    {
        let (tx, rx) = oneshot::channel();
        self.all(move |outcome| {
            let _ = tx.send(outcome.map(T::clone).map_err(E::clone));
        });
        Ok(rx.await?)
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// The settling side of a promise.
pub struct Resolver<T, E = Infallible> {
    shared: Arc<Mutex<Shared<T, E>>>,
    scheduler: Scheduler,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T, E> Resolver<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Fulfills the promise. No-op if already settled.
    pub fn resolve(&self, value: T) {
        self.settle(Outcome::Fulfilled(Arc::new(value)));
    }

    /// Rejects the promise. No-op if already settled.
    pub fn reject(&self, reason: E) {
        self.settle(Outcome::Rejected(Arc::new(reason)));
    }

    /// Returns `true` once the promise has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(self.shared.lock().outcome, Outcome::Pending)
    }

    fn settle(&self, outcome: Outcome<T, E>) {
        {
            let mut shared = self.shared.lock();
            if !matches!(shared.outcome, Outcome::Pending) {
                trace!("Promise already settled, ignoring");
                return;
            }
            shared.outcome = outcome;
            shared.flushing = true;
        }

        let shared = Arc::clone(&self.shared);
        self.scheduler.defer(move || flush(&shared));
    }
}

/// Invokes queued handlers until none are left.
///
/// Handlers registered by a running handler join the next round.
fn flush<T, E>(shared: &Mutex<Shared<T, E>>) {
    loop {
        let (batch, outcome) = {
            let mut guard = shared.lock();
            if !guard.has_handlers() {
                guard.flushing = false;
                return;
            }
            (Batch::take(&mut guard), guard.outcome.clone())
        };
        batch.invoke(&outcome);
    }
}

// ============================================================================
// Deferred
// ============================================================================

/// A pending promise paired with its resolver.
pub struct Deferred<T, E = Infallible> {
    /// The observing side.
    pub promise: Promise<T, E>,
    /// The settling side.
    pub resolver: Resolver<T, E>,
}

impl<T, E> Deferred<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Creates a pending promise whose resolver is available immediately.
    #[must_use]
    pub fn new(scheduler: &Scheduler) -> Self {
        let promise = Promise::pending(scheduler);
        let resolver = promise.resolver();
        Self { promise, resolver }
    }

    /// Splits into the promise and the resolver.
    #[inline]
    #[must_use]
    pub fn into_parts(self) -> (Promise<T, E>, Resolver<T, E>) {
        (self.promise, self.resolver)
    }
}

// ============================================================================
// Tests
// ============================================================================
