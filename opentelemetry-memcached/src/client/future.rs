//! Result handles for asynchronous cache operations.
//!
//! An [`OperationFuture`] is the handle a client implementation returns from
//! every asynchronous operation. It resolves exactly once, through the
//! [`OperationCompleter`] created alongside it, and can be observed three
//! ways: by registering a one-shot [`CompletionListener`], by blocking on
//! [`OperationFuture::get`], or by `.await`ing it.
//!
//! Ordering contract: listeners run on the resolving thread, before blocked
//! [`get`] callers and parked `await`ers are released. Listeners registered
//! after resolution run immediately on the registering thread.
//!
//! [`get`]: OperationFuture::get

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

use opentelemetry::otel_warn;

use super::error::MemcacheError;
use super::types::{OperationStatus, Value};

/// Handle for a single-key retrieval.
pub type GetFuture = OperationFuture<Option<Value>>;

/// Handle for a bulk retrieval. Carries the aggregate batch status only.
pub type BulkGetFuture = OperationFuture<HashMap<String, Value>>;

/// One-shot observer of an [`OperationFuture`]'s resolution.
///
/// Invoked exactly once, by value, so a fired listener is inert by
/// construction. The invocation happens on whichever thread resolves the
/// handle, which is usually not the thread that registered the listener.
pub trait CompletionListener<T>: Send {
    /// Called once the handle has resolved.
    fn on_complete(self: Box<Self>, outcome: &OperationOutcome<T>);
}

/// Terminal snapshot of a resolved operation: the payload (or error) plus
/// the [`OperationStatus`] the client reported for it.
#[derive(Debug)]
pub struct OperationOutcome<T> {
    result: Result<T, MemcacheError>,
    status: OperationStatus,
}

impl<T> OperationOutcome<T> {
    /// The status the client reported when the operation concluded.
    pub fn status(&self) -> &OperationStatus {
        &self.status
    }

    /// The operation's payload, or the error it failed with.
    pub fn result(&self) -> Result<&T, &MemcacheError> {
        self.result.as_ref()
    }
}

enum State<T> {
    Pending {
        listeners: Vec<Box<dyn CompletionListener<T>>>,
        wakers: Vec<Waker>,
    },
    // Resolution observed but listeners are still running; waiters stay
    // parked until the listeners have returned.
    Notifying {
        outcome: Arc<OperationOutcome<T>>,
        wakers: Vec<Waker>,
    },
    Resolved(Arc<OperationOutcome<T>>),
}

struct Shared<T> {
    state: Mutex<State<T>>,
    resolved: Condvar,
}

impl<T> Shared<T> {
    // A poisoned state mutex means a completion listener panicked; the
    // recorded state itself is still consistent.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Handle to an in-flight asynchronous cache operation.
///
/// Cloning is cheap and every clone observes the same resolution.
pub struct OperationFuture<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for OperationFuture<T> {
    fn clone(&self) -> Self {
        OperationFuture {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for OperationFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationFuture")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl<T> OperationFuture<T> {
    /// Creates an unresolved handle plus the completer that resolves it.
    pub fn pending() -> (Self, OperationCompleter<T>) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::Pending {
                listeners: Vec::new(),
                wakers: Vec::new(),
            }),
            resolved: Condvar::new(),
        });
        let future = OperationFuture {
            shared: Arc::clone(&shared),
        };
        (future, OperationCompleter {
            shared: Some(shared),
        })
    }

    /// Creates a handle that is resolved on arrival.
    ///
    /// Used by clients that conclude an operation before dispatching any
    /// work, e.g. when rejecting a request during shutdown.
    pub fn ready(result: Result<T, MemcacheError>, status: OperationStatus) -> Self {
        let outcome = Arc::new(OperationOutcome { result, status });
        OperationFuture {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Resolved(outcome)),
                resolved: Condvar::new(),
            }),
        }
    }

    /// Registers a one-shot listener.
    ///
    /// If the handle has already resolved the listener fires immediately on
    /// the calling thread; otherwise it fires on the resolving thread.
    pub fn add_listener<L>(&self, listener: L)
    where
        L: CompletionListener<T> + 'static,
    {
        let fire_with = {
            let mut state = self.shared.lock();
            match &mut *state {
                State::Pending { listeners, .. } => {
                    listeners.push(Box::new(listener));
                    return;
                }
                State::Notifying { outcome, .. } | State::Resolved(outcome) => {
                    Arc::clone(outcome)
                }
            }
        };
        Box::new(listener).on_complete(&fire_with);
    }

    /// The terminal status, or `None` while the operation is in flight.
    pub fn status(&self) -> Option<OperationStatus> {
        match &*self.shared.lock() {
            State::Pending { .. } => None,
            State::Notifying { outcome, .. } | State::Resolved(outcome) => {
                Some(outcome.status.clone())
            }
        }
    }

    fn is_resolved(&self) -> bool {
        matches!(&*self.shared.lock(), State::Resolved(_))
    }
}

impl<T: Clone> OperationFuture<T> {
    /// Blocks the calling thread until the operation resolves.
    pub fn get(&self) -> Result<T, MemcacheError> {
        let mut state = self.shared.lock();
        loop {
            match &*state {
                State::Resolved(outcome) => return outcome.result.clone(),
                _ => {
                    state = match self.shared.resolved.wait(state) {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                }
            }
        }
    }
}

impl<T: Clone> Future for OperationFuture<T> {
    type Output = Result<T, MemcacheError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.lock();
        match &mut *state {
            State::Resolved(outcome) => Poll::Ready(outcome.result.clone()),
            State::Pending { wakers, .. } | State::Notifying { wakers, .. } => {
                if !wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

/// Resolves exactly one [`OperationFuture`], exactly once.
///
/// Consumed by [`resolve`]; a completer dropped without resolving leaves the
/// handle pending forever, matching a client whose operation never comes
/// back.
///
/// [`resolve`]: OperationCompleter::resolve
pub struct OperationCompleter<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> fmt::Debug for OperationCompleter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationCompleter")
            .field("pending", &self.shared.is_some())
            .finish()
    }
}

impl<T> OperationCompleter<T> {
    /// Resolves the handle, runs its listeners, then releases waiters.
    pub fn resolve(mut self, result: Result<T, MemcacheError>, status: OperationStatus) {
        let Some(shared) = self.shared.take() else {
            return;
        };
        let outcome = Arc::new(OperationOutcome { result, status });

        let listeners = {
            let mut state = shared.lock();
            match &mut *state {
                State::Pending { listeners, wakers } => {
                    let listeners = std::mem::take(listeners);
                    let wakers = std::mem::take(wakers);
                    *state = State::Notifying {
                        outcome: Arc::clone(&outcome),
                        wakers,
                    };
                    listeners
                }
                // Only one completer exists per handle, so the state must
                // still be pending.
                _ => return,
            }
        };

        for listener in listeners {
            listener.on_complete(&outcome);
        }

        let wakers = {
            let mut state = shared.lock();
            match &mut *state {
                State::Notifying { wakers, .. } => {
                    let wakers = std::mem::take(wakers);
                    *state = State::Resolved(outcome);
                    wakers
                }
                _ => Vec::new(),
            }
        };
        for waker in wakers {
            waker.wake();
        }
        shared.resolved.notify_all();
    }
}

impl<T> Drop for OperationCompleter<T> {
    fn drop(&mut self) {
        if self.shared.is_some() {
            otel_warn!(
                name: "OperationFuture.CompleterDropped",
                message = "operation handle abandoned without resolving; its span will not finish"
            );
        }
    }
}
