/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The shared consumer handle and its continuation methods.

use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use dupe::Dupe;
use futures::task::AtomicWaker;

use crate::continuation;
use crate::continuation::ContinuationReturn;
use crate::execution::ExecutionPlacement;
use crate::options::FutureOptions;
use crate::outcome::Outcome;
use crate::state::SharedState;
use crate::FutureValue;

/// Consumer handle on a shared state. Cheap to clone; every clone observes
/// the same immutable outcome once the state settles.
///
/// An `ExpectedFuture` never blocks implicitly: [`get`](Self::get) is only
/// valid once [`is_ready`](Self::is_ready) holds, and waiting is spelled as
/// `.await` (it implements [`std::future::Future`], parking its waker on the
/// shared state).
pub struct ExpectedFuture<T: FutureValue> {
    state: Arc<SharedState<T>>,
    parked: Option<ParkedWaker>,
}

struct ParkedWaker {
    key: usize,
    waker: Arc<AtomicWaker>,
}

/// Where a future currently is, for dumps and assertions; deliberately
/// value-free so it can be reported without cloning the outcome.
#[derive(Copy, Clone, Dupe, Debug, PartialEq, Eq)]
pub enum FutureStateForDebugging {
    Pending,
    Completed,
    Errored,
    Cancelled,
}

impl<T: FutureValue> ExpectedFuture<T> {
    pub(crate) fn new(state: Arc<SharedState<T>>) -> Self {
        ExpectedFuture {
            state,
            parked: None,
        }
    }

    pub(crate) fn state(&self) -> &Arc<SharedState<T>> {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// The settled outcome. Calling this before `is_ready()` holds is a
    /// contract violation and panics.
    pub fn get(&self) -> Outcome<T> {
        self.state
            .try_read()
            .expect("get() called on an expected future that is not ready")
    }

    /// The placement this future's work resolved to; `Inline` continuations
    /// reuse it.
    pub fn placement(&self) -> ExecutionPlacement {
        self.state.execution().dupe()
    }

    /// A snapshot of the terminal state for debug output and introspection.
    pub fn state_for_debugging(&self) -> FutureStateForDebugging {
        match self.state.try_read() {
            None => FutureStateForDebugging::Pending,
            Some(Outcome::Completed(..)) => FutureStateForDebugging::Completed,
            Some(Outcome::Errored(..)) => FutureStateForDebugging::Errored,
            Some(Outcome::Cancelled) => FutureStateForDebugging::Cancelled,
            Some(Outcome::Incomplete) => FutureStateForDebugging::Pending,
        }
    }

    /// Run `f` with the completed value once this future settles; skipped on
    /// a non-completed antecedent, which propagates unchanged (type
    /// converted) to the returned future.
    pub fn map<F, R>(&self, f: F) -> ExpectedFuture<R>
    where
        R: FutureValue,
        F: FnOnce(T) -> R + Send + 'static,
    {
        self.map_with(f, FutureOptions::default())
    }

    pub fn map_with<F, R>(&self, f: F, options: FutureOptions) -> ExpectedFuture<R>
    where
        R: FutureValue,
        F: FnOnce(T) -> R + Send + 'static,
    {
        continuation::attach(self, options, move |outcome, promise| match outcome {
            Outcome::Completed(value) => promise.set_value(f(value)),
            other => promise.set_outcome(other.convert_incomplete()),
        })
    }

    /// Like [`map`](Self::map), but `f` returns an [`Outcome`] or another
    /// [`ExpectedFuture`]; a returned future is unwrapped one level, so
    /// chains never nest.
    pub fn and_then<F, R>(&self, f: F) -> ExpectedFuture<R::Unwrapped>
    where
        R: ContinuationReturn,
        F: FnOnce(T) -> R + Send + 'static,
    {
        self.and_then_with(f, FutureOptions::default())
    }

    pub fn and_then_with<F, R>(&self, f: F, options: FutureOptions) -> ExpectedFuture<R::Unwrapped>
    where
        R: ContinuationReturn,
        F: FnOnce(T) -> R + Send + 'static,
    {
        continuation::attach(self, options, move |outcome, promise| match outcome {
            Outcome::Completed(value) => f(value).forward_into(promise),
            other => promise.set_outcome(other.convert_incomplete()),
        })
    }

    /// Run `f` with the full outcome once this future settles. Always
    /// invoked, whatever the antecedent settled to; this is the recovery
    /// path for errored and cancelled antecedents.
    pub fn map_outcome<F, R>(&self, f: F) -> ExpectedFuture<R>
    where
        R: FutureValue,
        F: FnOnce(Outcome<T>) -> R + Send + 'static,
    {
        self.map_outcome_with(f, FutureOptions::default())
    }

    pub fn map_outcome_with<F, R>(&self, f: F, options: FutureOptions) -> ExpectedFuture<R>
    where
        R: FutureValue,
        F: FnOnce(Outcome<T>) -> R + Send + 'static,
    {
        continuation::attach(self, options, move |outcome, promise| {
            promise.set_value(f(outcome))
        })
    }

    /// Outcome-parameter variant of [`and_then`](Self::and_then): always
    /// invoked, returns an [`Outcome`] or a future to unwrap.
    pub fn then<F, R>(&self, f: F) -> ExpectedFuture<R::Unwrapped>
    where
        R: ContinuationReturn,
        F: FnOnce(Outcome<T>) -> R + Send + 'static,
    {
        self.then_with(f, FutureOptions::default())
    }

    pub fn then_with<F, R>(&self, f: F, options: FutureOptions) -> ExpectedFuture<R::Unwrapped>
    where
        R: ContinuationReturn,
        F: FnOnce(Outcome<T>) -> R + Send + 'static,
    {
        continuation::attach(self, options, move |outcome, promise| {
            f(outcome).forward_into(promise)
        })
    }

    /// [`then`](Self::then) bound to `owner`'s lifetime: if the owner is gone
    /// when the antecedent settles, `f` is not invoked and the returned
    /// future settles `Errored(OBJECT_DESTROYED)`.
    pub fn then_bound<O, F, R>(&self, owner: &Arc<O>, f: F) -> ExpectedFuture<R::Unwrapped>
    where
        O: std::any::Any + Send + Sync,
        R: ContinuationReturn,
        F: FnOnce(Outcome<T>) -> R + Send + 'static,
    {
        self.then_with(f, FutureOptions::builder().bound_to(owner).build())
    }
}

impl<T: FutureValue> Clone for ExpectedFuture<T> {
    fn clone(&self) -> Self {
        // The parked waker belongs to the polled handle; clones start fresh.
        ExpectedFuture::new(self.state.dupe())
    }
}

impl<T: FutureValue> Dupe for ExpectedFuture<T> {}

impl<T: FutureValue> std::future::Future for ExpectedFuture<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(parked) = &this.parked {
            parked.waker.register(cx.waker());
            // Re-check after registering so a settle that raced the register
            // is not lost.
            return match this.state.try_read() {
                Some(outcome) => Poll::Ready(outcome),
                None => Poll::Pending,
            };
        }

        if let Some(outcome) = this.state.try_read() {
            return Poll::Ready(outcome);
        }

        let waker = Arc::new(AtomicWaker::new());
        waker.register(cx.waker());
        match this.state.attach_waker(waker.dupe()) {
            Some(key) => {
                this.parked = Some(ParkedWaker { key, waker });
                Poll::Pending
            }
            None => Poll::Ready(
                this.state
                    .try_read()
                    .expect("state settled while parking a waker"),
            ),
        }
    }
}

impl<T: FutureValue> Drop for ExpectedFuture<T> {
    fn drop(&mut self) {
        if let Some(parked) = &self.parked {
            self.state.drop_dependent(parked.key);
        }
    }
}
