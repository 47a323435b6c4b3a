/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The public entry point: spawning work and constructing settled futures.
//!
//! An [`Executor`] is a handle over a host [`Spawner`]; the core keeps no
//! globals, so every future created through an executor carries its spawner
//! along for continuation dispatch.

use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use dupe::Dupe;

use crate::cancellation::CancellablePromise;
use crate::continuation;
use crate::continuation::ContinuationReturn;
use crate::error::Error;
use crate::execution::ContextId;
use crate::execution::ExecutionPlacement;
use crate::future::ExpectedFuture;
use crate::options::FutureOptions;
use crate::outcome::Outcome;
use crate::promise::Promise;
use crate::spawner::ScheduledTask;
use crate::spawner::Spawner;
use crate::state::SharedState;
use crate::FutureValue;

#[derive(Clone)]
pub struct Executor {
    spawner: Arc<dyn Spawner>,
}

impl Dupe for Executor {}

impl Executor {
    pub fn new(spawner: Arc<dyn Spawner>) -> Self {
        Executor { spawner }
    }

    pub(crate) fn spawner(&self) -> &Arc<dyn Spawner> {
        &self.spawner
    }

    /// The named context the calling thread belongs to, if any.
    pub fn current_context(&self) -> Option<ContextId> {
        self.spawner.current_context()
    }

    /// Schedule `f` and return a future on its result.
    pub fn spawn<F, R>(&self, f: F) -> ExpectedFuture<R>
    where
        R: FutureValue,
        F: FnOnce() -> R + Send + 'static,
    {
        self.spawn_with(f, FutureOptions::default())
    }

    pub fn spawn_with<F, R>(&self, f: F, options: FutureOptions) -> ExpectedFuture<R>
    where
        R: FutureValue,
        F: FnOnce() -> R + Send + 'static,
    {
        self.spawn_task(options, move |promise| promise.set_value(f()))
    }

    /// Like [`spawn`](Self::spawn), but `f` returns an [`Outcome`] or an
    /// [`ExpectedFuture`]; a returned future is unwrapped one level.
    pub fn spawn_flat<F, R>(&self, f: F) -> ExpectedFuture<R::Unwrapped>
    where
        R: ContinuationReturn,
        F: FnOnce() -> R + Send + 'static,
    {
        self.spawn_flat_with(f, FutureOptions::default())
    }

    pub fn spawn_flat_with<F, R>(&self, f: F, options: FutureOptions) -> ExpectedFuture<R::Unwrapped>
    where
        R: ContinuationReturn,
        F: FnOnce() -> R + Send + 'static,
    {
        self.spawn_task(options, move |promise| f().forward_into(promise))
    }

    fn spawn_task<R, Run>(&self, options: FutureOptions, run: Run) -> ExpectedFuture<R>
    where
        R: FutureValue,
        Run: FnOnce(Promise<R>) + Send + 'static,
    {
        let placement = ExecutionPlacement::for_root(
            options.policy(),
            options.named_target(),
            self.spawner.as_ref(),
        );
        let target = placement.submit_target();

        let state = SharedState::<R>::new(placement, self.spawner.dupe());
        let registry = continuation::cancellation_for_task(&options, &target, &state);
        let future = ExpectedFuture::new(state.dupe());
        let promise = Promise::new(state);

        let task = ScheduledTask::with_cancellation(
            Box::new(move || {
                // Cancelled before the scheduler got to us; skip the work.
                if promise.is_set() {
                    return;
                }
                run(promise);
            }),
            registry,
        );
        self.spawner.submit(target, task);
        future
    }

    /// A bare producer handle; consumers come from [`Promise::future`].
    pub fn promise<T: FutureValue>(&self) -> Promise<T> {
        Promise::new(SharedState::new(self.root_placement(), self.spawner.dupe()))
    }

    /// A bare producer handle honouring the supplied options: the placement
    /// is resolved now (so `Inline` continuations can reuse it) and a
    /// supplied cancellation registry gets the promise as a listener.
    pub fn promise_with<T: FutureValue>(&self, options: FutureOptions) -> Promise<T> {
        let placement = ExecutionPlacement::for_root(
            options.policy(),
            options.named_target(),
            self.spawner.as_ref(),
        );
        let state = SharedState::<T>::new(placement, self.spawner.dupe());
        if let Some(registry) = options.cancellation() {
            let trait_state: Arc<dyn CancellablePromise> = state.clone();
            let weak: Weak<dyn CancellablePromise> = Arc::downgrade(&trait_state);
            registry.add_listener(weak);
        }
        Promise::new(state)
    }

    /// A future settled `Completed(value)` from the start.
    pub fn ready<T: FutureValue>(&self, value: T) -> ExpectedFuture<T> {
        self.ready_outcome(Outcome::Completed(value))
    }

    pub fn ready_unit(&self) -> ExpectedFuture<()> {
        self.ready(())
    }

    pub fn ready_outcome<T: FutureValue>(&self, outcome: Outcome<T>) -> ExpectedFuture<T> {
        ExpectedFuture::new(SharedState::new_ready(
            outcome,
            self.root_placement(),
            self.spawner.dupe(),
        ))
    }

    /// A future settled `Errored(error)` from the start.
    pub fn err<T: FutureValue>(&self, error: Error) -> ExpectedFuture<T> {
        self.ready_outcome(Outcome::Errored(error))
    }

    /// A settled future carrying the failure of a differently-typed outcome.
    /// Panics on a completed outcome, same as
    /// [`Outcome::convert_incomplete`].
    pub fn err_from<T: FutureValue, O>(&self, outcome: &Outcome<O>) -> ExpectedFuture<T> {
        self.ready_outcome(outcome.convert_incomplete())
    }

    /// A future settled `Cancelled` from the start.
    pub fn cancelled<T: FutureValue>(&self) -> ExpectedFuture<T> {
        self.ready_outcome(Outcome::Cancelled)
    }

    /// A future that completes (with unit) once the host timer has waited at
    /// least `delay`.
    pub fn delay(&self, delay: Duration) -> ExpectedFuture<()> {
        let state = SharedState::<()>::new(self.root_placement(), self.spawner.dupe());
        let future = ExpectedFuture::new(state.dupe());
        let promise = Promise::new(state);
        self.spawner.submit_after(
            delay,
            ScheduledTask::new(Box::new(move || promise.set_value(()))),
        );
        future
    }

    pub(crate) fn root_placement(&self) -> ExecutionPlacement {
        ExecutionPlacement::for_root(
            crate::ExecutionPolicy::Current,
            None,
            self.spawner.as_ref(),
        )
    }
}
