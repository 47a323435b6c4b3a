/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Continuation attachment and execution.
//!
//! Every continuation method on [`ExpectedFuture`] funnels through
//! [`attach`]: it allocates the downstream state with a placement resolved
//! against the antecedent, registers cancellation, and packages the user
//! callable into a [`ScheduledTask`] that the antecedent's completion event
//! dispatches through the spawner. The parameter-shape dispatch (skip on
//! non-completed vs. always invoke) lives in the per-method closures; the
//! return-shape dispatch lives in [`ContinuationReturn`].

use std::sync::Arc;
use std::sync::Weak;

use dupe::Dupe;

use crate::cancellation::CancellablePromise;
use crate::cancellation::CancellationRegistry;
use crate::error::codes;
use crate::error::Error;
use crate::execution::ExecutionPlacement;
use crate::future::ExpectedFuture;
use crate::options::FutureOptions;
use crate::outcome::Outcome;
use crate::promise::Promise;
use crate::spawner::ScheduledTask;
use crate::spawner::SubmitTarget;
use crate::state::SharedState;
use crate::FutureValue;

mod sealed {
    pub trait Sealed {}

    impl<T: crate::FutureValue> Sealed for crate::Outcome<T> {}
    impl<T: crate::FutureValue> Sealed for crate::ExpectedFuture<T> {}
}

/// What a continuation (or spawned function) may return when it is not a
/// plain value: a ready outcome, or a nested future that gets unwrapped one
/// level into the downstream promise.
pub trait ContinuationReturn: sealed::Sealed + Send + 'static {
    type Unwrapped: FutureValue;

    /// Settle `downstream` from this return value.
    fn forward_into(self, downstream: Promise<Self::Unwrapped>);
}

impl<T: FutureValue> ContinuationReturn for Outcome<T> {
    type Unwrapped = T;

    fn forward_into(self, downstream: Promise<T>) {
        downstream.set_outcome(self);
    }
}

impl<T: FutureValue> ContinuationReturn for ExpectedFuture<T> {
    type Unwrapped = T;

    fn forward_into(self, downstream: Promise<T>) {
        // The unwrap step: copy the inner future's outcome across as soon as
        // it settles.
        self.state().attach_observer(Box::new(move |outcome| {
            downstream.set_outcome(outcome.clone());
        }));
    }
}

/// Register the downstream state with the options' registry, creating one
/// when pool submission demands an abandonment path and none was supplied.
/// Returns the registry that abandonment should cancel, if any.
pub(crate) fn cancellation_for_task<T: FutureValue>(
    options: &FutureOptions,
    target: &SubmitTarget,
    state: &Arc<SharedState<T>>,
) -> Option<Arc<CancellationRegistry>> {
    let registry = match (options.cancellation(), target) {
        (Some(registry), _) => Some(registry.dupe()),
        (None, SubmitTarget::Pool) => Some(CancellationRegistry::new()),
        (None, SubmitTarget::Context(..)) => None,
    };
    if let Some(registry) = &registry {
        let trait_state: Arc<dyn CancellablePromise> = state.clone();
        let weak: Weak<dyn CancellablePromise> = Arc::downgrade(&trait_state);
        registry.add_listener(weak);
    }
    registry
}

/// Attach a continuation to `antecedent`. `run` receives the antecedent's
/// settled outcome and the downstream promise, and encodes the
/// parameter/return shape of the user callable.
pub(crate) fn attach<P, R, Run>(
    antecedent: &ExpectedFuture<P>,
    options: FutureOptions,
    run: Run,
) -> ExpectedFuture<R>
where
    P: FutureValue,
    R: FutureValue,
    Run: FnOnce(Outcome<P>, Promise<R>) + Send + 'static,
{
    let spawner = antecedent.state().spawner().dupe();
    let placement = ExecutionPlacement::for_continuation(
        options.policy(),
        options.named_target(),
        antecedent.state().execution(),
        spawner.as_ref(),
    );
    let target = placement.submit_target();

    let state = SharedState::<R>::new(placement, spawner);
    let registry = cancellation_for_task(&options, &target, &state);
    let future = ExpectedFuture::new(state.dupe());
    let promise = Promise::new(state);

    let monitor = options.lifetime_monitor().cloned();
    let prev = antecedent.dupe();
    let task = ScheduledTask::with_cancellation(
        Box::new(move || {
            // A downstream that was cancelled while queued skips the user
            // callable entirely.
            if promise.is_set() {
                return;
            }
            if let Some(owner) = &monitor {
                if owner.upgrade().is_none() {
                    promise.set_error(
                        Error::new(codes::OBJECT_DESTROYED)
                            .with_info("continuation owner released before the antecedent settled"),
                    );
                    return;
                }
            }
            run(prev.get(), promise);
        }),
        registry,
    );

    antecedent.state().attach_continuation(target, task);
    future
}
