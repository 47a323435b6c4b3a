/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Cancellation registries, broken promises and task abandonment.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use expected_futures::codes;
use expected_futures::CancellationRegistry;
use expected_futures::ContextId;
use expected_futures::Error;
use expected_futures::ExecutionPolicy;
use expected_futures::Executor;
use expected_futures::FutureOptions;
use expected_futures::Outcome;
use expected_futures::ScheduledTask;
use expected_futures::Spawner;
use expected_futures::SubmitTarget;
use expected_futures::TokioSpawner;

fn executor() -> Executor {
    Executor::new(Arc::new(TokioSpawner::from_current()))
}

#[tokio::test]
async fn cancel_before_spawn_skips_the_work() {
    let executor = executor();
    let registry = CancellationRegistry::new();
    registry.cancel();

    let ran = Arc::new(AtomicBool::new(false));
    let future = executor.spawn_with(
        {
            let ran = ran.clone();
            move || {
                ran.store(true, Ordering::SeqCst);
                5
            }
        },
        FutureOptions::with_cancellation(registry),
    );

    assert_eq!(future.await, Outcome::Cancelled);
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn cancel_after_settlement_has_no_effect() {
    let executor = executor();
    let registry = CancellationRegistry::new();

    let future = executor.spawn_with(|| 5, FutureOptions::with_cancellation(registry.clone()));
    assert_eq!(future.clone().await, Outcome::Completed(5));

    registry.cancel();
    assert_eq!(future.get(), Outcome::Completed(5));
}

#[tokio::test]
async fn cancel_and_set_race_settles_exactly_once() {
    let executor = executor();

    for _ in 0..64 {
        let registry = CancellationRegistry::new();
        let future = executor.spawn_with(
            || 5,
            FutureOptions::builder()
                .policy(ExecutionPolicy::Pool)
                .cancellation(registry.clone())
                .build(),
        );
        registry.cancel();

        let outcome = future.await;
        assert_matches!(outcome, Outcome::Completed(5) | Outcome::Cancelled);
    }
}

#[tokio::test]
async fn registered_promise_settles_cancelled() {
    let executor = executor();
    let registry = CancellationRegistry::new();

    let promise =
        executor.promise_with::<i32>(FutureOptions::with_cancellation(registry.clone()));
    let future = promise.future();

    registry.cancel();
    registry.cancel();

    assert_eq!(future.await, Outcome::Cancelled);

    // A late set is dropped by the single-assignment guard.
    promise.set_value(5);
    assert_eq!(promise.future().get(), Outcome::Cancelled);
}

#[tokio::test]
async fn outcome_continuation_observes_cancellation() {
    let executor = executor();

    let future = executor
        .cancelled::<i32>()
        .then(|outcome| Outcome::completed(outcome.is_cancelled()));

    assert_eq!(future.await, Outcome::Completed(true));
}

#[tokio::test]
async fn value_continuation_is_skipped_on_cancellation() {
    let executor = executor();
    let ran = Arc::new(AtomicBool::new(false));

    let future = executor.cancelled::<i32>().map({
        let ran = ran.clone();
        move |v| {
            ran.store(true, Ordering::SeqCst);
            v
        }
    });

    assert_eq!(future.await, Outcome::Cancelled);
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn recovery_after_a_skipped_continuation() {
    let executor = executor();

    let future = executor
        .cancelled::<i32>()
        .map(|v| v + 1)
        .map_outcome(|outcome| outcome.is_cancelled());

    assert_eq!(future.await, Outcome::Completed(true));
}

#[tokio::test]
async fn downstream_cancelled_while_queued_skips_user_code() {
    let executor = executor();
    let registry = CancellationRegistry::new();
    let ran = Arc::new(AtomicBool::new(false));

    let promise = executor.promise::<i32>();
    let downstream = promise.future().map_with(
        {
            let ran = ran.clone();
            move |v| {
                ran.store(true, Ordering::SeqCst);
                v
            }
        },
        FutureOptions::with_cancellation(registry.clone()),
    );

    registry.cancel();
    promise.set_value(3);

    assert_eq!(downstream.await, Outcome::Cancelled);
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn dropping_an_unset_promise_cancels_its_futures() {
    let executor = executor();

    let promise = executor.promise::<i32>();
    let future = promise.future();
    drop(promise);

    assert_eq!(future.await, Outcome::Cancelled);
}

/// A host that never runs anything: every submission is dropped on the
/// floor, which is exactly what pool abandonment looks like.
struct RejectingSpawner;

impl Spawner for RejectingSpawner {
    fn submit(&self, _target: SubmitTarget, task: ScheduledTask) {
        drop(task);
    }

    fn submit_after(&self, _delay: Duration, task: ScheduledTask) {
        drop(task);
    }

    fn current_context(&self) -> Option<ContextId> {
        None
    }
}

#[tokio::test]
async fn abandoned_pool_task_cancels_the_supplied_registry() {
    let executor = Executor::new(Arc::new(RejectingSpawner));
    let registry = CancellationRegistry::new();

    let future = executor.spawn_with(
        || 5,
        FutureOptions::builder()
            .policy(ExecutionPolicy::Pool)
            .cancellation(registry.clone())
            .build(),
    );

    assert_eq!(future.await, Outcome::Cancelled);
    assert!(registry.is_cancelled());
}

#[tokio::test]
async fn abandoned_pool_task_without_a_registry_still_cancels() {
    let executor = Executor::new(Arc::new(RejectingSpawner));

    let future = executor.spawn_with(|| 5, FutureOptions::with_policy(ExecutionPolicy::Pool));

    assert_eq!(future.await, Outcome::Cancelled);
}

#[tokio::test]
async fn bound_continuation_runs_while_the_owner_lives() {
    let executor = executor();
    let owner = Arc::new("owner".to_owned());

    let promise = executor.promise::<i32>();
    let future = promise
        .future()
        .then_bound(&owner, |outcome| Outcome::completed(outcome.is_completed()));

    promise.set_value(1);
    assert_eq!(future.await, Outcome::Completed(true));
}

#[tokio::test]
async fn bound_continuation_errors_once_the_owner_is_gone() {
    let executor = executor();
    let owner = Arc::new("owner".to_owned());

    let promise = executor.promise::<i32>();
    let future = promise
        .future()
        .then_bound(&owner, |outcome| Outcome::completed(outcome.is_completed()));

    drop(owner);
    promise.set_value(1);

    let outcome = future.await;
    assert!(outcome.is_errored());
    assert_eq!(outcome.error().code(), codes::OBJECT_DESTROYED);
}

#[tokio::test]
async fn late_listener_on_a_cancelled_registry() {
    let executor = executor();
    let registry = CancellationRegistry::new();
    registry.cancel();

    let future = executor
        .ready(1)
        .map_with(|v| v, FutureOptions::with_cancellation(registry));

    // The downstream promise was cancelled at registration, before the
    // (already ready) antecedent could dispatch the continuation.
    assert_eq!(future.await, Outcome::Cancelled);
}

#[tokio::test]
async fn errored_is_distinct_from_cancelled() {
    let executor = executor();

    let errored = executor.err::<i32>(Error::new(1)).await;
    let cancelled = executor.cancelled::<i32>().await;

    assert!(errored.is_errored() && !errored.is_cancelled());
    assert!(cancelled.is_cancelled() && !cancelled.is_errored());
}
