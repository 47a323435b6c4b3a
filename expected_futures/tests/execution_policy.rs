/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Where work actually runs for each execution policy.

use std::sync::Arc;

use expected_futures::ContextId;
use expected_futures::ExecutionPolicy;
use expected_futures::Executor;
use expected_futures::FutureOptions;
use expected_futures::Outcome;
use expected_futures::TokioSpawner;

fn executor() -> Executor {
    Executor::new(Arc::new(TokioSpawner::from_current()))
}

#[tokio::test]
async fn named_thread_policy_runs_on_that_context() {
    let executor = executor();
    let game = ContextId::new("game");

    let future = executor.spawn_with(
        {
            let executor = executor.clone();
            move || executor.current_context()
        },
        FutureOptions::with_named_thread(game.clone()),
    );

    assert_eq!(future.await, Outcome::Completed(Some(game)));
}

#[tokio::test]
async fn inline_continuation_reuses_the_antecedent_context() {
    let executor = executor();
    let game = ContextId::new("game-inline");

    let future = executor
        .spawn_with(|| (), FutureOptions::with_named_thread(game.clone()))
        .map_with(
            {
                let executor = executor.clone();
                move |_| executor.current_context()
            },
            FutureOptions::with_policy(ExecutionPolicy::Inline),
        );

    assert_eq!(future.await, Outcome::Completed(Some(game)));
}

#[tokio::test]
async fn current_policy_pins_the_scheduling_context() {
    let executor = executor();
    let game = ContextId::new("game-current");

    // The inner spawn uses the default Current policy from inside the named
    // context, so it must stay there.
    let future = executor.spawn_flat_with(
        {
            let executor = executor.clone();
            move || {
                executor.spawn({
                    let executor = executor.clone();
                    move || executor.current_context()
                })
            }
        },
        FutureOptions::with_named_thread(game.clone()),
    );

    assert_eq!(future.await, Outcome::Completed(Some(game)));
}

#[tokio::test]
async fn pool_policy_runs_off_named_contexts() {
    let executor = executor();

    let future = executor.spawn_with(
        {
            let executor = executor.clone();
            move || executor.current_context()
        },
        FutureOptions::with_policy(ExecutionPolicy::Pool),
    );

    assert_eq!(future.await, Outcome::Completed(None));
}

#[tokio::test]
async fn named_thread_without_target_downgrades_to_current() {
    let executor = executor();

    let options = FutureOptions::builder()
        .policy(ExecutionPolicy::NamedThread)
        .build();
    assert_eq!(options.policy(), ExecutionPolicy::Current);

    let future = executor.spawn_with(|| 1, options);
    assert_eq!(future.await, Outcome::Completed(1));
}

#[tokio::test]
async fn placement_is_recorded_on_the_future() {
    let executor = executor();
    let game = ContextId::new("game-placement");

    let future =
        executor.spawn_with(|| (), FutureOptions::with_named_thread(game.clone()));

    let placement = future.placement();
    assert_eq!(placement.policy(), ExecutionPolicy::NamedThread);
    assert_eq!(placement.context(), Some(&game));
    future.await;
}

#[tokio::test]
async fn then_after_ready_still_dispatches() {
    let executor = executor();
    let game = ContextId::new("game-late");

    let antecedent = executor.spawn_with(|| 9, FutureOptions::with_named_thread(game.clone()));
    assert_eq!(antecedent.clone().await, Outcome::Completed(9));

    // The antecedent already settled; an Inline continuation still posts to
    // its resolved context rather than running under the caller.
    let future = antecedent.map_with(
        {
            let executor = executor.clone();
            move |v| (v, executor.current_context())
        },
        FutureOptions::with_policy(ExecutionPolicy::Inline),
    );

    assert_eq!(future.await, Outcome::Completed((9, Some(game))));
}

#[tokio::test]
async fn independent_continuations_each_choose_their_placement() {
    let executor = executor();
    let game = ContextId::new("game-mixed");

    let base = executor.spawn_with(|| 1, FutureOptions::with_named_thread(game.clone()));

    let inline = base.map_with(
        {
            let executor = executor.clone();
            move |_| executor.current_context()
        },
        FutureOptions::with_policy(ExecutionPolicy::Inline),
    );
    let pooled = base.map_with(
        {
            let executor = executor.clone();
            move |_| executor.current_context()
        },
        FutureOptions::with_policy(ExecutionPolicy::Pool),
    );

    assert_eq!(inline.await, Outcome::Completed(Some(game)));
    assert_eq!(pooled.await, Outcome::Completed(None));
}
