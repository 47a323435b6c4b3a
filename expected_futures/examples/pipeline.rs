/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Chains a small pipeline across the pool and a named context, then shows
//! cooperative cancellation cutting a second pipeline short.

use std::sync::Arc;
use std::time::Duration;

use expected_futures::CancellationRegistry;
use expected_futures::ContextId;
use expected_futures::Executor;
use expected_futures::FutureOptions;
use expected_futures::Outcome;
use expected_futures::TokioSpawner;

#[tokio::main]
async fn main() {
    let spawner = Arc::new(TokioSpawner::from_current());
    let executor = Executor::new(spawner);
    let game = ContextId::new("game");

    // Compute on the pool, publish on the named context.
    let published = executor
        .spawn(|| (1..=10).sum::<i32>())
        .map(|sum| format!("sum = {}", sum))
        .map_with(
            {
                let executor = executor.clone();
                move |line| {
                    println!("[{}] {}", executor.current_context().unwrap(), line);
                    line
                }
            },
            FutureOptions::with_named_thread(game),
        );
    assert_eq!(
        published.await,
        Outcome::Completed("sum = 55".to_owned())
    );

    // A registry cancels everything still unset when the caller gives up.
    let registry = CancellationRegistry::new();
    let slow = executor
        .delay(Duration::from_secs(3600))
        .map_with(|_| "never happens", FutureOptions::with_cancellation(registry.clone()));
    registry.cancel();

    match slow.await {
        Outcome::Cancelled => println!("slow pipeline cancelled"),
        other => println!("unexpected outcome: {:?}", other),
    }
}
