/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Combinators over groups of futures.
//!
//! Aggregation bookkeeping runs as inline observers on the input states (it
//! is library code, not user code, so it does not round-trip through the
//! dispatcher), and resolution of the downstream slot leans on the
//! single-assignment guard: whichever observer gets there first wins and the
//! rest are dropped silently.

use std::sync::Arc;

use dupe::Dupe;
use parking_lot::Mutex;

use crate::error::codes;
use crate::error::Error;
use crate::executor::Executor;
use crate::future::ExpectedFuture;
use crate::outcome::Outcome;
use crate::state::SharedState;
use crate::FutureValue;

/// How `all` treats a non-completed input.
#[derive(Copy, Clone, Dupe, Debug, Default, PartialEq, Eq)]
pub enum FailMode {
    /// Wait for every input to settle, then resolve with the first
    /// non-completed outcome observed (arrival order breaks ties).
    #[default]
    Full,
    /// Resolve as soon as the first non-completed outcome is observed;
    /// later outcomes are discarded.
    Fast,
}

struct AllAggregate<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
    first_failure: Option<Outcome<Vec<T>>>,
}

struct AllUnitAggregate {
    remaining: usize,
    first_failure: Option<Outcome<()>>,
}

impl Executor {
    /// Await every input; completes with the values in input order, or with
    /// the first non-completed outcome per [`FailMode::Full`].
    pub fn all<T: FutureValue>(&self, futures: Vec<ExpectedFuture<T>>) -> ExpectedFuture<Vec<T>> {
        self.all_with(futures, FailMode::Full)
    }

    pub fn all_with<T: FutureValue>(
        &self,
        futures: Vec<ExpectedFuture<T>>,
        fail_mode: FailMode,
    ) -> ExpectedFuture<Vec<T>> {
        if futures.is_empty() {
            return self.ready(Vec::new());
        }

        let downstream =
            SharedState::<Vec<T>>::new(self.root_placement(), self.spawner().dupe());
        let aggregate = Arc::new(Mutex::new(AllAggregate {
            slots: (0..futures.len()).map(|_| None).collect(),
            remaining: futures.len(),
            first_failure: None,
        }));

        for (index, future) in futures.iter().enumerate() {
            let aggregate = aggregate.dupe();
            let downstream = downstream.dupe();
            future.state().attach_observer(Box::new(move |outcome| {
                let mut resolve = None;
                {
                    let mut aggregate = aggregate.lock();
                    aggregate.remaining -= 1;
                    match outcome {
                        Outcome::Completed(value) => {
                            aggregate.slots[index] = Some(value.clone());
                        }
                        other => {
                            if aggregate.first_failure.is_none() {
                                aggregate.first_failure = Some(other.convert_incomplete());
                            }
                            if fail_mode == FailMode::Fast {
                                resolve = aggregate.first_failure.clone();
                            }
                        }
                    }
                    if aggregate.remaining == 0 {
                        resolve = Some(match aggregate.first_failure.take() {
                            Some(failure) => failure,
                            None => Outcome::Completed(
                                aggregate
                                    .slots
                                    .iter_mut()
                                    .map(|slot| {
                                        slot.take().expect("completed input left no value")
                                    })
                                    .collect(),
                            ),
                        });
                    }
                }
                // Set outside the aggregate lock; duplicate resolutions are
                // dropped by the single-assignment guard.
                if let Some(outcome) = resolve {
                    downstream.set(outcome);
                }
            }));
        }

        ExpectedFuture::new(downstream)
    }

    /// `all` over unit futures, without collecting a vector of units.
    pub fn all_unit(&self, futures: Vec<ExpectedFuture<()>>) -> ExpectedFuture<()> {
        self.all_unit_with(futures, FailMode::Full)
    }

    pub fn all_unit_with(
        &self,
        futures: Vec<ExpectedFuture<()>>,
        fail_mode: FailMode,
    ) -> ExpectedFuture<()> {
        if futures.is_empty() {
            return self.ready_unit();
        }

        let downstream = SharedState::<()>::new(self.root_placement(), self.spawner().dupe());
        let aggregate = Arc::new(Mutex::new(AllUnitAggregate {
            remaining: futures.len(),
            first_failure: None,
        }));

        for future in &futures {
            let aggregate = aggregate.dupe();
            let downstream = downstream.dupe();
            future.state().attach_observer(Box::new(move |outcome| {
                let mut resolve = None;
                {
                    let mut aggregate = aggregate.lock();
                    aggregate.remaining -= 1;
                    if !outcome.is_completed() {
                        if aggregate.first_failure.is_none() {
                            aggregate.first_failure = Some(outcome.convert_incomplete());
                        }
                        if fail_mode == FailMode::Fast {
                            resolve = aggregate.first_failure.clone();
                        }
                    }
                    if aggregate.remaining == 0 {
                        resolve = Some(
                            aggregate
                                .first_failure
                                .take()
                                .unwrap_or(Outcome::Completed(())),
                        );
                    }
                }
                if let Some(outcome) = resolve {
                    downstream.set(outcome);
                }
            }));
        }

        ExpectedFuture::new(downstream)
    }

    /// Resolves with the first input to settle, whatever it settled to.
    pub fn any<T: FutureValue>(&self, futures: Vec<ExpectedFuture<T>>) -> ExpectedFuture<T> {
        if futures.is_empty() {
            return self.err(
                Error::new(codes::INVALID_ARGUMENT)
                    .with_info("any() needs at least one input future"),
            );
        }

        let downstream = SharedState::<T>::new(self.root_placement(), self.spawner().dupe());
        for future in &futures {
            let downstream = downstream.dupe();
            future.state().attach_observer(Box::new(move |outcome| {
                downstream.set(outcome.clone());
            }));
        }

        ExpectedFuture::new(downstream)
    }
}
