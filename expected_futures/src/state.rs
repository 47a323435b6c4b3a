/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The single-assignment slot shared by a promise and its futures.
//!
//! The slot moves through `UNSET -> SETTING -> SET` exactly once, guarded by
//! a CAS; only the thread that wins the CAS writes the outcome, then
//! publishes `SET` with a release store and fires the dependents. Losing
//! setters are dropped silently: cancellation and normal completion race by
//! design and the loser must not fault.

use std::cell::UnsafeCell;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[cfg(test)]
use dupe::Dupe;
use futures::task::AtomicWaker;
use parking_lot::Mutex;
use slab::Slab;

use crate::cancellation::CancellablePromise;
use crate::execution::ExecutionPlacement;
use crate::outcome::Outcome;
use crate::spawner::ScheduledTask;
use crate::spawner::Spawner;
use crate::spawner::SubmitTarget;
use crate::FutureValue;

const UNSET: u8 = 0;
const SETTING: u8 = 1;
const SET: u8 = 2;

/// Something waiting on the slot to settle. Kept in a slab so droppable
/// waiters (pollers) can deregister without scanning.
pub(crate) enum Dependent<T> {
    /// A user continuation, dispatched through the spawner when the slot
    /// settles.
    Continuation {
        target: SubmitTarget,
        task: ScheduledTask,
    },
    /// Internal bookkeeping (combinator aggregation, unwrap forwarding). Runs
    /// inline on the settling thread; never user code.
    Observer(Box<dyn FnOnce(&Outcome<T>) + Send + 'static>),
    /// A parked poller of the consumer future.
    Waker(Arc<AtomicWaker>),
}

pub(crate) struct SharedState<T> {
    phase: AtomicU8,
    /// Written only by the CAS winner before `SET` is published.
    outcome: UnsafeCell<Outcome<T>>,
    /// `None` means the completion event already fired. `.take()` on settle
    /// is the one-shot event itself.
    dependents: Mutex<Option<Slab<Dependent<T>>>>,
    execution: ExecutionPlacement,
    spawner: Arc<dyn Spawner>,
}

// The UnsafeCell is published with release/acquire around `phase`; each
// unsafe block states the invariant it relies on.
unsafe impl<T: Send + Sync> Send for SharedState<T> {}
unsafe impl<T: Send + Sync> Sync for SharedState<T> {}

impl<T: FutureValue> SharedState<T> {
    pub(crate) fn new(execution: ExecutionPlacement, spawner: Arc<dyn Spawner>) -> Arc<Self> {
        Arc::new(SharedState {
            phase: AtomicU8::new(UNSET),
            outcome: UnsafeCell::new(Outcome::Incomplete),
            dependents: Mutex::new(Some(Slab::new())),
            execution,
            spawner,
        })
    }

    /// A slot that is born settled; its completion event is considered to
    /// have already fired.
    pub(crate) fn new_ready(
        outcome: Outcome<T>,
        execution: ExecutionPlacement,
        spawner: Arc<dyn Spawner>,
    ) -> Arc<Self> {
        Arc::new(SharedState {
            phase: AtomicU8::new(SET),
            outcome: UnsafeCell::new(outcome),
            dependents: Mutex::new(None),
            execution,
            spawner,
        })
    }

    pub(crate) fn execution(&self) -> &ExecutionPlacement {
        &self.execution
    }

    pub(crate) fn spawner(&self) -> &Arc<dyn Spawner> {
        &self.spawner
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.phase.load(Ordering::Acquire) == SET
    }

    /// Whether a set has started (or finished); used by producers to skip
    /// work for promises that were already cancelled.
    pub(crate) fn is_set(&self) -> bool {
        self.phase.load(Ordering::Acquire) != UNSET
    }

    /// Clone out the outcome if the slot has settled.
    pub(crate) fn try_read(&self) -> Option<Outcome<T>> {
        if self.is_ready() {
            let outcome = unsafe {
                // SAFETY: `SET` was loaded with acquire; the outcome was
                // written before the matching release store and is immutable
                // from then on.
                &*self.outcome.get()
            };
            Some(outcome.clone())
        } else {
            None
        }
    }

    /// The single-assignment funnel. The first caller wins; everyone else is
    /// dropped silently.
    pub(crate) fn set(&self, outcome: Outcome<T>) {
        if self
            .phase
            .compare_exchange(UNSET, SETTING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        unsafe {
            // SAFETY: the CAS above admits exactly one writer, and no reader
            // dereferences the cell until `SET` is published below.
            *self.outcome.get() = outcome;
        }
        self.phase.store(SET, Ordering::Release);

        let fired = self
            .dependents
            .lock()
            .take()
            .expect("completion event fired twice");
        let outcome = unsafe {
            // SAFETY: `SET` is published and the outcome is immutable.
            &*self.outcome.get()
        };
        for (_key, dependent) in fired {
            match dependent {
                Dependent::Continuation { target, task } => self.spawner.submit(target, task),
                Dependent::Observer(observer) => observer(outcome),
                Dependent::Waker(waker) => waker.wake(),
            }
        }
    }

    /// Register a continuation task, or dispatch it immediately if the slot
    /// already settled. Dispatch always goes through the spawner; the task
    /// never runs synchronously under the caller.
    pub(crate) fn attach_continuation(&self, target: SubmitTarget, task: ScheduledTask) {
        let task = {
            let mut dependents = self.dependents.lock();
            match dependents.as_mut() {
                Some(dependents) if !self.is_ready() => {
                    dependents.insert(Dependent::Continuation { target, task });
                    return;
                }
                _ => task,
            }
        };
        self.spawner.submit(target, task);
    }

    /// Register an inline observer, or run it now if the slot already
    /// settled.
    pub(crate) fn attach_observer(&self, observer: Box<dyn FnOnce(&Outcome<T>) + Send + 'static>) {
        let observer = {
            let mut dependents = self.dependents.lock();
            match dependents.as_mut() {
                Some(dependents) if !self.is_ready() => {
                    dependents.insert(Dependent::Observer(observer));
                    return;
                }
                _ => observer,
            }
        };
        let outcome = unsafe {
            // SAFETY: the event fired (or the slot was born ready), so `SET`
            // is published and the outcome immutable.
            &*self.outcome.get()
        };
        observer(outcome);
    }

    /// Park a poller's waker. Returns its slab key, or `None` if the slot is
    /// already settled (in which case the caller reads instead of parking).
    pub(crate) fn attach_waker(&self, waker: Arc<AtomicWaker>) -> Option<usize> {
        let mut dependents = self.dependents.lock();
        match dependents.as_mut() {
            Some(dependents) if !self.is_ready() => {
                Some(dependents.insert(Dependent::Waker(waker)))
            }
            _ => None,
        }
    }

    /// Deregister a dependent by key. A no-op after the event fired (the
    /// slab is gone along with its entries).
    pub(crate) fn drop_dependent(&self, key: usize) {
        let mut dependents = self.dependents.lock();
        if let Some(dependents) = dependents.as_mut() {
            if dependents.contains(key) {
                dependents.remove(key);
            }
        }
    }

    /// Broken-promise finalisation: the last producer is gone and nothing was
    /// set, so every outstanding future must observe Cancelled.
    pub(crate) fn cancel_if_unset(&self) {
        if !self.is_set() {
            self.set(Outcome::Cancelled);
        }
    }
}

impl<T: FutureValue> CancellablePromise for SharedState<T> {
    fn cancel(&self) {
        self.set(Outcome::Cancelled);
    }
}
