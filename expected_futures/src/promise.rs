/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The exclusive producer handle.

use std::sync::Arc;

use dupe::Dupe;

use crate::error::Error;
use crate::future::ExpectedFuture;
use crate::outcome::Outcome;
use crate::state::SharedState;
use crate::FutureValue;

/// Producer side of a shared state. Deliberately not `Clone`: there is one
/// producer role at a time, and the single-assignment guard handles the rest.
///
/// Dropping a promise that never settled transitions its state to Cancelled,
/// so no future is left waiting on a producer that no longer exists.
pub struct Promise<T: FutureValue> {
    state: Arc<SharedState<T>>,
}

impl<T: FutureValue> Promise<T> {
    pub(crate) fn new(state: Arc<SharedState<T>>) -> Self {
        Promise { state }
    }

    pub(crate) fn state(&self) -> &Arc<SharedState<T>> {
        &self.state
    }

    /// A consumer handle on the same state. May be called any number of
    /// times; all handles observe the same outcome.
    pub fn future(&self) -> ExpectedFuture<T> {
        ExpectedFuture::new(self.state.dupe())
    }

    /// Whether a set has already begun. Producers use this to skip doing
    /// work for promises that were cancelled in the meantime.
    pub fn is_set(&self) -> bool {
        self.state.is_set()
    }

    pub fn set_value(&self, value: T) {
        self.state.set(Outcome::Completed(value));
    }

    pub fn set_error(&self, error: Error) {
        self.state.set(Outcome::Errored(error));
    }

    pub fn cancel(&self) {
        self.state.set(Outcome::Cancelled);
    }

    pub fn set_outcome(&self, outcome: Outcome<T>) {
        self.state.set(outcome);
    }
}

impl<T: FutureValue> Drop for Promise<T> {
    fn drop(&mut self) {
        self.state.cancel_if_unset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Executor;
    use crate::TokioSpawner;

    fn executor() -> Executor {
        Executor::new(Arc::new(TokioSpawner::from_current()))
    }

    #[tokio::test]
    async fn exactly_one_set_takes_effect() {
        let executor = executor();
        let promise = executor.promise::<i32>();
        let future = promise.future();

        promise.set_error(Error::new(4));
        promise.set_value(1);
        promise.cancel();

        assert_eq!(future.await, Outcome::Errored(Error::new(4)));
        assert!(promise.is_set());
    }

    #[tokio::test]
    async fn dropping_an_unset_promise_breaks_to_cancelled() {
        let executor = executor();
        let promise = executor.promise::<i32>();
        let future = promise.future();

        drop(promise);
        assert_eq!(future.await, Outcome::Cancelled);
    }

    #[tokio::test]
    async fn dropping_a_settled_promise_changes_nothing() {
        let executor = executor();
        let promise = executor.promise::<i32>();
        let future = promise.future();

        promise.set_value(9);
        drop(promise);
        assert_eq!(future.await, Outcome::Completed(9));
    }

    #[tokio::test]
    async fn every_future_handle_sees_the_outcome() {
        let executor = executor();
        let promise = executor.promise::<String>();
        let a = promise.future();
        let b = promise.future();

        promise.set_value("shared".to_owned());

        assert_eq!(a.await, Outcome::Completed("shared".to_owned()));
        assert_eq!(b.await, Outcome::Completed("shared".to_owned()));
    }
}
