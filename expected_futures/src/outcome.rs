/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The tagged terminal state of an expected future.

use crate::error::Error;

/// What a future eventually settles into. `Incomplete` is only ever observed
/// through conversions of aggregate bookkeeping; a settled shared state always
/// carries one of the three terminal variants.
///
/// The unit case is spelled `Outcome<()>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    Incomplete,
    Completed(T),
    Errored(Error),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn completed(value: T) -> Self {
        Outcome::Completed(value)
    }

    pub fn errored(error: Error) -> Self {
        Outcome::Errored(error)
    }

    pub fn cancelled() -> Self {
        Outcome::Cancelled
    }

    pub fn incomplete() -> Self {
        Outcome::Incomplete
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(..))
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, Outcome::Errored(..))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, Outcome::Incomplete)
    }

    /// The completed value. Panics on any other state.
    pub fn value(&self) -> &T {
        match self {
            Outcome::Completed(value) => value,
            _ => panic!("value() called on a non-completed outcome"),
        }
    }

    /// The carried error. Panics on any other state.
    pub fn error(&self) -> &Error {
        match self {
            Outcome::Errored(error) => error,
            _ => panic!("error() called on a non-errored outcome"),
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Completed(value) => value,
            _ => panic!("into_value() called on a non-completed outcome"),
        }
    }

    /// Re-type a non-completed outcome, preserving its state and error.
    /// Completed outcomes carry a value of the old type, so callers must
    /// supply one explicitly via [`Outcome::convert`] instead.
    pub fn convert_incomplete<U>(&self) -> Outcome<U> {
        match self {
            Outcome::Incomplete => Outcome::Incomplete,
            Outcome::Errored(error) => Outcome::Errored(error.clone()),
            Outcome::Cancelled => Outcome::Cancelled,
            Outcome::Completed(..) => {
                panic!("convert_incomplete() called on a completed outcome")
            }
        }
    }

    /// Re-type any outcome; a completed one takes the supplied replacement
    /// value.
    pub fn convert<U>(&self, value: U) -> Outcome<U> {
        match self {
            Outcome::Completed(..) => Outcome::Completed(value),
            other => other.convert_incomplete(),
        }
    }
}
