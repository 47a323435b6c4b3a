/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The structured error value carried by errored outcomes.

use std::sync::Arc;

use dupe::Dupe;

/// Error codes reserved by the library. Everything else is opaque user space.
pub mod codes {
    /// A combinator or operation was handed arguments it cannot work with,
    /// e.g. `any` over an empty list.
    pub const INVALID_ARGUMENT: i32 = 1;
    /// A lifetime-monitored continuation found its owner already released.
    pub const OBJECT_DESTROYED: i32 = 2;
}

/// The error half of an [`Outcome`](crate::Outcome): an integer `code`, an
/// integer `context` qualifying it, and an optional shared message. Both
/// integers are opaque to the library apart from the reserved [`codes`].
///
/// Immutable once built; cloning shares the message allocation.
#[derive(Clone, Dupe, Debug, PartialEq, Eq, thiserror::Error)]
#[error("expected future error {code} (context {context})")]
pub struct Error {
    code: i32,
    context: i32,
    info: Option<Arc<str>>,
}

impl Error {
    pub fn new(code: i32) -> Self {
        Error {
            code,
            context: 0,
            info: None,
        }
    }

    pub fn with_context(mut self, context: i32) -> Self {
        self.context = context;
        self
    }

    pub fn with_info(mut self, info: impl Into<Arc<str>>) -> Self {
        self.info = Some(info.into());
        self
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn context(&self) -> i32 {
        self.context
    }

    pub fn info(&self) -> Option<&str> {
        self.info.as_deref()
    }
}
