/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//!
//! Typed expected futures: lightweight handles to values produced by work
//! scheduled on a user-selectable execution context.
//!
//! Every future settles into exactly one of three terminal outcomes —
//! completed with a value, errored with a structured [`Error`], or cancelled
//! — and supports chained continuations that transform outcomes into new
//! futures. The library is a thin typed layer over a host scheduler
//! ([`Spawner`]); it owns no threads and exposes no globals.
//!
//! Example:
//! ```
//! use std::sync::Arc;
//!
//! use expected_futures::Executor;
//! use expected_futures::Outcome;
//! use expected_futures::TokioSpawner;
//!
//! #[tokio::main]
//! async fn main() {
//!     let executor = Executor::new(Arc::new(TokioSpawner::from_current()));
//!
//!     let future = executor
//!         .spawn(|| 10)
//!         .map(|v| v + 7)
//!         .map(|v| v.to_string());
//!
//!     assert_eq!(future.await, Outcome::Completed("17".to_owned()));
//! }
//! ```
//!
//! Continuations come in two parameter shapes: value-parameter methods
//! ([`ExpectedFuture::map`], [`ExpectedFuture::and_then`]) are skipped when
//! the antecedent did not complete, propagating the errored or cancelled
//! outcome unchanged; outcome-parameter methods
//! ([`ExpectedFuture::map_outcome`], [`ExpectedFuture::then`]) always run and
//! may recover by returning a completed outcome. A continuation returning
//! another future is unwrapped one level, so chains never nest.

mod cancellation;
mod combine;
mod continuation;
mod error;
mod execution;
mod executor;
mod future;
mod options;
mod outcome;
mod promise;
mod spawner;
mod state;
pub mod testing;

pub use crate::cancellation::CancellablePromise;
pub use crate::cancellation::CancellationRegistry;
pub use crate::combine::FailMode;
pub use crate::continuation::ContinuationReturn;
pub use crate::error::codes;
pub use crate::error::Error;
pub use crate::execution::ContextId;
pub use crate::execution::ExecutionPlacement;
pub use crate::execution::ExecutionPolicy;
pub use crate::executor::Executor;
pub use crate::future::ExpectedFuture;
pub use crate::future::FutureStateForDebugging;
pub use crate::options::FutureOptions;
pub use crate::options::FutureOptionsBuilder;
pub use crate::outcome::Outcome;
pub use crate::promise::Promise;
pub use crate::spawner::ScheduledTask;
pub use crate::spawner::Spawner;
pub use crate::spawner::SubmitTarget;
pub use crate::spawner::TokioSpawner;

/// Values a future can carry. Futures are multi-observer, so values must be
/// cloneable and shareable across threads.
pub trait FutureValue: Send + Sync + Clone + 'static {}

impl<T: Send + Sync + Clone + 'static> FutureValue for T {}
