/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The host scheduler interface consumed by the dispatcher, and a
//! tokio-backed implementation of it.
//!
//! The library itself is thread-agnostic: everything it schedules goes
//! through [`Spawner`], and the only provided implementation is a thin layer
//! over a tokio runtime plus dedicated threads for named contexts.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dupe::Dupe;
use parking_lot::Mutex;
use tracing::Span;

use crate::cancellation::CancellationRegistry;
use crate::execution::ContextId;

/// Where a [`ScheduledTask`] should be submitted.
#[derive(Clone, Dupe, Debug, PartialEq, Eq)]
pub enum SubmitTarget {
    /// A named run context the host keeps alive (e.g. a game thread).
    Context(ContextId),
    /// Any worker from the shared pool.
    Pool,
}

/// A unit of work handed to the host scheduler.
///
/// Tasks are abandonable: a scheduler that drops a task without running it
/// (pool rejection, context teardown) thereby cancels the paired registry,
/// which transitions the task's still-unset promise to Cancelled. Running the
/// task consumes it, so a completed run never triggers that path.
pub struct ScheduledTask {
    work: Option<Box<dyn FnOnce() + Send + 'static>>,
    on_abandon: Option<Arc<CancellationRegistry>>,
    span: Span,
}

impl ScheduledTask {
    pub fn new(work: Box<dyn FnOnce() + Send + 'static>) -> Self {
        Self::with_cancellation(work, None)
    }

    pub fn with_cancellation(
        work: Box<dyn FnOnce() + Send + 'static>,
        on_abandon: Option<Arc<CancellationRegistry>>,
    ) -> Self {
        ScheduledTask {
            work: Some(work),
            on_abandon,
            span: Span::current(),
        }
    }

    /// Run the task on the calling thread.
    pub fn run(mut self) {
        if let Some(work) = self.work.take() {
            let _guard = self.span.enter();
            work();
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if self.work.is_some() {
            if let Some(registry) = &self.on_abandon {
                tracing::debug!("scheduled task abandoned before running; cancelling");
                registry.cancel();
            }
        }
    }
}

/// The host scheduler the core is parameterised over.
///
/// `submit` must return without running the task; ordering between
/// independent submissions is unspecified. `submit_after` is the host timer:
/// the task runs once, no earlier than the requested delay.
pub trait Spawner: Send + Sync + 'static {
    fn submit(&self, target: SubmitTarget, task: ScheduledTask);

    fn submit_after(&self, delay: Duration, task: ScheduledTask);

    /// The named context the calling thread belongs to, if any.
    fn current_context(&self) -> Option<ContextId>;
}

thread_local! {
    static CURRENT_CONTEXT: RefCell<Option<ContextId>> = const { RefCell::new(None) };
}

/// A [`Spawner`] over a tokio runtime.
///
/// Pool submissions run as blocking tasks so user closures may compute as
/// long as they like. Named contexts are dedicated threads fed through an
/// unbounded channel; a context is created the first time it is targeted.
/// When the spawner is dropped the channels disconnect, the context threads
/// exit, and any tasks still queued are abandoned (which cancels them).
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
    contexts: Mutex<HashMap<ContextId, crossbeam_channel::Sender<ScheduledTask>>>,
}

impl TokioSpawner {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        TokioSpawner {
            handle,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Bind to the runtime of the calling context. Panics outside a runtime,
    /// same as `Handle::current`.
    pub fn from_current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }

    /// Ensure a named context exists, spawning its thread if needed.
    pub fn register_context(&self, id: ContextId) {
        self.context_sender(&id);
    }

    fn context_sender(&self, id: &ContextId) -> crossbeam_channel::Sender<ScheduledTask> {
        let mut contexts = self.contexts.lock();
        if let Some(sender) = contexts.get(id) {
            return sender.clone();
        }

        let (sender, receiver) = crossbeam_channel::unbounded::<ScheduledTask>();
        let thread_id = id.dupe();
        std::thread::Builder::new()
            .name(format!("expected-futures-{}", thread_id))
            .spawn(move || {
                CURRENT_CONTEXT.with(|current| *current.borrow_mut() = Some(thread_id));
                while let Ok(task) = receiver.recv() {
                    task.run();
                }
            })
            .expect("failed to spawn named context thread");

        contexts.insert(id.dupe(), sender.clone());
        sender
    }
}

impl Spawner for TokioSpawner {
    fn submit(&self, target: SubmitTarget, task: ScheduledTask) {
        match target {
            SubmitTarget::Pool => {
                self.handle.spawn_blocking(move || task.run());
            }
            SubmitTarget::Context(id) => {
                // A failed send means the context thread is gone; the task is
                // dropped here and its abandonment path fires.
                let _ignored = self.context_sender(&id).send(task);
            }
        }
    }

    fn submit_after(&self, delay: Duration, task: ScheduledTask) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task.run();
        });
    }

    fn current_context(&self) -> Option<ContextId> {
        CURRENT_CONTEXT.with(|current| current.borrow().clone())
    }
}
