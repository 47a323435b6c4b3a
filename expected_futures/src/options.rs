/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Per-spawn and per-continuation options.

use std::any::Any;
use std::sync::Arc;
use std::sync::Weak;

use dupe::Dupe;

use crate::cancellation::CancellationRegistry;
use crate::execution::ContextId;
use crate::execution::ExecutionPolicy;

/// Options accepted by `spawn` and the continuation methods.
///
/// Defaults: `Current` policy, no target, no cancellation registry, no
/// lifetime monitor.
#[derive(Clone, Default)]
pub struct FutureOptions {
    policy: ExecutionPolicy,
    named_target: Option<ContextId>,
    cancellation: Option<Arc<CancellationRegistry>>,
    lifetime_monitor: Option<Weak<dyn Any + Send + Sync>>,
}

impl FutureOptions {
    pub fn builder() -> FutureOptionsBuilder {
        FutureOptionsBuilder::default()
    }

    pub fn with_policy(policy: ExecutionPolicy) -> Self {
        Self::builder().policy(policy).build()
    }

    pub fn with_named_thread(target: ContextId) -> Self {
        Self::builder().named_thread(target).build()
    }

    pub fn with_cancellation(registry: Arc<CancellationRegistry>) -> Self {
        Self::builder().cancellation(registry).build()
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    pub fn named_target(&self) -> Option<&ContextId> {
        self.named_target.as_ref()
    }

    pub fn cancellation(&self) -> Option<&Arc<CancellationRegistry>> {
        self.cancellation.as_ref()
    }

    pub(crate) fn lifetime_monitor(&self) -> Option<&Weak<dyn Any + Send + Sync>> {
        self.lifetime_monitor.as_ref()
    }
}

#[derive(Default)]
pub struct FutureOptionsBuilder {
    policy: ExecutionPolicy,
    named_target: Option<ContextId>,
    cancellation: Option<Arc<CancellationRegistry>>,
    lifetime_monitor: Option<Weak<dyn Any + Send + Sync>>,
}

impl FutureOptionsBuilder {
    pub fn policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Request a specific named context. Implies the `NamedThread` policy.
    pub fn named_thread(mut self, target: ContextId) -> Self {
        self.policy = ExecutionPolicy::NamedThread;
        self.named_target = Some(target);
        self
    }

    pub fn cancellation(mut self, registry: Arc<CancellationRegistry>) -> Self {
        self.cancellation = Some(registry);
        self
    }

    /// Bind the continuation to `owner`'s lifetime: if the owner has been
    /// released by the time the antecedent settles, the continuation is not
    /// invoked and its future settles `Errored(OBJECT_DESTROYED)`.
    pub fn bound_to<O: Any + Send + Sync>(mut self, owner: &Arc<O>) -> Self {
        let trait_owner: Arc<dyn Any + Send + Sync> = owner.clone();
        let weak: Weak<dyn Any + Send + Sync> = Arc::downgrade(&trait_owner);
        self.lifetime_monitor = Some(weak);
        self
    }

    pub fn build(self) -> FutureOptions {
        let mut options = FutureOptions {
            policy: self.policy,
            named_target: self.named_target,
            cancellation: self.cancellation,
            lifetime_monitor: self.lifetime_monitor,
        };
        options.sanitize();
        options
    }
}

impl FutureOptions {
    fn sanitize(&mut self) {
        if self.policy == ExecutionPolicy::NamedThread && self.named_target.is_none() {
            tracing::warn!(
                "NamedThread execution policy requested without a target thread; \
                 falling back to Current"
            );
            self.policy = ExecutionPolicy::Current;
        }
    }
}

impl Dupe for FutureOptions {}
