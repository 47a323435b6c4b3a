/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Execution policies and their resolution into a concrete placement.
//!
//! A policy describes where the caller *wants* work to run; a placement is
//! what the dispatcher resolved it to at creation time. Placements are stored
//! on every shared state so that `Inline` continuations can reuse whatever
//! the antecedent resolved to, long after the scheduling thread is gone.

use std::sync::Arc;

use derive_more::Display;
use dupe::Dupe;
use dupe::OptionDupedExt;

use crate::spawner::Spawner;
use crate::spawner::SubmitTarget;

/// Name of a host run context (e.g. a game thread). Interned, cheap to clone.
#[derive(Clone, Dupe, Debug, Display, PartialEq, Eq, Hash)]
#[display(fmt = "{}", _0)]
pub struct ContextId(Arc<str>);

impl ContextId {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        ContextId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContextId {
    fn from(name: &str) -> Self {
        ContextId::new(name)
    }
}

/// Where the function body associated with a future should run.
#[derive(Copy, Clone, Dupe, Debug, Default, PartialEq, Eq)]
pub enum ExecutionPolicy {
    /// Whatever context the work is being scheduled from. Falls back to the
    /// shared pool when the scheduling thread is not a named context.
    #[default]
    Current,
    /// The context the antecedent future resolved to. With no antecedent this
    /// is equivalent to `Current`.
    Inline,
    /// A specific named context, supplied alongside the policy.
    NamedThread,
    /// A worker from the shared pool.
    Pool,
}

/// A resolved `(policy, context)` pair.
#[derive(Clone, Dupe, Debug, PartialEq, Eq)]
pub struct ExecutionPlacement {
    policy: ExecutionPolicy,
    context: Option<ContextId>,
}

impl ExecutionPlacement {
    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    pub fn context(&self) -> Option<&ContextId> {
        self.context.as_ref()
    }

    /// Resolution for a root task: there is no antecedent, so `Inline`
    /// collapses to `Current`, and `Current` pins the caller's context if the
    /// scheduler knows it.
    pub(crate) fn for_root(
        policy: ExecutionPolicy,
        target: Option<&ContextId>,
        spawner: &dyn Spawner,
    ) -> Self {
        match policy {
            ExecutionPolicy::Pool => ExecutionPlacement {
                policy: ExecutionPolicy::Pool,
                context: None,
            },
            ExecutionPolicy::NamedThread => ExecutionPlacement {
                policy: ExecutionPolicy::NamedThread,
                context: target.duped(),
            },
            ExecutionPolicy::Inline | ExecutionPolicy::Current => ExecutionPlacement {
                policy: ExecutionPolicy::Current,
                context: spawner.current_context(),
            },
        }
    }

    /// Resolution for a continuation: `Inline` reuses whatever the antecedent
    /// resolved to.
    pub(crate) fn for_continuation(
        policy: ExecutionPolicy,
        target: Option<&ContextId>,
        antecedent: &ExecutionPlacement,
        spawner: &dyn Spawner,
    ) -> Self {
        if policy == ExecutionPolicy::Inline {
            antecedent.dupe()
        } else {
            Self::for_root(policy, target, spawner)
        }
    }

    /// The concrete submission target for this placement.
    pub(crate) fn submit_target(&self) -> SubmitTarget {
        match (self.policy, &self.context) {
            (ExecutionPolicy::Pool, _) | (_, None) => SubmitTarget::Pool,
            (_, Some(context)) => SubmitTarget::Context(context.dupe()),
        }
    }
}
