/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! A hand-cranked [`Spawner`] for deterministic tests.
//!
//! Nothing runs until the test says so: submissions queue up per target, the
//! timer is a virtual clock, and abandonment is a method call away. This
//! makes ordering-sensitive properties (tasks are posted, never run
//! synchronously under the caller; `Inline` lands on the antecedent's
//! context) observable without threads or sleeps.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::execution::ContextId;
use crate::spawner::ScheduledTask;
use crate::spawner::Spawner;
use crate::spawner::SubmitTarget;

struct ManualState {
    ready: VecDeque<(SubmitTarget, ScheduledTask)>,
    timers: Vec<(Duration, ScheduledTask)>,
    now: Duration,
    running_context: Option<ContextId>,
}

/// A spawner that only runs tasks when explicitly cranked.
pub struct ManualSpawner {
    state: Mutex<ManualState>,
}

impl ManualSpawner {
    pub fn new() -> Arc<Self> {
        Arc::new(ManualSpawner {
            state: Mutex::new(ManualState {
                ready: VecDeque::new(),
                timers: Vec::new(),
                now: Duration::ZERO,
                running_context: None,
            }),
        })
    }

    /// Number of tasks queued and runnable right now.
    pub fn pending(&self) -> usize {
        self.state.lock().ready.len()
    }

    /// Run queued tasks in submission order until the queue drains, including
    /// tasks they submit while running. Returns how many ran.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_one(None) {
            ran += 1;
        }
        ran
    }

    /// Run only tasks bound for `target`, in submission order. Returns how
    /// many ran.
    pub fn run_target(&self, target: &SubmitTarget) -> usize {
        let mut ran = 0;
        while self.run_one(Some(target)) {
            ran += 1;
        }
        ran
    }

    /// Advance the virtual clock, promoting due timers onto the ready queue.
    /// Returns how many timers fired.
    pub fn advance(&self, by: Duration) -> usize {
        let mut state = self.state.lock();
        state.now += by;
        let now = state.now;

        let mut fired = 0;
        let mut remaining = Vec::new();
        for (deadline, task) in std::mem::take(&mut state.timers) {
            if deadline <= now {
                state.ready.push_back((SubmitTarget::Pool, task));
                fired += 1;
            } else {
                remaining.push((deadline, task));
            }
        }
        state.timers = remaining;
        fired
    }

    /// Abandon everything queued without running it, which cancels the
    /// associated promises. Returns how many tasks were dropped.
    pub fn drop_pending(&self) -> usize {
        let dropped = {
            let mut state = self.state.lock();
            let mut dropped: Vec<ScheduledTask> =
                state.ready.drain(..).map(|(_target, task)| task).collect();
            dropped.extend(state.timers.drain(..).map(|(_deadline, task)| task));
            dropped
        };
        // Dropped outside the lock: abandonment cancels registries, which may
        // fire observers that submit follow-up work.
        let count = dropped.len();
        drop(dropped);
        count
    }

    /// Pop and run one matching task. The lock is released while the task
    /// runs so it can submit follow-ups.
    fn run_one(&self, filter: Option<&SubmitTarget>) -> bool {
        let task = {
            let mut state = self.state.lock();
            let position = match filter {
                None => {
                    if state.ready.is_empty() {
                        None
                    } else {
                        Some(0)
                    }
                }
                Some(wanted) => state.ready.iter().position(|(target, _)| target == wanted),
            };
            let Some(position) = position else {
                return false;
            };
            let (target, task) = state.ready.remove(position).expect("position in bounds");
            state.running_context = match target {
                SubmitTarget::Context(id) => Some(id),
                SubmitTarget::Pool => None,
            };
            task
        };

        task.run();

        self.state.lock().running_context = None;
        true
    }
}

impl Spawner for ManualSpawner {
    fn submit(&self, target: SubmitTarget, task: ScheduledTask) {
        self.state.lock().ready.push_back((target, task));
    }

    fn submit_after(&self, delay: Duration, task: ScheduledTask) {
        let mut state = self.state.lock();
        let deadline = state.now + delay;
        state.timers.push((deadline, task));
    }

    fn current_context(&self) -> Option<ContextId> {
        self.state.lock().running_context.clone()
    }
}

#[cfg(test)]
mod tests {
    use dupe::Dupe;

    use super::*;

    #[test]
    fn tasks_wait_for_the_crank() {
        let spawner = ManualSpawner::new();
        spawner.submit(SubmitTarget::Pool, ScheduledTask::new(Box::new(|| {})));

        assert_eq!(spawner.pending(), 1);
        assert_eq!(spawner.run_all(), 1);
        assert_eq!(spawner.pending(), 0);
    }

    #[test]
    fn timers_fire_only_once_due() {
        let spawner = ManualSpawner::new();
        spawner.submit_after(Duration::from_secs(5), ScheduledTask::new(Box::new(|| {})));

        assert_eq!(spawner.advance(Duration::from_secs(4)), 0);
        assert_eq!(spawner.advance(Duration::from_secs(1)), 1);
        assert_eq!(spawner.run_all(), 1);
    }

    #[test]
    fn run_target_leaves_other_queues_alone() {
        let spawner = ManualSpawner::new();
        let game = SubmitTarget::Context(ContextId::new("game"));
        spawner.submit(SubmitTarget::Pool, ScheduledTask::new(Box::new(|| {})));
        spawner.submit(game.dupe(), ScheduledTask::new(Box::new(|| {})));

        assert_eq!(spawner.run_target(&game), 1);
        assert_eq!(spawner.pending(), 1);
    }
}
