/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Observable cancellation of not-yet-settled promises.
//!
//! A registry tracks promise-side shared states weakly, so a promise that has
//! already been released never keeps memory alive and simply drops out of the
//! listener list. Cancellation is cooperative: a listener that already settled
//! observes no effect.

use std::sync::Arc;
use std::sync::Weak;

use parking_lot::Mutex;

/// Producer-side handle that can be asked to cancel. Implemented by the
/// promise shared state; the registry only ever sees this vtable.
pub trait CancellablePromise: Send + Sync {
    /// Transition to Cancelled if still unset. Must be cheap and must not
    /// call back into the registry.
    fn cancel(&self);
}

struct RegistryState {
    cancelled: bool,
    listeners: Vec<Weak<dyn CancellablePromise>>,
}

/// A cancellation token shared between callers and the promises they spawned.
///
/// `cancel` is idempotent: the first call flips the flag and drains the
/// listener list, later calls see an empty list and do nothing. Listeners
/// added after the flag flipped are cancelled on the spot.
pub struct CancellationRegistry {
    state: Mutex<RegistryState>,
}

impl CancellationRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(CancellationRegistry {
            state: Mutex::new(RegistryState {
                cancelled: false,
                listeners: Vec::new(),
            }),
        })
    }

    pub fn add_listener(&self, listener: Weak<dyn CancellablePromise>) {
        let mut state = self.state.lock();
        if state.cancelled {
            if let Some(listener) = listener.upgrade() {
                listener.cancel();
            }
        } else {
            state.listeners.push(listener);
        }
    }

    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        if !state.listeners.is_empty() {
            tracing::trace!(listeners = state.listeners.len(), "cancelling registry");
        }
        for listener in state.listeners.drain(..) {
            if let Some(listener) = listener.upgrade() {
                listener.cancel();
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use super::*;

    struct CountingListener(AtomicUsize);

    impl CancellablePromise for CountingListener {
        fn cancel(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn weak(listener: &Arc<CountingListener>) -> Weak<dyn CancellablePromise> {
        let trait_listener: Arc<dyn CancellablePromise> = listener.clone();
        let weak: Weak<dyn CancellablePromise> = Arc::downgrade(&trait_listener);
        weak
    }

    #[test]
    fn cancel_reaches_registered_listeners() {
        let registry = CancellationRegistry::new();
        let listener = Arc::new(CountingListener(AtomicUsize::new(0)));

        registry.add_listener(weak(&listener));
        assert!(!registry.is_cancelled());

        registry.cancel();
        assert!(registry.is_cancelled());
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_is_idempotent() {
        let registry = CancellationRegistry::new();
        let listener = Arc::new(CountingListener(AtomicUsize::new(0)));

        registry.add_listener(weak(&listener));
        registry.cancel();
        registry.cancel();
        registry.cancel();

        assert!(registry.is_cancelled());
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_listener_is_cancelled_immediately() {
        let registry = CancellationRegistry::new();
        registry.cancel();

        let listener = Arc::new(CountingListener(AtomicUsize::new(0)));
        registry.add_listener(weak(&listener));
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn released_listener_is_skipped() {
        let registry = CancellationRegistry::new();
        let listener = Arc::new(CountingListener(AtomicUsize::new(0)));
        registry.add_listener(weak(&listener));
        drop(listener);

        // Nothing to upgrade; must not panic or leak.
        registry.cancel();
        assert!(registry.is_cancelled());
    }
}
