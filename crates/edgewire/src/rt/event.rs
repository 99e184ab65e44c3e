// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One-shot wake event with an atomic fast-path.
//!
//! Used by blocking delivery: the emitter parks on the event while the
//! consuming thread runs the wrapped signal, then gets woken. Once set, the
//! event stays set; extra notifications are harmless.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot event: `notify` once (or more), `wait` returns forever after.
#[derive(Default)]
pub struct Event {
    set: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the event and wake every waiter. Idempotent.
    pub fn notify(&self) {
        self.set.store(true, Ordering::Release);
        // Taking the lock orders the store before any waiter's re-check,
        // closing the missed-wakeup window.
        let _guard = self.lock.lock();
        self.cond.notify_all();
    }

    /// Block until the event is set. Returns immediately if it already is.
    pub fn wait(&self) {
        // Fast-path: no lock when already set.
        if self.set.load(Ordering::Acquire) {
            return;
        }
        let mut guard = self.lock.lock();
        while !self.set.load(Ordering::Acquire) {
            self.cond.wait(&mut guard);
        }
    }

    /// Non-blocking check.
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }
}
