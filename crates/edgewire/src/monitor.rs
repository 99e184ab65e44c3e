// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Object liveness and mailbox affinity tracking.
//!
//! Every anchored object owns one heap-resident [`ObjectMonitor`] that
//! records, in a single atomic word, whether the object is still alive and
//! how many references (weak links plus the anchor's guard) exist:
//!
//! ```text
//! state = (refcount << 1) | alive_bit
//! ```
//!
//! The encoding lets "object died" flip the alive bit and take one guard
//! reference in a single `fetch_add(1)`, and lets "drop reference" detect
//! the final owner with a `== 2` check on the previous value.
//!
//! The monitor also carries the object's current mailbox (its thread
//! affinity), guarded by a spin RW lock because the critical section is a
//! single pointer read or write.

use crate::rt::{Mailbox, SpinRwLock};
use crate::worker;
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const ALIVE: usize = 1;
const REF_UNIT: usize = 2;

/// Heap-resident liveness + affinity descriptor for one anchored object.
///
/// Never moved after allocation; freed by the last reference drop. The
/// monitor deliberately knows nothing about the object itself (endpoints
/// pin their own object pointer), so its whole state is one atomic word
/// plus the mailbox slot.
pub struct ObjectMonitor {
    /// Bit 0: alive flag. Bits 1..: reference count times two.
    state: AtomicUsize,
    /// Current mailbox affinity; mutated only by anchor transfer calls.
    mailbox: SpinRwLock<Option<Arc<Mailbox>>>,
}

impl ObjectMonitor {
    /// Allocate a monitor born alive, affiliated with the current thread.
    fn alloc() -> NonNull<ObjectMonitor> {
        let boxed = Box::new(Self {
            state: AtomicUsize::new(ALIVE),
            mailbox: SpinRwLock::new(Some(worker::local_mailbox())),
        });
        // SAFETY: Box::into_raw never returns null.
        unsafe { NonNull::new_unchecked(Box::into_raw(boxed)) }
    }

    fn add_ref(&self) {
        self.state.fetch_add(REF_UNIT, Ordering::SeqCst);
    }

    /// Drop one reference; frees the monitor when it was the last.
    ///
    /// # Safety
    /// `monitor` must come from [`alloc`](Self::alloc) and the caller must
    /// own exactly one reference it has not dropped yet.
    unsafe fn drop_ref(monitor: NonNull<ObjectMonitor>) {
        let prev = monitor
            .as_ref()
            .state
            .fetch_sub(REF_UNIT, Ordering::SeqCst);
        if prev == REF_UNIT {
            drop(Box::from_raw(monitor.as_ptr()));
        }
    }

    fn is_alive(&self) -> bool {
        self.state.load(Ordering::Acquire) & ALIVE != 0
    }

    fn mailbox(&self) -> Option<Arc<Mailbox>> {
        self.mailbox.read().clone()
    }

    fn set_mailbox(&self, mailbox: Option<Arc<Mailbox>>) {
        // Swap under the lock, destroy outside it: dropping the last handle
        // to a mailbox destroys its queued messages, whose rollback logic
        // may take monitor locks of its own.
        let old = {
            let mut guard = self.mailbox.write();
            std::mem::replace(&mut *guard, mailbox)
        };
        drop(old);
    }

    /// Compare the stored mailbox with the calling thread's, under the read
    /// guard.
    fn same_mailbox(&self) -> bool {
        let guard = self.mailbox.read();
        match guard.as_ref() {
            Some(mailbox) => Arc::ptr_eq(mailbox, &worker::local_mailbox()),
            None => false,
        }
    }
}

// =============================================================================
// MonitorLink: refcounted weak reference
// =============================================================================

/// Weak link to a monitor: holds a reference, does not keep the object
/// alive. The empty form is the tombstone used inside connection lists.
///
/// Equality is monitor identity, so two links to the same object compare
/// equal regardless of how they were obtained.
pub struct MonitorLink {
    monitor: Option<NonNull<ObjectMonitor>>,
}

// SAFETY: all monitor state behind the pointer is atomic or lock-guarded,
// and the refcount protocol keeps the allocation live for as long as any
// link exists, on any thread.
unsafe impl Send for MonitorLink {}
unsafe impl Sync for MonitorLink {}

impl MonitorLink {
    fn from_monitor(monitor: NonNull<ObjectMonitor>) -> Self {
        // SAFETY: caller (Anchor) guarantees the monitor is live.
        unsafe { monitor.as_ref() }.add_ref();
        Self {
            monitor: Some(monitor),
        }
    }

    /// The tombstone form: refers to nothing.
    pub fn empty() -> Self {
        Self { monitor: None }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.monitor.is_none()
    }

    /// Whether the referent object is still alive. Empty links are dead.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.with(|m| m.is_alive()).unwrap_or(false)
    }

    /// The referent's current mailbox, if it still has one.
    pub fn mailbox(&self) -> Option<Arc<Mailbox>> {
        self.with(|m| m.mailbox()).flatten()
    }

    /// Whether the referent is affiliated with the calling thread's mailbox.
    #[must_use]
    pub fn same_mailbox(&self) -> bool {
        self.with(|m| m.same_mailbox()).unwrap_or(false)
    }

    fn with<R>(&self, f: impl FnOnce(&ObjectMonitor) -> R) -> Option<R> {
        // SAFETY: a non-empty link holds a reference, so the monitor
        // allocation outlives this borrow.
        self.monitor.map(|m| f(unsafe { m.as_ref() }))
    }
}

impl Clone for MonitorLink {
    fn clone(&self) -> Self {
        if let Some(monitor) = self.monitor {
            // SAFETY: we hold a reference, so the monitor is live.
            unsafe { monitor.as_ref() }.add_ref();
        }
        Self {
            monitor: self.monitor,
        }
    }
}

impl Drop for MonitorLink {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            // SAFETY: this link owned one reference.
            unsafe { ObjectMonitor::drop_ref(monitor) };
        }
    }
}

impl PartialEq for MonitorLink {
    fn eq(&self, other: &Self) -> bool {
        self.monitor == other.monitor
    }
}

impl Eq for MonitorLink {}

impl fmt::Debug for MonitorLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.monitor {
            Some(monitor) => write!(f, "MonitorLink({:p})", monitor.as_ptr()),
            None => write!(f, "MonitorLink(empty)"),
        }
    }
}

// =============================================================================
// Anchor: ownership handle
// =============================================================================

/// Ownership handle keeping its monitor in the ALIVE state.
///
/// Embed one per object; endpoints bind to it via their `attach` call.
/// Anchors are deliberately neither `Clone` nor adjusted on move: a copied
/// object is a distinct logical object and must construct its own anchor.
///
/// Dropping the anchor flips the alive bit, so in-flight signals aimed at
/// the object become silent drops, then releases the mailbox affinity and
/// the anchor's reference.
pub struct Anchor {
    monitor: NonNull<ObjectMonitor>,
}

// SAFETY: as for MonitorLink: the monitor is atomically managed and the
// anchor's reference (the alive bit) pins the allocation.
unsafe impl Send for Anchor {}
unsafe impl Sync for Anchor {}

impl Anchor {
    /// Create an anchor affiliated with the calling thread's mailbox.
    pub fn new() -> Self {
        Self {
            monitor: ObjectMonitor::alloc(),
        }
    }

    /// A fresh weak link to this object's monitor.
    pub fn link(&self) -> MonitorLink {
        MonitorLink::from_monitor(self.monitor)
    }

    /// Re-affiliate the object with `mailbox`.
    ///
    /// Undefined unless the object's endpoint lists are empty and no
    /// traffic referencing it is in flight.
    pub fn move_to_mailbox(&self, mailbox: Arc<Mailbox>) {
        self.monitor().set_mailbox(Some(mailbox));
    }

    /// Re-affiliate the object with the calling thread.
    pub fn move_to_local_thread(&self) {
        self.move_to_mailbox(worker::local_mailbox());
    }

    fn monitor(&self) -> &ObjectMonitor {
        // SAFETY: the anchor keeps the monitor alive until Drop.
        unsafe { self.monitor.as_ref() }
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Anchor {
    fn drop(&mut self) {
        let monitor = self.monitor();
        // Flip the alive bit and take a guard reference in one operation;
        // anything consuming a signal after this sees a dead object.
        monitor.state.fetch_add(1, Ordering::SeqCst);
        // Drop the mailbox so monitor -> mailbox -> queued message ->
        // monitor cycles cannot keep either side alive.
        monitor.set_mailbox(None);
        // SAFETY: releasing the guard reference taken above.
        unsafe { ObjectMonitor::drop_ref(self.monitor) };
    }
}
