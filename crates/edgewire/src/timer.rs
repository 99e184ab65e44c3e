// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Periodic and one-shot timers.
//!
//! A timer is an anchored object with a parameterless `timeout` edge. Each
//! worker thread keeps its own active-timer list, insertion-sorted by the
//! next deadline (ties keep activation order); the message loop drains the
//! expired head before every dequeue and bounds its wait by the next
//! deadline. Activation from a foreign thread is shipped to the owner as a
//! message.

use crate::endpoint::Edge;
use crate::messages::{ActivateTimer, DeactivateTimer};
use crate::monitor::{Anchor, MonitorLink};
use std::cell::{Cell, RefCell};
use std::ptr;
use std::time::{Duration, Instant};

/// Scheduled emitter: fires its `timeout` edge when the period elapses.
pub struct Timer {
    /// Fired on expiry; connect slots here.
    pub timeout: Edge<()>,
    anchor: Anchor,
    period: Duration,
    repeat: bool,
    next_hit: Cell<Instant>,
    active: Cell<bool>,
}

impl Timer {
    /// Create an inactive timer owned by the calling thread.
    ///
    /// `repeat` keeps the timer re-arming itself every `period` after the
    /// first expiry; otherwise it fires once and deactivates.
    pub fn new(period: Duration, repeat: bool) -> Box<Timer> {
        let mut timer = Box::new(Timer {
            timeout: Edge::new(),
            anchor: Anchor::new(),
            period,
            repeat,
            next_hit: Cell::new(Instant::now()),
            active: Cell::new(false),
        });
        let object: *mut Timer = &mut *timer;
        let Timer {
            timeout, anchor, ..
        } = &mut *timer;
        timeout.attach(anchor, object);
        timer
    }

    /// The timer's anchor, for `connect` and thread transfer.
    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn repeating(&self) -> bool {
        self.repeat
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Arm the timer; the first expiry is one period from now.
    ///
    /// Runs locally on the owning thread, or ships itself there.
    pub fn activate(&self) {
        self.activate_routed(self.anchor.link());
    }

    /// Disarm the timer; a pending expiry is cancelled.
    pub fn deactivate(&self) {
        self.deactivate_routed(self.anchor.link());
    }

    pub(crate) fn activate_routed(&self, link: MonitorLink) {
        if link.same_mailbox() {
            self.activate_local();
        } else {
            ActivateTimer::send(link, self as *const Timer);
        }
    }

    pub(crate) fn deactivate_routed(&self, link: MonitorLink) {
        if link.same_mailbox() {
            self.deactivate_local();
        } else {
            DeactivateTimer::send(link, self as *const Timer);
        }
    }

    fn activate_local(&self) {
        self.active.set(true);
        self.next_hit.set(Instant::now() + self.period);
        register(self);
    }

    fn deactivate_local(&self) {
        self.active.set(false);
        unregister(self);
    }

    /// Fire once: emits `timeout` unless deactivated since scheduling.
    fn hit(&self) {
        if !self.active.get() {
            return;
        }
        self.timeout.emit(());
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        // Drop any registration this thread still holds for us. Dropping a
        // timer on a thread it is not affiliated with while registered is
        // outside the contract (as is any cross-thread endpoint mutation).
        unregister(self);
    }
}

// =============================================================================
// Per-thread active-timer list
// =============================================================================

struct TimerEntry {
    /// Deadline snapshot taken at registration: the sort key.
    next_hit: Instant,
    link: MonitorLink,
    timer: *const Timer,
}

thread_local! {
    static ACTIVE_TIMERS: RefCell<Vec<TimerEntry>> = const { RefCell::new(Vec::new()) };
}

/// (Re-)insert `timer` in deadline order; ties go after equal deadlines.
fn register(timer: &Timer) {
    unregister(timer);
    let entry = TimerEntry {
        next_hit: timer.next_hit.get(),
        link: timer.anchor.link(),
        timer: timer as *const Timer,
    };
    ACTIVE_TIMERS.with(|list| {
        let mut list = list.borrow_mut();
        let pos = list
            .iter()
            .position(|e| entry.next_hit < e.next_hit)
            .unwrap_or(list.len());
        list.insert(pos, entry);
    });
}

fn unregister(timer: &Timer) {
    let target: *const Timer = timer;
    ACTIVE_TIMERS.with(|list| {
        list.borrow_mut().retain(|e| !ptr::eq(e.timer, target));
    });
}

/// Earliest pending deadline on this thread, if any.
pub(crate) fn next_deadline() -> Option<Instant> {
    ACTIVE_TIMERS.with(|list| list.borrow().first().map(|e| e.next_hit))
}

/// Fire every expired timer at the head of this thread's list.
///
/// Each expired timer is removed, fired, then re-registered one period
/// later when it repeats and is still active and alive.
pub(crate) fn fire_expired() {
    loop {
        let now = Instant::now();
        let entry = ACTIVE_TIMERS.with(|list| {
            let mut list = list.borrow_mut();
            match list.first() {
                Some(front) if front.next_hit <= now => Some(list.remove(0)),
                _ => None,
            }
        });
        let Some(entry) = entry else {
            return;
        };
        if !entry.link.is_alive() {
            continue;
        }
        // SAFETY: the owner is alive and timers only register on their
        // owning thread, so the allocation is valid and ours to touch.
        unsafe { (*entry.timer).hit() };
        // The handler may have destroyed or disarmed the timer: re-check
        // before touching it again.
        if !entry.link.is_alive() {
            continue;
        }
        // SAFETY: as above, re-established after the handler ran.
        let timer = unsafe { &*entry.timer };
        if timer.repeat && timer.active.get() {
            timer.next_hit.set(entry.next_hit + timer.period);
            register(timer);
        } else {
            timer.active.set(false);
        }
    }
}
