// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared anchored-object fixtures for the integration tests.
//!
//! Every fixture follows the crate's object pattern: box the object, bind
//! the anchor to its final address, attach the endpoints.

#![allow(dead_code)] // each test binary uses its own subset

use edgewire::{slot_callee, Anchor, Edge, Slot};
use std::sync::{Arc, Mutex};

pub type Pair = (i32, i32);

/// Route crate logs to the test harness (`RUST_LOG=debug cargo test`).
pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Slot object accumulating `a + b` per delivery.
pub struct Counter {
    pub slot: Slot<Pair>,
    pub anchor: Anchor,
    pub total: i32,
}

impl Counter {
    pub fn new() -> Box<Self> {
        let mut counter = Box::new(Self {
            slot: Slot::new(slot_callee!(Counter, on_add)),
            anchor: Anchor::new(),
            total: 0,
        });
        let object: *mut Self = &mut *counter;
        let Self { slot, anchor, .. } = &mut *counter;
        slot.attach(anchor, object);
        counter
    }

    fn on_add(&mut self, (a, b): Pair) {
        self.total += a + b;
    }
}

/// Like [`Counter`], but asserts every delivery runs on the thread the
/// object is affiliated with.
pub struct AffinityCounter {
    pub slot: Slot<Pair>,
    pub anchor: Anchor,
    pub total: i32,
}

impl AffinityCounter {
    pub fn new() -> Box<Self> {
        let mut counter = Box::new(Self {
            slot: Slot::new(slot_callee!(AffinityCounter, on_add)),
            anchor: Anchor::new(),
            total: 0,
        });
        let object: *mut Self = &mut *counter;
        let Self { slot, anchor, .. } = &mut *counter;
        slot.attach(anchor, object);
        counter
    }

    fn on_add(&mut self, (a, b): Pair) {
        assert!(
            self.anchor.link().same_mailbox(),
            "delivery off the affiliated thread"
        );
        self.total += a + b;
    }
}

/// Edge object. Also serves as a proxy: its edge is connectable as a slot.
pub struct Source {
    pub edge: Edge<Pair>,
    pub anchor: Anchor,
}

impl Source {
    pub fn new() -> Box<Self> {
        let mut source = Box::new(Self {
            edge: Edge::new(),
            anchor: Anchor::new(),
        });
        let object: *mut Self = &mut *source;
        let Self { edge, anchor, .. } = &mut *source;
        edge.attach(anchor, object);
        source
    }
}

/// Counter that runs a caller-installed callback after accumulating.
///
/// The callback returns whether it stays installed; connection callbacks
/// that should run once return `false`.
pub struct CallbackCounter {
    pub slot: Slot<Pair>,
    pub anchor: Anchor,
    pub total: i32,
    pub callback: Option<Box<dyn FnMut(&mut CallbackCounter) -> bool>>,
}

impl CallbackCounter {
    pub fn new() -> Box<Self> {
        let mut counter = Box::new(Self {
            slot: Slot::new(slot_callee!(CallbackCounter, on_add)),
            anchor: Anchor::new(),
            total: 0,
            callback: None,
        });
        let object: *mut Self = &mut *counter;
        let Self { slot, anchor, .. } = &mut *counter;
        slot.attach(anchor, object);
        counter
    }

    fn on_add(&mut self, (a, b): Pair) {
        self.total += a + b;
        if let Some(mut callback) = self.callback.take() {
            if callback(self) {
                self.callback = Some(callback);
            }
        }
    }
}

/// Records its tag into a shared log per delivery, for ordering checks.
pub struct OrderProbe {
    pub slot: Slot<Pair>,
    pub anchor: Anchor,
    pub tag: u32,
    pub log: Arc<Mutex<Vec<u32>>>,
}

impl OrderProbe {
    pub fn new(tag: u32, log: Arc<Mutex<Vec<u32>>>) -> Box<Self> {
        let mut probe = Box::new(Self {
            slot: Slot::new(slot_callee!(OrderProbe, on_add)),
            anchor: Anchor::new(),
            tag,
            log,
        });
        let object: *mut Self = &mut *probe;
        let Self { slot, anchor, .. } = &mut *probe;
        slot.attach(anchor, object);
        probe
    }

    fn on_add(&mut self, _args: Pair) {
        self.log.lock().expect("order log poisoned").push(self.tag);
    }
}

/// Parameterless receiver that counts hits and quits its thread's loop
/// once `limit` is reached.
pub struct CountThenQuit {
    pub slot: Slot<()>,
    pub anchor: Anchor,
    pub hits: u32,
    pub limit: u32,
}

impl CountThenQuit {
    pub fn new(limit: u32) -> Box<Self> {
        let mut probe = Box::new(Self {
            slot: Slot::new(slot_callee!(CountThenQuit, on_fire)),
            anchor: Anchor::new(),
            hits: 0,
            limit,
        });
        let object: *mut Self = &mut *probe;
        let Self { slot, anchor, .. } = &mut *probe;
        slot.attach(anchor, object);
        probe
    }

    fn on_fire(&mut self, _args: ()) {
        self.hits += 1;
        if self.hits >= self.limit {
            edgewire::post_self_quit();
        }
    }
}
