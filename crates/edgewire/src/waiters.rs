// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Blocking helpers that spin the message loop until an endpoint condition
//! holds.

use crate::endpoint::{connect, Edge, SignalArgs, Slot};
use crate::monitor::Anchor;
use crate::worker::{message_loop_while, post_self_quit};
use std::cell::Cell;

/// One-shot receiver used by [`wait_for_signal`].
struct Catcher<P: SignalArgs> {
    slot: Slot<P>,
    anchor: Anchor,
    caught: Cell<bool>,
}

impl<P: SignalArgs> Catcher<P> {
    fn new() -> Box<Self> {
        let mut catcher = Box::new(Self {
            slot: Slot::new(crate::slot_callee!(Catcher<P>, on_signal)),
            anchor: Anchor::new(),
            caught: Cell::new(false),
        });
        let object: *mut Self = &mut *catcher;
        let Self { slot, anchor, .. } = &mut *catcher;
        slot.attach(anchor, object);
        catcher
    }

    fn on_signal(&mut self, _args: P) {
        self.caught.set(true);
        post_self_quit();
    }
}

/// Run the calling thread's message loop until `edge` fires once.
///
/// A throwaway catcher slot is connected to `edge`, then `starter` runs
/// (activate a timer, kick off work, ...). The loop spins while the catcher
/// is still connected, so it also ends (returning `false`) when the edge
/// is destroyed before ever firing.
///
/// # Returns
/// * `true` when the edge fired.
/// * `false` when `starter` returned `false` or the edge went away first.
pub fn wait_for_signal<P, F>(owner: &Anchor, edge: &Edge<P>, starter: F) -> bool
where
    P: SignalArgs,
    F: FnOnce() -> bool,
{
    let catcher = Catcher::<P>::new();
    connect(owner, edge, &catcher.anchor, &catcher.slot);
    if !starter() {
        return false;
    }
    message_loop_while(|| catcher.slot.is_connected());
    catcher.caught.get()
}

/// Run the calling thread's message loop until `slot` has no connections
/// left (its peers disconnected or died).
pub fn wait_for_disconnected<P: SignalArgs>(slot: &Slot<P>) {
    message_loop_while(|| slot.is_connected());
}
