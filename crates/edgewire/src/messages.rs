// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cross-thread protocol messages.
//!
//! Every mutating protocol step that targets an endpoint on another thread
//! travels as a message through the destination's mailbox and executes the
//! step locally on arrival. Messages carry a weak link to the destination's
//! owner; a dead owner turns `consume` into a silent drop.
//!
//! The connect handshake is two half-steps, one per endpoint. Because the
//! second half may never execute (the destination thread can quit with a
//! full mailbox), the half-connect messages compensate from `Drop`: an
//! unconsumed half-connect emits the half-disconnect that undoes the half
//! already made on the other peer.
//!
//! Raw endpoint pointers inside messages are dereferenced only on the
//! destination owner's thread and only after a liveness check: the
//! combination that makes the pointers valid (an endpoint is embedded in
//! its owner, and a live owner's memory is pinned).

use crate::endpoint::{DeliveryMode, Edge, SignalArgs, Slot};
use crate::monitor::MonitorLink;
use crate::rt::Event;
use crate::timer::Timer;
use std::sync::Arc;

/// What the message loop should do after consuming a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
}

/// A unit of work executed by the consuming worker thread.
pub trait Message: Send {
    fn consume(self: Box<Self>) -> LoopControl;
}

pub type MessagePtr = Box<dyn Message>;

/// Enqueue on the destination owner's current mailbox.
///
/// A destination without a mailbox (dead, or mid-teardown) drops the
/// message; rollback `Drop` impls still run.
fn deliver_to(dest: &MonitorLink, msg: MessagePtr, kind: &'static str) {
    match dest.mailbox() {
        Some(mailbox) => mailbox.enqueue(msg),
        None => log::debug!("[proto] {} dropped: destination mailbox gone", kind),
    }
}

// =============================================================================
// Quit
// =============================================================================

/// Ends the consuming thread's message loop.
pub struct QuitMessage;

impl Message for QuitMessage {
    fn consume(self: Box<Self>) -> LoopControl {
        LoopControl::Quit
    }
}

// =============================================================================
// Signal
// =============================================================================

/// A queued slot invocation.
///
/// The args live in an `Arc` so one emit can fan the same payload out to
/// several queued peers without re-cloning it per enqueue.
pub(crate) struct Signal<P: SignalArgs> {
    link: MonitorLink,
    slot: *const Slot<P>,
    args: Arc<P>,
}

// SAFETY: `slot` is dereferenced only on the owner's thread after the
// liveness check in consume(); the link pins the monitor, the alive flag
// pins the owner (and thus the embedded slot).
unsafe impl<P: SignalArgs> Send for Signal<P> {}

impl<P: SignalArgs> Signal<P> {
    pub(crate) fn new(link: MonitorLink, slot: *const Slot<P>, args: Arc<P>) -> Self {
        Self { link, slot, args }
    }

    pub(crate) fn send(link: MonitorLink, slot: *const Slot<P>, args: Arc<P>) {
        let msg = Box::new(Self::new(link.clone(), slot, args));
        deliver_to(&link, msg, "signal");
    }
}

impl<P: SignalArgs> Message for Signal<P> {
    fn consume(self: Box<Self>) -> LoopControl {
        if self.link.is_alive() {
            // SAFETY: owner alive, consuming on its thread (see type docs).
            unsafe { (*self.slot).receive((*self.args).clone()) };
        } else {
            log::debug!("[proto] signal for dead object dropped");
        }
        LoopControl::Continue
    }
}

// =============================================================================
// Blocking signal wrapper
// =============================================================================

/// Wraps a message with a one-shot event the sender parks on.
///
/// The event is notified from `Drop`, not just after a successful run, so
/// an emitter never deadlocks when the destination thread dies with this
/// message still queued.
pub(crate) struct BlockSignal {
    payload: Option<MessagePtr>,
    event: Arc<Event>,
}

impl BlockSignal {
    pub(crate) fn send(dest: &MonitorLink, payload: MessagePtr, event: Arc<Event>) {
        let msg = Box::new(Self {
            payload: Some(payload),
            event,
        });
        deliver_to(dest, msg, "blocking signal");
    }
}

impl Message for BlockSignal {
    fn consume(mut self: Box<Self>) -> LoopControl {
        if let Some(payload) = self.payload.take() {
            let _ = payload.consume();
        }
        LoopControl::Continue
    }
}

impl Drop for BlockSignal {
    fn drop(&mut self) {
        self.event.notify();
    }
}

// =============================================================================
// Half-connect (with rollback) and half-disconnect
// =============================================================================

/// Second half of a connect, bound for the edge owner's thread.
pub(crate) struct EdgeHalfConnect<P: SignalArgs> {
    dest_link: MonitorLink,
    edge: *const Edge<P>,
    apart_link: MonitorLink,
    slot: *const Slot<P>,
    mode: DeliveryMode,
    delivered: bool,
}

// SAFETY: as for Signal: pointers cross threads inert and are dereferenced
// only on the matching owner's thread after a liveness check.
unsafe impl<P: SignalArgs> Send for EdgeHalfConnect<P> {}

impl<P: SignalArgs> EdgeHalfConnect<P> {
    pub(crate) fn send(
        dest_link: MonitorLink,
        edge: *const Edge<P>,
        apart_link: MonitorLink,
        slot: *const Slot<P>,
        mode: DeliveryMode,
    ) {
        let msg = Box::new(Self {
            dest_link: dest_link.clone(),
            edge,
            apart_link,
            slot,
            mode,
            delivered: false,
        });
        deliver_to(&dest_link, msg, "half-connect(edge)");
    }

    fn roll_back(&self) {
        // Undo the slot-side half that was made before this message.
        Slot::half_disconnect_request(
            self.apart_link.clone(),
            self.slot,
            self.dest_link.clone(),
            self.edge,
        );
    }
}

impl<P: SignalArgs> Message for EdgeHalfConnect<P> {
    fn consume(mut self: Box<Self>) -> LoopControl {
        self.delivered = true;
        if self.dest_link.is_alive() {
            // Re-routes itself if the edge moved mailboxes since the send;
            // rolls back if the edge died on its own thread.
            Edge::half_connect_request(
                self.dest_link.clone(),
                self.edge,
                self.apart_link.clone(),
                self.slot,
                self.mode,
            );
        } else if self.apart_link.is_alive() {
            self.roll_back();
        }
        LoopControl::Continue
    }
}

impl<P: SignalArgs> Drop for EdgeHalfConnect<P> {
    fn drop(&mut self) {
        if !self.delivered {
            log::debug!("[proto] undelivered half-connect(edge): compensating");
            self.roll_back();
        }
    }
}

/// Second half of a connect, bound for the slot owner's thread.
pub(crate) struct SlotHalfConnect<P: SignalArgs> {
    dest_link: MonitorLink,
    slot: *const Slot<P>,
    apart_link: MonitorLink,
    edge: *const Edge<P>,
    delivered: bool,
}

// SAFETY: see EdgeHalfConnect.
unsafe impl<P: SignalArgs> Send for SlotHalfConnect<P> {}

impl<P: SignalArgs> SlotHalfConnect<P> {
    pub(crate) fn send(
        dest_link: MonitorLink,
        slot: *const Slot<P>,
        apart_link: MonitorLink,
        edge: *const Edge<P>,
    ) {
        let msg = Box::new(Self {
            dest_link: dest_link.clone(),
            slot,
            apart_link,
            edge,
            delivered: false,
        });
        deliver_to(&dest_link, msg, "half-connect(slot)");
    }

    fn roll_back(&self) {
        Edge::half_disconnect_request(
            self.apart_link.clone(),
            self.edge,
            self.dest_link.clone(),
            self.slot,
        );
    }
}

impl<P: SignalArgs> Message for SlotHalfConnect<P> {
    fn consume(mut self: Box<Self>) -> LoopControl {
        self.delivered = true;
        if self.dest_link.is_alive() {
            Slot::half_connect_request(
                self.dest_link.clone(),
                self.slot,
                self.apart_link.clone(),
                self.edge,
            );
        } else if self.apart_link.is_alive() {
            self.roll_back();
        }
        LoopControl::Continue
    }
}

impl<P: SignalArgs> Drop for SlotHalfConnect<P> {
    fn drop(&mut self) {
        if !self.delivered {
            log::debug!("[proto] undelivered half-connect(slot): compensating");
            self.roll_back();
        }
    }
}

/// Removes one record from the edge owner's peer list.
pub(crate) struct EdgeHalfDisconnect<P: SignalArgs> {
    dest_link: MonitorLink,
    edge: *const Edge<P>,
    apart_link: MonitorLink,
    slot: *const Slot<P>,
}

// SAFETY: see EdgeHalfConnect.
unsafe impl<P: SignalArgs> Send for EdgeHalfDisconnect<P> {}

impl<P: SignalArgs> EdgeHalfDisconnect<P> {
    pub(crate) fn send(
        dest_link: MonitorLink,
        edge: *const Edge<P>,
        apart_link: MonitorLink,
        slot: *const Slot<P>,
    ) {
        let msg = Box::new(Self {
            dest_link: dest_link.clone(),
            edge,
            apart_link,
            slot,
        });
        deliver_to(&dest_link, msg, "half-disconnect(edge)");
    }
}

impl<P: SignalArgs> Message for EdgeHalfDisconnect<P> {
    fn consume(self: Box<Self>) -> LoopControl {
        if self.dest_link.is_alive() {
            Edge::half_disconnect_request(
                self.dest_link.clone(),
                self.edge,
                self.apart_link.clone(),
                self.slot,
            );
        }
        LoopControl::Continue
    }
}

/// Removes one record from the slot owner's connection list.
pub(crate) struct SlotHalfDisconnect<P: SignalArgs> {
    dest_link: MonitorLink,
    slot: *const Slot<P>,
    apart_link: MonitorLink,
    edge: *const Edge<P>,
}

// SAFETY: see EdgeHalfConnect.
unsafe impl<P: SignalArgs> Send for SlotHalfDisconnect<P> {}

impl<P: SignalArgs> SlotHalfDisconnect<P> {
    pub(crate) fn send(
        dest_link: MonitorLink,
        slot: *const Slot<P>,
        apart_link: MonitorLink,
        edge: *const Edge<P>,
    ) {
        let msg = Box::new(Self {
            dest_link: dest_link.clone(),
            slot,
            apart_link,
            edge,
        });
        deliver_to(&dest_link, msg, "half-disconnect(slot)");
    }
}

impl<P: SignalArgs> Message for SlotHalfDisconnect<P> {
    fn consume(self: Box<Self>) -> LoopControl {
        if self.dest_link.is_alive() {
            Slot::half_disconnect_request(
                self.dest_link.clone(),
                self.slot,
                self.apart_link.clone(),
                self.edge,
            );
        }
        LoopControl::Continue
    }
}

// =============================================================================
// Full connect / disconnect (whole operation shipped to the owning thread)
// =============================================================================

/// A `connect` that originated off the slot owner's thread.
pub(crate) struct FullConnect<P: SignalArgs> {
    dest_link: MonitorLink,
    slot: *const Slot<P>,
    apart_link: MonitorLink,
    edge: *const Edge<P>,
    mode: DeliveryMode,
}

// SAFETY: see EdgeHalfConnect.
unsafe impl<P: SignalArgs> Send for FullConnect<P> {}

impl<P: SignalArgs> FullConnect<P> {
    pub(crate) fn send(
        dest_link: MonitorLink,
        slot: *const Slot<P>,
        apart_link: MonitorLink,
        edge: *const Edge<P>,
        mode: DeliveryMode,
    ) {
        let msg = Box::new(Self {
            dest_link: dest_link.clone(),
            slot,
            apart_link,
            edge,
            mode,
        });
        deliver_to(&dest_link, msg, "connect");
    }
}

impl<P: SignalArgs> Message for FullConnect<P> {
    fn consume(self: Box<Self>) -> LoopControl {
        if self.dest_link.is_alive() && self.apart_link.is_alive() {
            // SAFETY: slot owner alive, consuming on its thread.
            unsafe {
                (*self.slot).connect_routed(
                    self.dest_link.clone(),
                    self.apart_link.clone(),
                    self.edge,
                    self.mode,
                );
            }
        } else {
            log::debug!("[proto] connect dropped: an endpoint died in flight");
        }
        LoopControl::Continue
    }
}

/// A slot-side `disconnect` that originated off the slot owner's thread.
pub(crate) struct SlotFullDisconnect<P: SignalArgs> {
    dest_link: MonitorLink,
    slot: *const Slot<P>,
    apart_link: MonitorLink,
    edge: *const Edge<P>,
}

// SAFETY: see EdgeHalfConnect.
unsafe impl<P: SignalArgs> Send for SlotFullDisconnect<P> {}

impl<P: SignalArgs> SlotFullDisconnect<P> {
    pub(crate) fn send(
        dest_link: MonitorLink,
        slot: *const Slot<P>,
        apart_link: MonitorLink,
        edge: *const Edge<P>,
    ) {
        let msg = Box::new(Self {
            dest_link: dest_link.clone(),
            slot,
            apart_link,
            edge,
        });
        deliver_to(&dest_link, msg, "disconnect(slot)");
    }
}

impl<P: SignalArgs> Message for SlotFullDisconnect<P> {
    fn consume(self: Box<Self>) -> LoopControl {
        if self.dest_link.is_alive() {
            // SAFETY: slot owner alive, consuming on its thread.
            unsafe {
                (*self.slot).disconnect_from(
                    self.dest_link.clone(),
                    self.apart_link.clone(),
                    self.edge,
                );
            }
        }
        LoopControl::Continue
    }
}

/// An edge-side `disconnect` that originated off the edge owner's thread.
pub(crate) struct EdgeFullDisconnect<P: SignalArgs> {
    dest_link: MonitorLink,
    edge: *const Edge<P>,
    apart_link: MonitorLink,
    slot: *const Slot<P>,
}

// SAFETY: see EdgeHalfConnect.
unsafe impl<P: SignalArgs> Send for EdgeFullDisconnect<P> {}

impl<P: SignalArgs> EdgeFullDisconnect<P> {
    pub(crate) fn send(
        dest_link: MonitorLink,
        edge: *const Edge<P>,
        apart_link: MonitorLink,
        slot: *const Slot<P>,
    ) {
        let msg = Box::new(Self {
            dest_link: dest_link.clone(),
            edge,
            apart_link,
            slot,
        });
        deliver_to(&dest_link, msg, "disconnect(edge)");
    }
}

impl<P: SignalArgs> Message for EdgeFullDisconnect<P> {
    fn consume(self: Box<Self>) -> LoopControl {
        if self.dest_link.is_alive() {
            // SAFETY: edge owner alive, consuming on its thread.
            unsafe {
                (*self.edge).disconnect_pair(
                    self.dest_link.clone(),
                    self.apart_link.clone(),
                    self.slot,
                );
            }
        }
        LoopControl::Continue
    }
}

// =============================================================================
// Timer control
// =============================================================================

/// Runs `activate` on the timer owner's thread.
pub(crate) struct ActivateTimer {
    link: MonitorLink,
    timer: *const Timer,
}

// SAFETY: `timer` is dereferenced only on the owner's thread after the
// liveness check; the link pins the monitor.
unsafe impl Send for ActivateTimer {}

impl ActivateTimer {
    pub(crate) fn send(link: MonitorLink, timer: *const Timer) {
        let msg = Box::new(Self {
            link: link.clone(),
            timer,
        });
        deliver_to(&link, msg, "activate-timer");
    }
}

impl Message for ActivateTimer {
    fn consume(self: Box<Self>) -> LoopControl {
        if self.link.is_alive() {
            // SAFETY: owner alive, consuming on its thread; activate_routed
            // re-checks affinity in case the timer moved again.
            unsafe { (*self.timer).activate_routed(self.link.clone()) };
        }
        LoopControl::Continue
    }
}

/// Runs `deactivate` on the timer owner's thread.
pub(crate) struct DeactivateTimer {
    link: MonitorLink,
    timer: *const Timer,
}

// SAFETY: see ActivateTimer.
unsafe impl Send for DeactivateTimer {}

impl DeactivateTimer {
    pub(crate) fn send(link: MonitorLink, timer: *const Timer) {
        let msg = Box::new(Self {
            link: link.clone(),
            timer,
        });
        deliver_to(&link, msg, "deactivate-timer");
    }
}

impl Message for DeactivateTimer {
    fn consume(self: Box<Self>) -> LoopControl {
        if self.link.is_alive() {
            // SAFETY: see ActivateTimer::consume.
            unsafe { (*self.timer).deactivate_routed(self.link.clone()) };
        }
        LoopControl::Continue
    }
}
