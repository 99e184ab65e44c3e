// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Emit-side endpoint.
//!
//! An edge owns the list of slots it feeds, one `(slot-owner link, slot,
//! delivery mode)` record per connection. Emitting walks a snapshot of the
//! list; connection callbacks are free to disconnect anything mid-walk
//! because mutation during an emit tombstones records in place (null slot,
//! empty link) instead of erasing them, so indices stay valid, and the walk
//! compacts the list when the outermost emit finishes.
//!
//! An edge is also a slot (its first field), with a forwarding callee that
//! re-emits whatever it receives: connecting an edge into another edge's
//! peer list chains them transparently.

use super::slot::Slot;
use super::{DeliveryMode, SignalArgs};
use crate::messages::{BlockSignal, EdgeFullDisconnect, EdgeHalfConnect, EdgeHalfDisconnect, Signal};
use crate::monitor::{Anchor, MonitorLink};
use crate::rt::Event;
use std::cell::{Cell, RefCell};
use std::ops::Deref;
use std::ptr;
use std::sync::Arc;

struct EdgeConnection<P: SignalArgs> {
    link: MonitorLink,
    slot: *const Slot<P>,
    mode: DeliveryMode,
}

impl<P: SignalArgs> EdgeConnection<P> {
    fn is_tombstone(&self) -> bool {
        self.slot.is_null() || self.link.is_empty()
    }
}

/// Emit-side endpoint; fans out to connected slots.
///
/// `#[repr(C)]` with the base slot first: the forwarding callee recovers
/// the edge from its slot address, which is only sound with this layout.
#[repr(C)]
pub struct Edge<P: SignalArgs> {
    base: Slot<P>,
    peers: RefCell<Vec<EdgeConnection<P>>>,
    /// An emit walk is active; mutators must tombstone, not erase.
    emitting: Cell<bool>,
    /// Tombstones exist; the outermost emit compacts on exit.
    cleanup_pending: Cell<bool>,
}

fn forward_callee<P: SignalArgs>(slot: &Slot<P>, _object: *mut (), args: P) {
    // SAFETY: this callee is installed exclusively by Edge::new on the base
    // slot of an Edge, and Edge is #[repr(C)] with that slot first, so the
    // slot address IS the edge address.
    let edge = unsafe { &*(slot as *const Slot<P>).cast::<Edge<P>>() };
    edge.emit(args);
}

impl<P: SignalArgs> Edge<P> {
    pub fn new() -> Self {
        Self {
            base: Slot::new(forward_callee::<P>),
            peers: RefCell::new(Vec::new()),
            emitting: Cell::new(false),
            cleanup_pending: Cell::new(false),
        }
    }

    /// Pin the owning object: its anchor (our identity) and address.
    pub fn attach<T>(&mut self, anchor: &Anchor, object: *mut T) {
        self.base.attach(anchor, object);
    }

    /// This edge's receive side, for wiring it into another edge.
    pub fn as_slot(&self) -> &Slot<P> {
        &self.base
    }

    /// Deliver `args` to every peer connected when the emit started.
    ///
    /// Peers connected during the walk are excluded; peers disconnected
    /// during the walk (by any callback) are skipped from that point on.
    /// Edge owner's thread only.
    pub fn emit(&self, args: P) {
        let outer = self.emitting.replace(true);
        let count = self.peers.borrow().len();
        // One allocation shared by every queued delivery of this emit.
        let mut shared: Option<Arc<P>> = None;

        for index in 0..count {
            let Some((link, slot, mode)) = self.peer_at(index) else {
                continue;
            };
            if !link.is_alive() {
                continue;
            }

            let same_mailbox = match mode {
                DeliveryMode::Auto | DeliveryMode::BlockQueue => link.same_mailbox(),
                DeliveryMode::Direct | DeliveryMode::Queue => false,
            };
            match mode {
                DeliveryMode::Direct => {
                    // SAFETY: peer owner alive; the caller asserted direct
                    // invocation is safe on this thread.
                    unsafe { (*slot).receive(args.clone()) };
                }
                DeliveryMode::Auto | DeliveryMode::BlockQueue if same_mailbox => {
                    // SAFETY: peer owner alive and affiliated with this
                    // thread; synchronous invocation is the local fast path
                    // (and the BlockQueue self-deadlock escape).
                    unsafe { (*slot).receive(args.clone()) };
                }
                DeliveryMode::Auto | DeliveryMode::Queue => {
                    let payload = shared
                        .get_or_insert_with(|| Arc::new(args.clone()))
                        .clone();
                    Signal::send(link, slot, payload);
                }
                DeliveryMode::BlockQueue => {
                    let payload = shared
                        .get_or_insert_with(|| Arc::new(args.clone()))
                        .clone();
                    let event = Arc::new(Event::new());
                    let signal = Box::new(Signal::new(link.clone(), slot, payload));
                    BlockSignal::send(&link, signal, Arc::clone(&event));
                    // Strict connection order: later peers observe the
                    // effects of this delivery.
                    event.wait();
                }
            }
        }

        if !outer {
            if self.cleanup_pending.replace(false) {
                self.peers.borrow_mut().retain(|p| !p.is_tombstone());
            }
            self.emitting.set(false);
        }
    }

    /// Remove the first live connection to `slot` (any identity) and ask
    /// the slot to drop its half. Edge owner's thread only.
    pub fn disconnect(&self, slot: &Slot<P>) {
        let slot_ptr = slot as *const Slot<P>;
        if let Some(link) = self.remove_peer(slot_ptr, None) {
            self.request_peer_half_disconnect(link, slot_ptr);
        }
    }

    /// Remove every connection to `slot`. Edge owner's thread only.
    pub fn disconnect_all_to(&self, slot: &Slot<P>) {
        let slot_ptr = slot as *const Slot<P>;
        while let Some(link) = self.remove_peer(slot_ptr, None) {
            self.request_peer_half_disconnect(link, slot_ptr);
        }
    }

    /// Drop every outgoing connection. Edge owner's thread only.
    pub fn disconnect_all_slots(&self) {
        if self.emitting.get() {
            let count = self.peers.borrow().len();
            let mut tombstoned = false;
            for index in 0..count {
                let taken = {
                    let mut peers = self.peers.borrow_mut();
                    let peer = &mut peers[index];
                    if peer.is_tombstone() {
                        None
                    } else {
                        tombstoned = true;
                        let link = std::mem::replace(&mut peer.link, MonitorLink::empty());
                        let slot = std::mem::replace(&mut peer.slot, ptr::null());
                        Some((link, slot))
                    }
                };
                if let Some((link, slot)) = taken {
                    self.request_peer_half_disconnect(link, slot);
                }
            }
            if tombstoned {
                self.cleanup_pending.set(true);
            }
        } else {
            let peers = self.peers.take();
            for peer in peers {
                if peer.is_tombstone() {
                    continue;
                }
                self.request_peer_half_disconnect(peer.link, peer.slot);
            }
        }
    }

    /// Drop every incoming connection (this edge's slot side).
    pub fn disconnect_all_edges(&self) {
        self.base.disconnect_all();
    }

    /// Drop both sides.
    pub fn disconnect_all(&self) {
        self.disconnect_all_edges();
        self.disconnect_all_slots();
    }

    /// Full edge-side disconnect with supplied peer identity, callable from
    /// any thread (queued to the edge owner when called elsewhere).
    pub(crate) fn disconnect_pair(
        &self,
        edge_link: MonitorLink,
        slot_link: MonitorLink,
        slot: *const Slot<P>,
    ) {
        if edge_link.same_mailbox() {
            if let Some(link) = self.remove_peer(slot, Some(&slot_link)) {
                self.request_peer_half_disconnect(link, slot);
            }
        } else {
            EdgeFullDisconnect::send(edge_link, self as *const Edge<P>, slot_link, slot);
        }
    }

    /// Run the edge-side half-connect on the owner's thread, wherever that
    /// is; rolls the slot's half back if the edge owner died first.
    pub(crate) fn half_connect_request(
        edge_link: MonitorLink,
        edge: *const Edge<P>,
        slot_link: MonitorLink,
        slot: *const Slot<P>,
        mode: DeliveryMode,
    ) {
        if edge_link.same_mailbox() {
            if edge_link.is_alive() {
                // SAFETY: owner alive and affiliated with this thread, so
                // the embedded edge is valid and exclusively ours to touch.
                unsafe { (*edge).half_connect_local(slot_link, slot, mode) };
            } else if slot_link.is_alive() {
                Slot::half_disconnect_request(slot_link, slot, edge_link, edge);
            }
        } else {
            EdgeHalfConnect::send(edge_link, edge, slot_link, slot, mode);
        }
    }

    /// Run the edge-side half-disconnect on the owner's thread.
    pub(crate) fn half_disconnect_request(
        edge_link: MonitorLink,
        edge: *const Edge<P>,
        slot_link: MonitorLink,
        slot: *const Slot<P>,
    ) {
        if edge_link.same_mailbox() {
            if edge_link.is_alive() {
                // SAFETY: as in half_connect_request.
                unsafe { (*edge).half_disconnect_local(slot, &slot_link) };
            }
        } else {
            EdgeHalfDisconnect::send(edge_link, edge, slot_link, slot);
        }
    }

    pub(crate) fn half_connect_local(
        &self,
        slot_link: MonitorLink,
        slot: *const Slot<P>,
        mode: DeliveryMode,
    ) {
        self.peers.borrow_mut().push(EdgeConnection {
            link: slot_link,
            slot,
            mode,
        });
    }

    /// Erase (or tombstone, mid-emit) the unique record matching both the
    /// slot pointer and the link identity.
    pub(crate) fn half_disconnect_local(&self, slot: *const Slot<P>, slot_link: &MonitorLink) {
        let _ = self.remove_peer(slot, Some(slot_link));
    }

    /// Copy peer `index` out of the list, `None` for tombstones (and for
    /// indices past the end, after a nested emit compacted).
    fn peer_at(&self, index: usize) -> Option<(MonitorLink, *const Slot<P>, DeliveryMode)> {
        let peers = self.peers.borrow();
        let peer = peers.get(index)?;
        if peer.is_tombstone() {
            return None;
        }
        Some((peer.link.clone(), peer.slot, peer.mode))
    }

    /// Detach the first live record matching `slot` (and `identity`, when
    /// given), honoring the tombstone discipline. Returns the record's link.
    fn remove_peer(
        &self,
        slot: *const Slot<P>,
        identity: Option<&MonitorLink>,
    ) -> Option<MonitorLink> {
        let mut peers = self.peers.borrow_mut();
        let pos = peers.iter().position(|p| {
            !p.is_tombstone()
                && ptr::eq(p.slot, slot)
                && identity.map_or(true, |id| p.link == *id)
        })?;
        if self.emitting.get() {
            let link = std::mem::replace(&mut peers[pos].link, MonitorLink::empty());
            peers[pos].slot = ptr::null();
            self.cleanup_pending.set(true);
            Some(link)
        } else {
            Some(peers.remove(pos).link)
        }
    }

    fn request_peer_half_disconnect(&self, slot_link: MonitorLink, slot: *const Slot<P>) {
        Slot::half_disconnect_request(
            slot_link,
            slot,
            self.base.owner_link(),
            self as *const Edge<P>,
        );
    }
}

impl<P: SignalArgs> Default for Edge<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: SignalArgs> Deref for Edge<P> {
    type Target = Slot<P>;

    fn deref(&self) -> &Slot<P> {
        &self.base
    }
}

impl<P: SignalArgs> Drop for Edge<P> {
    fn drop(&mut self) {
        self.disconnect_all_slots();
        // The base slot's own Drop detaches the incoming side.
    }
}
