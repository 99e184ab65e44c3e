// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receive-side endpoint.
//!
//! A slot records which edges feed it: one `(edge-owner link, edge)` tuple
//! per connection, duplicates allowed. Records are matched for removal by
//! BOTH the edge pointer and the link identity, so duplicate connections
//! between the same pair of objects stay individually addressable.
//!
//! The list is mutated only on the slot owner's thread; every entry point
//! that may be called elsewhere routes itself through the owner's mailbox.

use super::edge::Edge;
use super::{DeliveryMode, SignalArgs, SlotCallee};
use crate::messages::{FullConnect, SlotFullDisconnect, SlotHalfConnect};
use crate::monitor::{Anchor, MonitorLink};
use std::cell::RefCell;
use std::ptr;

pub(crate) struct SlotConnection<P: SignalArgs> {
    pub(crate) link: MonitorLink,
    pub(crate) edge: *const Edge<P>,
}

/// Receive-side endpoint: invokes a callback on its owning object.
///
/// Embed in an anchored object and call [`attach`](Self::attach) once the
/// object has its final (boxed) address, before connecting anything.
pub struct Slot<P: SignalArgs> {
    callee: SlotCallee<P>,
    /// Back-link to the owning object's monitor; our identity on peers.
    owner: MonitorLink,
    /// The owning object, handed to the callee on every invocation.
    object: *mut (),
    connections: RefCell<Vec<SlotConnection<P>>>,
}

impl<P: SignalArgs> Slot<P> {
    pub fn new(callee: SlotCallee<P>) -> Self {
        Self {
            callee,
            owner: MonitorLink::empty(),
            object: ptr::null_mut(),
            connections: RefCell::new(Vec::new()),
        }
    }

    /// Pin the owning object: its anchor (our identity) and address.
    pub fn attach<T>(&mut self, anchor: &Anchor, object: *mut T) {
        self.owner = anchor.link();
        self.object = object.cast();
    }

    /// Whether any edge is currently connected to this slot.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.connections.borrow().is_empty()
    }

    /// Remove the one connection matching `edge` and the given identity,
    /// and ask the edge to drop its half. Slot owner's thread only.
    pub fn disconnect(&self, edge_link: &MonitorLink, edge: &Edge<P>) {
        self.disconnect_local(edge_link, edge as *const Edge<P>);
    }

    /// Remove one connection to `edge`, driving the removal from the slot
    /// owner's thread (queued when called elsewhere).
    pub(crate) fn disconnect_from(
        &self,
        slot_link: MonitorLink,
        edge_link: MonitorLink,
        edge: *const Edge<P>,
    ) {
        if slot_link.same_mailbox() {
            self.disconnect_local(&edge_link, edge);
        } else {
            SlotFullDisconnect::send(slot_link, self as *const Slot<P>, edge_link, edge);
        }
    }

    /// Remove every connection to `edge`. Slot owner's thread only.
    pub fn disconnect_all_from(&self, edge: &Edge<P>) {
        let edge_ptr = edge as *const Edge<P>;
        loop {
            let removed = {
                let mut conns = self.connections.borrow_mut();
                match conns.iter().position(|c| ptr::eq(c.edge, edge_ptr)) {
                    Some(pos) => Some(conns.remove(pos)),
                    None => None,
                }
            };
            match removed {
                Some(conn) => self.request_peer_half_disconnect(conn),
                None => break,
            }
        }
    }

    /// Drop every connection, notifying each peer. Slot owner's thread only.
    pub fn disconnect_all(&self) {
        let conns = self.connections.take();
        for conn in conns {
            self.request_peer_half_disconnect(conn);
        }
    }

    /// Full connect, callable from any thread.
    ///
    /// Each half lands on its own owner's thread. When the caller IS one of
    /// the owners, that owner's half is applied before this returns: in
    /// particular, an emit on the edge's thread right after `connect`
    /// already sees the new peer. Only when neither owner lives here is the
    /// whole operation shipped to the slot owner's mailbox.
    pub(crate) fn connect_routed(
        &self,
        slot_link: MonitorLink,
        edge_link: MonitorLink,
        edge: *const Edge<P>,
        mode: DeliveryMode,
    ) {
        if slot_link.same_mailbox() {
            self.half_connect_local(edge_link.clone(), edge);
            Edge::half_connect_request(edge_link, edge, slot_link, self as *const Slot<P>, mode);
        } else if edge_link.same_mailbox() {
            Edge::half_connect_request(
                edge_link.clone(),
                edge,
                slot_link.clone(),
                self as *const Slot<P>,
                mode,
            );
            Slot::half_connect_request(slot_link, self as *const Slot<P>, edge_link, edge);
        } else {
            FullConnect::send(slot_link, self as *const Slot<P>, edge_link, edge, mode);
        }
    }

    /// Run the slot-side half-connect on the owner's thread, wherever that
    /// is; rolls the edge's half back if the slot owner died first.
    pub(crate) fn half_connect_request(
        slot_link: MonitorLink,
        slot: *const Slot<P>,
        edge_link: MonitorLink,
        edge: *const Edge<P>,
    ) {
        if slot_link.same_mailbox() {
            if slot_link.is_alive() {
                // SAFETY: owner alive and affiliated with this thread, so
                // the embedded slot is valid and exclusively ours to touch.
                unsafe { (*slot).half_connect_local(edge_link, edge) };
            } else if edge_link.is_alive() {
                Edge::half_disconnect_request(edge_link, edge, slot_link, slot);
            }
        } else {
            SlotHalfConnect::send(slot_link, slot, edge_link, edge);
        }
    }

    /// Run the slot-side half-disconnect on the owner's thread.
    pub(crate) fn half_disconnect_request(
        slot_link: MonitorLink,
        slot: *const Slot<P>,
        edge_link: MonitorLink,
        edge: *const Edge<P>,
    ) {
        if slot_link.same_mailbox() {
            if slot_link.is_alive() {
                // SAFETY: as in half_connect_request.
                unsafe { (*slot).half_disconnect_local(edge, &edge_link) };
            }
        } else {
            crate::messages::SlotHalfDisconnect::send(slot_link, slot, edge_link, edge);
        }
    }

    pub(crate) fn half_connect_local(&self, edge_link: MonitorLink, edge: *const Edge<P>) {
        self.connections
            .borrow_mut()
            .push(SlotConnection {
                link: edge_link,
                edge,
            });
    }

    /// Erase the unique record matching both the edge pointer and the link
    /// identity.
    pub(crate) fn half_disconnect_local(&self, edge: *const Edge<P>, edge_link: &MonitorLink) {
        let mut conns = self.connections.borrow_mut();
        if let Some(pos) = conns
            .iter()
            .position(|c| ptr::eq(c.edge, edge) && c.link == *edge_link)
        {
            conns.remove(pos);
        }
    }

    fn disconnect_local(&self, edge_link: &MonitorLink, edge: *const Edge<P>) {
        let removed = {
            let mut conns = self.connections.borrow_mut();
            match conns
                .iter()
                .position(|c| ptr::eq(c.edge, edge) && c.link == *edge_link)
            {
                Some(pos) => Some(conns.remove(pos)),
                None => None,
            }
        };
        if let Some(conn) = removed {
            self.request_peer_half_disconnect(conn);
        }
    }

    fn request_peer_half_disconnect(&self, conn: SlotConnection<P>) {
        Edge::half_disconnect_request(
            conn.link,
            conn.edge,
            self.owner.clone(),
            self as *const Slot<P>,
        );
    }

    /// Our identity as stored on peers.
    pub(crate) fn owner_link(&self) -> MonitorLink {
        self.owner.clone()
    }

    /// Invoke the callee. Owner's thread only, owner alive.
    pub(crate) fn receive(&self, args: P) {
        (self.callee)(self, self.object, args);
    }
}

impl<P: SignalArgs> Drop for Slot<P> {
    fn drop(&mut self) {
        self.disconnect_all();
    }
}
