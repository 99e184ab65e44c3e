// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed connection endpoints.
//!
//! An [`Edge`] fans a payload out to connected [`Slot`]s; each connection
//! carries its own [`DeliveryMode`]. Endpoints are embedded in anchored
//! objects and their connection lists are owned by the thread the object is
//! affiliated with: there are no locks, thread affinity is the discipline.
//! Connect and disconnect may be initiated from any thread; the steps that
//! mutate a remote endpoint travel as mailbox messages.

pub mod edge;
pub mod slot;

pub use edge::Edge;
pub use slot::Slot;

use crate::monitor::Anchor;

/// Bound for signal payloads: cloned per delivery, shipped across threads.
pub trait SignalArgs: Clone + Send + 'static {}

impl<T: Clone + Send + 'static> SignalArgs for T {}

/// Per-connection invocation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Synchronous when the peer shares the emitter's mailbox, queued
    /// otherwise.
    #[default]
    Auto,
    /// Always synchronous; the caller asserts re-entrancy safety.
    Direct,
    /// Always queued on the peer's current mailbox.
    Queue,
    /// Queued, with the emitter blocked until the peer consumed the signal.
    /// Falls back to synchronous on the emitter's own mailbox (no
    /// self-deadlock).
    BlockQueue,
}

/// Callback invoked when a slot receives a signal: the slot itself, the
/// type-erased owning object, and the payload.
pub type SlotCallee<P> = fn(&Slot<P>, *mut (), P);

/// Build a [`SlotCallee`] that forwards to a method of the owning object.
///
/// ```ignore
/// struct Counter { slot: Slot<(i32, i32)>, anchor: Anchor, total: i32 }
/// impl Counter {
///     fn on_add(&mut self, (a, b): (i32, i32)) { self.total += a + b; }
/// }
/// let slot = Slot::new(slot_callee!(Counter, on_add));
/// ```
#[macro_export]
macro_rules! slot_callee {
    ($owner:ty, $method:ident) => {
        |_slot, object: *mut (), args| {
            // SAFETY: a slot is invoked only while its owner is alive and on
            // the owner's affiliated thread; `object` is the enclosing
            // object pinned by `attach`.
            let owner = unsafe { &mut *object.cast::<$owner>() };
            owner.$method(args);
        }
    };
}

/// Connect `edge` to `slot` with [`DeliveryMode::Auto`].
///
/// May be called from any thread; both owners must outlive the call only.
/// Every later lifetime race is handled by the protocol.
pub fn connect<P: SignalArgs>(
    edge_owner: &Anchor,
    edge: &Edge<P>,
    slot_owner: &Anchor,
    slot: &Slot<P>,
) {
    connect_with(edge_owner, edge, slot_owner, slot, DeliveryMode::Auto);
}

/// Connect `edge` to `slot` with an explicit delivery mode.
pub fn connect_with<P: SignalArgs>(
    edge_owner: &Anchor,
    edge: &Edge<P>,
    slot_owner: &Anchor,
    slot: &Slot<P>,
    mode: DeliveryMode,
) {
    slot.connect_routed(
        slot_owner.link(),
        edge_owner.link(),
        edge as *const Edge<P>,
        mode,
    );
}

/// Remove one `edge`→`slot` connection, driving the removal from the slot
/// owner's thread. Idempotent once the pair is disconnected.
pub fn disconnect<P: SignalArgs>(
    edge_owner: &Anchor,
    edge: &Edge<P>,
    slot_owner: &Anchor,
    slot: &Slot<P>,
) {
    slot.disconnect_from(slot_owner.link(), edge_owner.link(), edge as *const Edge<P>);
}

/// Remove one `edge`→`slot` connection, driving the removal from the edge
/// owner's thread.
pub fn disconnect_from_edge<P: SignalArgs>(
    edge_owner: &Anchor,
    edge: &Edge<P>,
    slot_owner: &Anchor,
    slot: &Slot<P>,
) {
    edge.disconnect_pair(edge_owner.link(), slot_owner.link(), slot as *const Slot<P>);
}
