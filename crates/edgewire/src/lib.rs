// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # edgewire - thread-affine signal/slot runtime
//!
//! A library for reactive, object-oriented concurrent programs: objects
//! live on dedicated worker threads, communicate exclusively through typed
//! edge→slot connections, and survive arbitrary object lifetimes and
//! arbitrary connect/disconnect races.
//!
//! ## Quick Start
//!
//! ```rust
//! use edgewire::{connect, slot_callee, Anchor, Edge, Slot};
//!
//! struct Counter {
//!     slot: Slot<(i32, i32)>,
//!     anchor: Anchor,
//!     total: i32,
//! }
//!
//! impl Counter {
//!     fn new() -> Box<Self> {
//!         let mut counter = Box::new(Self {
//!             slot: Slot::new(slot_callee!(Counter, on_add)),
//!             anchor: Anchor::new(),
//!             total: 0,
//!         });
//!         let object: *mut Self = &mut *counter;
//!         let Self { slot, anchor, .. } = &mut *counter;
//!         slot.attach(anchor, object);
//!         counter
//!     }
//!
//!     fn on_add(&mut self, (a, b): (i32, i32)) {
//!         self.total += a + b;
//!     }
//! }
//!
//! struct Source {
//!     edge: Edge<(i32, i32)>,
//!     anchor: Anchor,
//! }
//!
//! impl Source {
//!     fn new() -> Box<Self> {
//!         let mut source = Box::new(Self {
//!             edge: Edge::new(),
//!             anchor: Anchor::new(),
//!         });
//!         let object: *mut Self = &mut *source;
//!         let Self { edge, anchor, .. } = &mut *source;
//!         edge.attach(anchor, object);
//!         source
//!     }
//! }
//!
//! let counter = Counter::new();
//! let source = Source::new();
//! connect(&source.anchor, &source.edge, &counter.anchor, &counter.slot);
//! source.edge.emit((1, 2));
//! assert_eq!(counter.total, 3);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                        Application Layer                           |
//! |   anchored objects -> Edge / Slot members -> connect / emit        |
//! +--------------------------------------------------------------------+
//! |                        Protocol Layer                              |
//! |   Signal | HalfConnect (+rollback) | FullConnect | Quit | Timers   |
//! +--------------------------------------------------------------------+
//! |                        Liveness Layer                              |
//! |   ObjectMonitor (alive bit + refcount word) | Anchor | MonitorLink |
//! +--------------------------------------------------------------------+
//! |                        Runtime Layer                               |
//! |   MPSC tail-swap queue | semaphore | spin RW lock | mailbox        |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Threading model
//!
//! Every thread owns one mailbox; every anchored object is affiliated with
//! exactly one mailbox at a time. All mutation of an endpoint's connection
//! lists happens on its affiliated thread; cross-thread requests arrive as
//! messages that run the step locally. Emitting picks, per connection,
//! between synchronous invocation and enqueueing on the peer's mailbox
//! ([`DeliveryMode`]).
//!
//! Destroying either end of a connection at any moment is safe: the
//! monitor's alive bit turns in-flight signals into silent drops, and
//! half-connect messages that never get consumed compensate from `Drop`.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Anchor`] | Ownership handle keeping an object's monitor alive |
//! | [`Edge`] | Emit-side endpoint; fans out to connected slots |
//! | [`Slot`] | Receive-side endpoint; invokes a method on its object |
//! | [`WorkerThread`] | Thread bound to one mailbox, running the loop |
//! | [`Timer`] | Periodic/one-shot emitter on a thread's timer list |

/// Typed connection endpoints (edges, slots, connect surfaces).
pub mod endpoint;
/// OS-primitive error types.
pub mod error;
/// Cross-thread protocol messages.
pub mod messages;
/// Object liveness and mailbox affinity (monitor, anchor, weak link).
pub mod monitor;
/// Runtime primitives (lock-free queue, semaphore, spin RW lock, mailbox).
pub mod rt;
/// Periodic and one-shot timers.
pub mod timer;
/// Blocking helpers driving the message loop until a condition holds.
pub mod waiters;
/// Worker threads and the message loop.
pub mod worker;

pub use endpoint::{
    connect, connect_with, disconnect, disconnect_from_edge, DeliveryMode, Edge, SignalArgs, Slot,
    SlotCallee,
};
pub use error::{SyscallError, WaitError};
pub use messages::{LoopControl, Message, MessagePtr};
pub use monitor::{Anchor, MonitorLink};
pub use rt::Mailbox;
pub use timer::Timer;
pub use waiters::{wait_for_disconnected, wait_for_signal};
pub use worker::{local_mailbox, message_loop, message_loop_while, post_self_quit, WorkerThread};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
