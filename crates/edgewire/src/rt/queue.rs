// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Many-producer single-consumer intrusive queue (tail-swap).
//!
//! A singly-linked list with a permanent sentinel node. Producers allocate a
//! node and swap it into `tail`; the consumer walks `head` forward, moving
//! payloads out. Producers are wait-free (one atomic swap + one store);
//! the consumer never blocks.
//!
//! # Ordering
//!
//! - FIFO per producer.
//! - Across producers, delivery order is the linearization of `tail` swaps.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

struct Node<T> {
    next: AtomicPtr<Node<T>>,
    /// `None` only on the sentinel; every enqueued node carries `Some`.
    payload: Option<T>,
}

impl<T> Node<T> {
    fn boxed(payload: Option<T>) -> *mut Self {
        Box::into_raw(Box::new(Self {
            next: AtomicPtr::new(ptr::null_mut()),
            payload,
        }))
    }
}

/// Lock-free MPSC queue of owned payloads.
///
/// Protocol:
/// - Any number of threads may call [`push`](Self::push) concurrently.
/// - Exactly ONE thread (the consumer) may call [`pop`](Self::pop). Which
///   thread that is may change over time, but calls must never overlap.
pub struct MpscQueue<T> {
    /// Consumer-owned cursor; always points at the current sentinel.
    head: UnsafeCell<*mut Node<T>>,
    /// Last enqueued node; producers swap themselves in here.
    tail: AtomicPtr<Node<T>>,
}

// SAFETY: MpscQueue is Send + Sync because:
// - `tail` is only touched through atomic swap/store (multi-producer safe).
// - `head` is only touched by the single consumer (protocol above), so the
//   UnsafeCell is never aliased.
// - A node is freed only after its successor link is published, and a
//   producer's predecessor cannot be freed before that producer stores the
//   `next` link (the consumer stops at a null `next`).
unsafe impl<T: Send> Send for MpscQueue<T> {}
unsafe impl<T: Send> Sync for MpscQueue<T> {}

impl<T> MpscQueue<T> {
    pub fn new() -> Self {
        let sentinel = Node::boxed(None);
        Self {
            head: UnsafeCell::new(sentinel),
            tail: AtomicPtr::new(sentinel),
        }
    }

    /// Enqueue a payload (wait-free, any thread).
    pub fn push(&self, payload: T) {
        let node = Node::boxed(Some(payload));
        // SeqCst swap: the global enqueue order is the order of these swaps.
        let prev = self.tail.swap(node, Ordering::SeqCst);
        // Release: the consumer must observe the fully-written node once it
        // sees the link. `prev` cannot have been freed: its `next` is still
        // null, and the consumer only frees nodes it has walked past.
        unsafe {
            (*prev).next.store(node, Ordering::Release);
        }
    }

    /// Dequeue one payload, or `None` when the queue is observed empty.
    ///
    /// Never blocks. Single-consumer: see the type-level protocol.
    pub fn pop(&self) -> Option<T> {
        // SAFETY: single-consumer contract makes the head cursor and the
        // nodes behind it exclusively ours; Acquire on `next` pairs with the
        // producer's Release publication.
        unsafe {
            let head = *self.head.get();
            let next = (*head).next.load(Ordering::Acquire);
            if next.is_null() {
                return None;
            }
            let payload = (*next).payload.take();
            drop(Box::from_raw(head));
            *self.head.get() = next;
            payload
        }
    }
}

impl<T> Default for MpscQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for MpscQueue<T> {
    fn drop(&mut self) {
        // Exclusive access (&mut): free the whole chain, payloads included.
        let mut cursor = *self.head.get_mut();
        while !cursor.is_null() {
            // SAFETY: every node in the chain was Box-allocated by push/new
            // and is owned by the queue until walked past.
            let node = unsafe { Box::from_raw(cursor) };
            cursor = node.next.load(Ordering::Relaxed);
        }
    }
}
