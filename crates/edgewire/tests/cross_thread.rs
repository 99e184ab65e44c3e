// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cross-thread lifecycle: workers, object transfer, queued delivery,
//! blocking delivery, ordering, and teardown races.

mod common;

use common::{AffinityCounter, Counter, OrderProbe, Pair, Source};
use edgewire::{
    connect, connect_with, local_mailbox, DeliveryMode, Edge, LoopControl, Message, WorkerThread,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn worker_runs_custom_body() {
    let flag = Arc::new(AtomicBool::new(false));
    let thread_flag = Arc::clone(&flag);
    let mut worker = WorkerThread::spawn_with(move || {
        thread_flag.store(true, Ordering::SeqCst);
    })
    .expect("spawn worker");
    worker.join().expect("worker panicked");
    assert!(flag.load(Ordering::SeqCst));
}

#[test]
fn worker_quits_on_request() {
    let mut worker = WorkerThread::spawn().expect("spawn worker");
    worker.post_quit();
    worker.join().expect("worker panicked");
}

#[test]
fn moved_object_receives_queued_delivery() {
    let mut worker = WorkerThread::spawn().expect("spawn worker");

    let slt = AffinityCounter::new();
    let sig = Source::new();
    connect(&sig.anchor, &sig.edge, &slt.anchor, &slt.slot);

    worker.grab_object(&slt.anchor);

    sig.edge.emit((1, 2));
    worker.post_quit();
    worker.join().expect("worker panicked");

    assert_eq!(slt.total, 3);
}

#[test]
fn connect_to_object_already_on_worker_then_emit() {
    let mut worker = WorkerThread::spawn().expect("spawn worker");

    let slt = AffinityCounter::new();
    worker.grab_object(&slt.anchor);

    let sig = Source::new();
    // The edge's half is applied here, synchronously: the very next emit
    // already fans out to the remote slot.
    connect(&sig.anchor, &sig.edge, &slt.anchor, &slt.slot);
    sig.edge.emit((1, 2));

    worker.post_quit();
    worker.join().expect("worker panicked");

    assert_eq!(slt.total, 3);
}

#[test]
fn blocking_delivery_completes_before_emit_returns() {
    let mut worker = WorkerThread::spawn().expect("spawn worker");

    let slt = AffinityCounter::new();
    let sig = Source::new();
    connect_with(
        &sig.anchor,
        &sig.edge,
        &slt.anchor,
        &slt.slot,
        DeliveryMode::BlockQueue,
    );

    worker.grab_object(&slt.anchor);

    sig.edge.emit((1, 2));
    // Blocking delivery: the effect is visible the moment emit returns.
    assert_eq!(slt.total, 3);

    worker.post_quit();
    worker.join().expect("worker panicked");
    assert_eq!(slt.total, 3);
}

#[test]
fn peers_on_one_mailbox_deliver_in_connection_order() {
    let mut worker = WorkerThread::spawn().expect("spawn worker");
    let log = Arc::new(Mutex::new(Vec::new()));

    let first = OrderProbe::new(1, Arc::clone(&log));
    let second = OrderProbe::new(2, Arc::clone(&log));
    worker.grab_object(&first.anchor);
    worker.grab_object(&second.anchor);

    let sig = Source::new();
    connect(&sig.anchor, &sig.edge, &first.anchor, &first.slot);
    connect(&sig.anchor, &sig.edge, &second.anchor, &second.slot);

    sig.edge.emit((1, 2));
    sig.edge.emit((3, 4));
    worker.post_quit();
    worker.join().expect("worker panicked");

    assert_eq!(*log.lock().expect("order log poisoned"), vec![1, 2, 1, 2]);
}

/// Runs an emit on whichever thread consumes it (an edge may only be
/// emitted from its affiliated thread).
struct RunEmit(*const Edge<Pair>, Pair);

// SAFETY: the pointer is dereferenced only on the edge owner's thread (the
// consuming worker), and the test keeps the owner alive past the join.
unsafe impl Send for RunEmit {}

impl Message for RunEmit {
    fn consume(self: Box<Self>) -> LoopControl {
        // SAFETY: see the Send rationale above.
        unsafe { (*self.0).emit(self.1) };
        LoopControl::Continue
    }
}

#[test]
fn signal_queued_to_dead_object_is_dropped() {
    common::init_logs();
    let mut worker = WorkerThread::spawn().expect("spawn worker");

    // The edge lives on the worker; the receiving object stays here.
    let sig = Source::new();
    worker.grab_object(&sig.anchor);

    let log = Arc::new(Mutex::new(Vec::new()));
    let probe = OrderProbe::new(7, Arc::clone(&log));
    connect(&sig.anchor, &sig.edge, &probe.anchor, &probe.slot);

    // Worker emits; the signal for our thread lands in our mailbox.
    worker
        .mailbox()
        .enqueue(Box::new(RunEmit(&sig.edge, (1, 2))));
    let queued = local_mailbox()
        .dequeue_timeout(Duration::from_secs(5))
        .expect("queued signal from the worker");

    // The object dies before its signal is consumed: silent drop.
    drop(probe);
    queued.consume();
    assert!(log.lock().expect("order log poisoned").is_empty());

    worker.post_quit();
    worker.join().expect("worker panicked");
}

#[test]
fn unconsumed_half_connect_rolls_the_other_half_back() {
    common::init_logs();
    // A worker that exits immediately: its mailbox is never drained.
    let mut worker = WorkerThread::spawn_with(|| {}).expect("spawn worker");
    worker.join().expect("worker panicked");

    let sig = Source::new();
    worker.grab_object(&sig.anchor);

    let slt = Counter::new();
    connect(&sig.anchor, &sig.edge, &slt.anchor, &slt.slot);
    // Our half exists; the edge's half sits in the dead worker's mailbox.
    assert!(slt.slot.is_connected());

    // Tearing the mailbox down destroys the never-consumed half-connect,
    // which must compensate by removing our half.
    drop(worker);
    drop(sig);
    assert!(!slt.slot.is_connected());
}

#[test]
fn grab_object_to_local_thread_restores_synchronous_delivery() {
    let mut worker = WorkerThread::spawn().expect("spawn worker");

    let slt = Counter::new();
    let sig = Source::new();
    connect(&sig.anchor, &sig.edge, &slt.anchor, &slt.slot);

    worker.grab_object(&slt.anchor);
    worker.post_quit();
    worker.join().expect("worker panicked");

    // Back on this thread: delivery is synchronous again.
    slt.anchor.move_to_local_thread();
    sig.edge.emit((1, 2));
    assert_eq!(slt.total, 3);
}
