// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Timer scheduling and the signal waiters.

mod common;

use common::{CountThenQuit, Pair, Source};
use edgewire::{
    connect, message_loop, wait_for_signal, Anchor, Edge, Timer, WorkerThread,
};
use std::time::{Duration, Instant};

#[test]
fn one_shot_timer_fires_once_then_deactivates() {
    let timer = Timer::new(Duration::from_millis(20), false);
    let probe = CountThenQuit::new(1);
    connect(timer.anchor(), &timer.timeout, &probe.anchor, &probe.slot);

    let start = Instant::now();
    timer.activate();
    assert!(timer.is_active());
    message_loop();

    assert_eq!(probe.hits, 1);
    assert!(!timer.is_active());
    assert!(start.elapsed() >= Duration::from_millis(15));
}

#[test]
fn repeating_timer_fires_periodically() {
    let timer = Timer::new(Duration::from_millis(10), true);
    let probe = CountThenQuit::new(3);
    connect(timer.anchor(), &timer.timeout, &probe.anchor, &probe.slot);

    let start = Instant::now();
    timer.activate();
    message_loop();

    assert_eq!(probe.hits, 3);
    // Fire k happens no earlier than start + k * period.
    assert!(start.elapsed() >= Duration::from_millis(25));
    // A repeating timer stays armed until told otherwise.
    assert!(timer.is_active());
    timer.deactivate();
}

#[test]
fn deactivated_timer_never_fires() {
    let fast = Timer::new(Duration::from_millis(5), true);
    let watchdog = Timer::new(Duration::from_millis(60), false);
    let probe = CountThenQuit::new(1);
    connect(fast.anchor(), &fast.timeout, &probe.anchor, &probe.slot);
    connect(watchdog.anchor(), &watchdog.timeout, &probe.anchor, &probe.slot);

    fast.activate();
    fast.deactivate();
    let start = Instant::now();
    watchdog.activate();
    message_loop();

    // Only the watchdog fired, and not before its own deadline: the fast
    // timer really was disarmed.
    assert_eq!(probe.hits, 1);
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[test]
fn timer_activated_from_another_thread_fires_on_its_owner() {
    let mut worker = WorkerThread::spawn().expect("spawn worker");

    let timer = Timer::new(Duration::from_millis(10), false);
    let probe = CountThenQuit::new(1);
    worker.grab_object(timer.anchor());
    worker.grab_object(&probe.anchor);

    // Both endpoints live on the worker; the connect ships over as one
    // operation, the activation as a timer-control message.
    connect(timer.anchor(), &timer.timeout, &probe.anchor, &probe.slot);
    timer.activate();

    worker.join().expect("worker panicked");
    assert_eq!(probe.hits, 1);
}

#[test]
fn wait_for_signal_catches_timer_fire() {
    let timer = Timer::new(Duration::from_millis(20), false);

    let caught = wait_for_signal(timer.anchor(), &timer.timeout, || {
        timer.activate();
        true
    });
    assert!(caught);
}

#[test]
fn wait_for_signal_respects_declined_starter() {
    let timer = Timer::new(Duration::from_millis(20), false);

    let caught = wait_for_signal(timer.anchor(), &timer.timeout, || false);
    assert!(!caught);
}

#[test]
fn wait_for_signal_reports_destroyed_edge() {
    let sig: Box<Source> = Source::new();
    let anchor: *const Anchor = &sig.anchor;
    let edge: *const Edge<Pair> = &sig.edge;
    let mut holder = Some(sig);

    // The starter destroys the watched edge (the box's heap allocation is
    // what the borrowed references point into; neither is touched after
    // the starter runs). The catcher gets disconnected instead of
    // signalled, and the wait reports failure.
    let caught = wait_for_signal(
        // SAFETY: valid until the starter drops the holder; unused after.
        unsafe { &*anchor },
        unsafe { &*edge },
        || {
            holder.take();
            true
        },
    );
    assert!(!caught);
}
