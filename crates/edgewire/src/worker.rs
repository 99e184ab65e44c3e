// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Worker threads and the message loop.
//!
//! Every thread that touches the runtime owns exactly one mailbox, exposed
//! thread-locally (lazily created, so the main thread needs no setup). A
//! [`WorkerThread`] pre-allocates the mailbox on the spawning thread (the
//! handle is usable for [`grab_object`](WorkerThread::grab_object) and
//! posting before the worker has even started), installs it on entry, and
//! runs [`message_loop`].
//!
//! One loop iteration: fire expired timers, evaluate the continuation
//! predicate, then dequeue (timed when a timer deadline is pending) and
//! consume. A panicking handler is confined to its message; only the quit
//! message ends the loop.

use crate::error::SyscallError;
use crate::messages::{LoopControl, MessagePtr, QuitMessage};
use crate::monitor::Anchor;
use crate::rt::Mailbox;
use crate::timer;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

thread_local! {
    static LOCAL_MAILBOX: RefCell<Option<Arc<Mailbox>>> = const { RefCell::new(None) };
}

/// The calling thread's mailbox, created on first touch.
pub fn local_mailbox() -> Arc<Mailbox> {
    LOCAL_MAILBOX.with(|slot| {
        let mut slot = slot.borrow_mut();
        if let Some(mailbox) = slot.as_ref() {
            return Arc::clone(mailbox);
        }
        #[allow(clippy::expect_used)] // no mailbox means no thread: unrecoverable
        let mailbox = Arc::new(Mailbox::new().expect("thread mailbox allocation"));
        *slot = Some(Arc::clone(&mailbox));
        mailbox
    })
}

fn install_local_mailbox(mailbox: Arc<Mailbox>) {
    LOCAL_MAILBOX.with(|slot| {
        *slot.borrow_mut() = Some(mailbox);
    });
}

/// Enqueue a quit message on the calling thread's own mailbox.
pub fn post_self_quit() {
    local_mailbox().enqueue(Box::new(QuitMessage));
}

/// Run the message loop until a quit message arrives.
pub fn message_loop() {
    message_loop_while(|| true);
}

/// Run the message loop while `predicate` holds.
///
/// The predicate is evaluated after each timer drain and before each
/// dequeue; the loop also ends when a quit message is consumed.
pub fn message_loop_while<F: FnMut() -> bool>(mut predicate: F) {
    let mailbox = local_mailbox();
    loop {
        timer::fire_expired();
        if !predicate() {
            return;
        }
        let msg = match timer::next_deadline() {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match mailbox.dequeue_timeout(wait) {
                    Some(msg) => msg,
                    None => continue, // deadline hit: drain timers first
                }
            }
            None => mailbox.dequeue(),
        };
        if consume_guarded(msg) == LoopControl::Quit {
            return;
        }
    }
}

/// Consume one message; a panicking handler must not kill the worker.
fn consume_guarded(msg: MessagePtr) -> LoopControl {
    match panic::catch_unwind(AssertUnwindSafe(move || msg.consume())) {
        Ok(control) => control,
        Err(_) => {
            log::debug!("[loop] message handler panicked; message dropped");
            LoopControl::Continue
        }
    }
}

/// A worker thread bound to one mailbox.
///
/// Shut down cooperatively: [`post_quit`](Self::post_quit) then
/// [`join`](Self::join). Dropping the handle detaches the thread.
pub struct WorkerThread {
    mailbox: Arc<Mailbox>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    /// Spawn a worker running the plain message loop.
    pub fn spawn() -> Result<Self, SyscallError> {
        Self::start(message_loop)
    }

    /// Spawn a worker that runs `f` instead of the message loop.
    ///
    /// The thread still gets its mailbox installed first, so `f` may call
    /// [`message_loop`] itself, anchor objects, or just finish.
    pub fn spawn_with<F>(f: F) -> Result<Self, SyscallError>
    where
        F: FnOnce() + Send + 'static,
    {
        Self::start(f)
    }

    fn start<F>(body: F) -> Result<Self, SyscallError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mailbox = Arc::new(Mailbox::new()?);
        let inbox = Arc::clone(&mailbox);
        let handle = thread::Builder::new()
            .name("edgewire-worker".into())
            .spawn(move || {
                install_local_mailbox(inbox);
                body();
            })
            .map_err(|err| SyscallError::new("thread_spawn", err))?;
        Ok(Self {
            mailbox,
            handle: Some(handle),
        })
    }

    /// This worker's mailbox handle.
    pub fn mailbox(&self) -> Arc<Mailbox> {
        Arc::clone(&self.mailbox)
    }

    /// Re-affiliate an anchored object with this worker's mailbox.
    ///
    /// Undefined during active traffic unless the object's endpoint lists
    /// are empty (see [`Anchor::move_to_mailbox`]).
    pub fn grab_object(&self, anchor: &Anchor) {
        anchor.move_to_mailbox(self.mailbox());
    }

    /// Ask the worker's loop to finish after the messages already queued.
    pub fn post_quit(&self) {
        self.mailbox.enqueue(Box::new(QuitMessage));
    }

    /// Wait for the worker to finish. Idempotent.
    pub fn join(&mut self) -> thread::Result<()> {
        match self.handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }

    /// Give up the handle; the thread keeps running detached.
    pub fn detach(&mut self) {
        self.handle = None;
    }

    #[must_use]
    pub fn joinable(&self) -> bool {
        self.handle.is_some()
    }

    pub fn thread_id(&self) -> Option<ThreadId> {
        self.handle.as_ref().map(|handle| handle.thread().id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Message;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_spawn_quit_join() {
        let mut worker = WorkerThread::spawn().expect("spawn worker");
        assert!(worker.joinable());
        assert!(worker.thread_id().is_some());
        worker.post_quit();
        worker.join().expect("worker panicked");
        assert!(!worker.joinable());
        worker.join().expect("second join is a no-op");
    }

    #[test]
    fn test_spawn_with_runs_body() {
        static RAN: AtomicBool = AtomicBool::new(false);
        let mut worker = WorkerThread::spawn_with(|| {
            RAN.store(true, Ordering::SeqCst);
        })
        .expect("spawn worker");
        worker.join().expect("worker panicked");
        assert!(RAN.load(Ordering::SeqCst));
    }

    #[test]
    fn test_self_quit_ends_loop() {
        let mut worker = WorkerThread::spawn_with(|| {
            post_self_quit();
            message_loop();
        })
        .expect("spawn worker");
        worker.join().expect("worker panicked");
    }

    #[test]
    fn test_panicking_message_does_not_kill_loop() {
        struct Explode;
        impl Message for Explode {
            fn consume(self: Box<Self>) -> LoopControl {
                panic!("handler failure");
            }
        }

        let mut worker = WorkerThread::spawn().expect("spawn worker");
        worker.mailbox().enqueue(Box::new(Explode));
        // The loop must survive the panic and still honor the quit.
        worker.post_quit();
        worker.join().expect("worker panicked");
    }

    #[test]
    fn test_predicate_loop_exits_without_quit() {
        // A false predicate ends the loop before the first dequeue.
        let mut worker = WorkerThread::spawn_with(|| {
            message_loop_while(|| false);
        })
        .expect("spawn worker");
        worker.join().expect("worker panicked");
    }
}
