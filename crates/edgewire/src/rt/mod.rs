// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime primitives: the lock-free queue, semaphore, spin RW lock, wake
//! event, and the mailbox assembled from them.

pub mod event;
pub mod mailbox;
pub mod queue;
pub mod sem;
pub mod spinrw;

pub use event::Event;
pub use mailbox::{Mailbox, WaitQueue};
pub use queue::MpscQueue;
pub use sem::Semaphore;
pub use spinrw::SpinRwLock;
