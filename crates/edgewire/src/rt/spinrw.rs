// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Spin reader/writer lock for single-pointer critical sections.
//!
//! One atomic word: bit 0 is the writer flag, each reader adds 2. Readers
//! that lose the race to a writer roll their increment back and spin.
//! Suitable only for critical sections of a few instructions (the monitor's
//! mailbox slot is one pointer read or write); there is no queueing and no
//! fairness.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, Ordering};

const WRITER: u32 = 1;

/// Spin RW lock protecting a `T`.
pub struct SpinRwLock<T> {
    state: AtomicU32,
    value: UnsafeCell<T>,
}

// SAFETY: the lock protocol gives readers shared access and the writer
// exclusive access; T crosses threads only under those guards.
unsafe impl<T: Send> Send for SpinRwLock<T> {}
unsafe impl<T: Send + Sync> Sync for SpinRwLock<T> {}

impl<T> SpinRwLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: AtomicU32::new(0),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire shared access.
    pub fn read(&self) -> ReadGuard<'_, T> {
        loop {
            // Optimistic: register as a reader, then check for a writer.
            if self.state.fetch_add(2, Ordering::SeqCst) & WRITER == 0 {
                break;
            }
            // Writer present: roll back. If the writer left in between, the
            // next attempt will succeed immediately.
            if self.state.fetch_sub(2, Ordering::SeqCst) & WRITER == 0 {
                continue;
            }
            while self.state.load(Ordering::SeqCst) & WRITER != 0 {
                std::hint::spin_loop();
            }
        }
        ReadGuard { lock: self }
    }

    /// Acquire exclusive access.
    pub fn write(&self) -> WriteGuard<'_, T> {
        loop {
            let prev = self.state.fetch_or(WRITER, Ordering::SeqCst);
            if prev == 0 {
                // Uncontended: bit taken, no readers.
                return WriteGuard { lock: self };
            }
            if prev & WRITER == 0 {
                // We took the writer bit; wait for readers to drain.
                break;
            }
            // Another writer holds the bit.
            while self.state.load(Ordering::SeqCst) & WRITER != 0 {
                std::hint::spin_loop();
            }
        }
        while self.state.load(Ordering::SeqCst) != WRITER {
            std::hint::spin_loop();
        }
        WriteGuard { lock: self }
    }
}

/// Shared guard; unlocks on drop.
pub struct ReadGuard<'a, T> {
    lock: &'a SpinRwLock<T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: reader registration excludes any writer.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.state.fetch_sub(2, Ordering::SeqCst);
    }
}

/// Exclusive guard; unlocks on drop.
pub struct WriteGuard<'a, T> {
    lock: &'a SpinRwLock<T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the writer bit excludes all readers and other writers.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above; exclusive access.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.state.fetch_sub(WRITER, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_read_then_write() {
        let lock = SpinRwLock::new(7u32);
        {
            let guard = lock.read();
            assert_eq!(*guard, 7);
        }
        {
            let mut guard = lock.write();
            *guard = 9;
        }
        assert_eq!(*lock.read(), 9);
    }

    #[test]
    fn test_readers_share() {
        let lock = SpinRwLock::new(1u32);
        let a = lock.read();
        let b = lock.read();
        assert_eq!(*a + *b, 2);
    }

    #[test]
    fn test_writer_excludes_readers() {
        // Writers keep the pair consistent; readers must never observe a
        // half-updated pair.
        let lock = Arc::new(SpinRwLock::new((0u64, 0u64)));
        let mut handles = Vec::new();

        for _ in 0..2 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..20_000 {
                    let mut guard = lock.write();
                    guard.0 += 1;
                    guard.1 += 1;
                }
            }));
        }
        for _ in 0..2 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..20_000 {
                    let guard = lock.read();
                    assert_eq!(guard.0, guard.1);
                }
            }));
        }

        for handle in handles {
            handle.join().expect("lock test thread panicked");
        }
        let guard = lock.read();
        assert_eq!(guard.0, 40_000);
    }
}
