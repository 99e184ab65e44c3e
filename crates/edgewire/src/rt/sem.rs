// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Counting semaphore with blocking and timed waits.
//!
//! - On Linux: POSIX unnamed semaphore (`sem_t`), the cheapest kernel-backed
//!   counting primitive with a native timed wait.
//! - Elsewhere: mutex + condvar fallback with identical semantics.
//!
//! Timed waits distinguish expiry from real failure via [`WaitError`].

pub use platform::Semaphore;

// =============================================================================
// Linux implementation (POSIX sem_t)
// =============================================================================
#[cfg(target_os = "linux")]
mod platform {
    use crate::error::{SyscallError, WaitError};
    use std::cell::UnsafeCell;
    use std::io;
    use std::mem::MaybeUninit;
    use std::time::Duration;

    /// Counting semaphore over a POSIX unnamed semaphore.
    pub struct Semaphore {
        sem: UnsafeCell<libc::sem_t>,
    }

    // SAFETY: sem_t is designed for concurrent post/wait from any thread;
    // the UnsafeCell only hands its address to the semaphore syscalls.
    unsafe impl Send for Semaphore {}
    unsafe impl Sync for Semaphore {}

    impl Semaphore {
        /// Create a semaphore with an initial value of zero.
        pub fn new() -> Result<Self, SyscallError> {
            // SAFETY: zeroed storage is valid scratch for sem_init to
            // overwrite; pshared=0 keeps it process-private.
            let sem = UnsafeCell::new(unsafe { MaybeUninit::zeroed().assume_init() });
            let res = unsafe { libc::sem_init(sem.get(), 0, 0) };
            if res != 0 {
                return Err(SyscallError::last("sem_init"));
            }
            Ok(Self { sem })
        }

        /// Increment the semaphore, waking one waiter if any.
        pub fn post(&self) -> Result<(), SyscallError> {
            // SAFETY: self.sem was initialized by sem_init in new().
            let res = unsafe { libc::sem_post(self.sem.get()) };
            if res != 0 {
                return Err(SyscallError::last("sem_post"));
            }
            Ok(())
        }

        /// Block until the semaphore can be decremented.
        pub fn wait(&self) -> Result<(), SyscallError> {
            loop {
                // SAFETY: self.sem was initialized by sem_init in new().
                let res = unsafe { libc::sem_wait(self.sem.get()) };
                if res == 0 {
                    return Ok(());
                }
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(SyscallError::new("sem_wait", err));
            }
        }

        /// Block until decremented or `timeout` elapses.
        ///
        /// # Returns
        /// * `Ok(())` on a successful decrement.
        /// * `Err(WaitError::Timeout)` when the deadline passed.
        pub fn wait_timeout(&self, timeout: Duration) -> Result<(), WaitError> {
            let deadline = Self::realtime_deadline(timeout)?;
            loop {
                // SAFETY: self.sem was initialized by sem_init in new();
                // deadline points at a valid timespec on our stack.
                let res = unsafe { libc::sem_timedwait(self.sem.get(), &deadline) };
                if res == 0 {
                    return Ok(());
                }
                let err = io::Error::last_os_error();
                match err.raw_os_error() {
                    Some(libc::EINTR) => continue, // absolute deadline: just retry
                    Some(libc::ETIMEDOUT) => return Err(WaitError::Timeout),
                    _ => return Err(WaitError::Sys(SyscallError::new("sem_timedwait", err))),
                }
            }
        }

        /// Current value (best effort; racy by nature).
        pub fn value(&self) -> Result<i32, SyscallError> {
            let mut value: libc::c_int = 0;
            // SAFETY: self.sem was initialized by sem_init in new(); value
            // is a valid out-pointer.
            let res = unsafe { libc::sem_getvalue(self.sem.get(), &mut value) };
            if res != 0 {
                return Err(SyscallError::last("sem_getvalue"));
            }
            Ok(value)
        }

        /// sem_timedwait takes an absolute CLOCK_REALTIME timespec.
        fn realtime_deadline(timeout: Duration) -> Result<libc::timespec, SyscallError> {
            let mut now = libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            };
            // SAFETY: now is a valid out-pointer for clock_gettime.
            let res = unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) };
            if res != 0 {
                return Err(SyscallError::last("clock_gettime"));
            }

            let secs = libc::time_t::try_from(timeout.as_secs()).unwrap_or(libc::time_t::MAX);
            now.tv_sec = now.tv_sec.saturating_add(secs);
            now.tv_nsec += libc::c_long::from(timeout.subsec_nanos() as i32);
            if now.tv_nsec >= 1_000_000_000 {
                now.tv_sec = now.tv_sec.saturating_add(1);
                now.tv_nsec -= 1_000_000_000;
            }
            Ok(now)
        }
    }

    impl Drop for Semaphore {
        fn drop(&mut self) {
            // SAFETY: initialized in new(), destroyed exactly once here.
            unsafe {
                libc::sem_destroy(self.sem.get());
            }
        }
    }
}

// =============================================================================
// Portable fallback (mutex + condvar)
// =============================================================================
#[cfg(not(target_os = "linux"))]
mod platform {
    use crate::error::{SyscallError, WaitError};
    use parking_lot::{Condvar, Mutex};
    use std::time::{Duration, Instant};

    /// Counting semaphore over a mutex + condvar pair.
    pub struct Semaphore {
        count: Mutex<i32>,
        cond: Condvar,
    }

    impl Semaphore {
        pub fn new() -> Result<Self, SyscallError> {
            Ok(Self {
                count: Mutex::new(0),
                cond: Condvar::new(),
            })
        }

        pub fn post(&self) -> Result<(), SyscallError> {
            let mut count = self.count.lock();
            *count += 1;
            self.cond.notify_one();
            Ok(())
        }

        pub fn wait(&self) -> Result<(), SyscallError> {
            let mut count = self.count.lock();
            while *count <= 0 {
                self.cond.wait(&mut count);
            }
            *count -= 1;
            Ok(())
        }

        pub fn wait_timeout(&self, timeout: Duration) -> Result<(), WaitError> {
            let deadline = Instant::now() + timeout;
            let mut count = self.count.lock();
            while *count <= 0 {
                if self.cond.wait_until(&mut count, deadline).timed_out() && *count <= 0 {
                    return Err(WaitError::Timeout);
                }
            }
            *count -= 1;
            Ok(())
        }

        pub fn value(&self) -> Result<i32, SyscallError> {
            Ok(*self.count.lock())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WaitError;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_post_then_wait() {
        let sem = Semaphore::new().expect("sem_init");
        sem.post().expect("post");
        sem.post().expect("post");
        assert!(sem.value().expect("value") >= 2);
        sem.wait().expect("wait");
        sem.wait().expect("wait");
        assert_eq!(sem.value().expect("value"), 0);
    }

    #[test]
    fn test_timed_wait_expires() {
        let sem = Semaphore::new().expect("sem_init");
        let start = Instant::now();
        let res = sem.wait_timeout(Duration::from_millis(20));
        assert!(matches!(res, Err(WaitError::Timeout)));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_timed_wait_consumes_pending_post() {
        let sem = Semaphore::new().expect("sem_init");
        sem.post().expect("post");
        sem.wait_timeout(Duration::from_millis(100))
            .expect("pending post should satisfy the wait");
    }

    #[test]
    fn test_post_wakes_blocked_waiter() {
        let sem = Arc::new(Semaphore::new().expect("sem_init"));
        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.wait())
        };
        thread::sleep(Duration::from_millis(10));
        sem.post().expect("post");
        waiter
            .join()
            .expect("waiter thread panicked")
            .expect("wait");
    }
}
