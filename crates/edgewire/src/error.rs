// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for OS-primitive failures.

use std::io;
use thiserror::Error;

/// A failed OS primitive call, tagged with the syscall name.
#[derive(Debug, Error)]
#[error("{label} failed: {source}")]
pub struct SyscallError {
    /// Short syscall label (e.g. `"sem_init"`).
    pub label: &'static str,
    /// The captured errno.
    #[source]
    pub source: io::Error,
}

impl SyscallError {
    /// Capture `errno` for the named syscall.
    pub(crate) fn last(label: &'static str) -> Self {
        Self {
            label,
            source: io::Error::last_os_error(),
        }
    }

    pub(crate) fn new(label: &'static str, source: io::Error) -> Self {
        Self { label, source }
    }
}

/// Outcome of a timed wait: expired, or a real failure.
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("wait timed out")]
    Timeout,
    #[error(transparent)]
    Sys(#[from] SyscallError),
}
