// Copyright © 2021 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors of the thread library.
//!
//! There are two kinds of failures:
//! * Library errors ([`UthreadError`]): the caller passed bad input. They are
//!   logged, returned to the caller and leave the scheduler untouched.
//! * System errors ([`system_error`]): a primitive we depend on failed
//!   (allocation, signals, timers). The scheduler can't be trusted anymore
//!   so the process exits.

use std::process;

use custom_error::custom_error;

use crate::threads::ThreadId;

custom_error! {
    #[derive(PartialEq, Eq, Clone, Copy)]
    pub UthreadError
    InvalidQuantum = "quantum length must be positive",
    AlreadyInitialized = "the library is already initialized",
    NotInitialized = "the library is not initialized",
    NullEntryPoint = "thread cannot get a null entry point",
    TooManyThreads = "reached the maximal number of threads",
    NoSuchThread{tid: ThreadId} = "no thread with id {tid}",
    BlockMainThread = "main thread cannot be blocked",
    MainThreadSleep = "main thread cannot call sleep",
    InvalidSleepDuration = "number of quantums to sleep must be positive",
    ShutdownFromThread{tid: ThreadId} = "shutdown must be called by the main thread, not {tid}",
}

impl UthreadError {
    /// Logs the error, writes it to stderr and hands it back for returning
    /// to the caller.
    pub(crate) fn report(self) -> Self {
        log::error!("thread library error: {}", self);
        eprintln!("thread library error: {}", self);
        self
    }
}

/// Reports a failure of an underlying primitive and terminates the process.
pub(crate) fn system_error(msg: &str) -> ! {
    log::error!("system error: {}", msg);
    eprintln!("system error: {}", msg);
    process::exit(1);
}
