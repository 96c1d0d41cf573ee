// Copyright © 2021 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A user-level thread library.
//!
//! Many logical threads are multiplexed onto the OS thread that calls
//! [`init`]. Threads switch either when they call into the library
//! ([`terminate`], [`block`], [`sleep`]) or when their quantum of virtual
//! CPU time expires (`SIGVTALRM`), in which case the next thread of the
//! round-robin ready queue runs.
//!
//! ```no_run
//! fn worker() {
//!     loop {
//!         // Preempted whenever the quantum expires.
//!     }
//! }
//!
//! uthreads::init(100_000).expect("init failed");
//! let tid = uthreads::spawn(Some(worker)).expect("spawn failed");
//! assert_eq!(uthreads::get_quantums(tid), Ok(0));
//! ```

#[cfg(not(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
)))]
compile_error!("uthreads supports Linux on x86_64 and aarch64 only");

mod api;
pub(crate) mod context;
pub mod error;
mod registry;
pub(crate) mod runqueue;
mod scheduler;
pub mod signals;
pub mod stack;
pub mod threads;
pub(crate) mod timer;

pub use api::{
    block, get_quantums, get_tid, get_total_quantums, init, resume, shutdown, sleep, spawn,
    terminate,
};
pub use error::UthreadError;
pub use threads::{ThreadEntry, ThreadId, ThreadState};

/// Maximal number of threads that can exist at the same time (including the
/// main thread).
pub const MAX_THREADS: usize = 100;

/// Size of the stack every spawned thread runs on.
pub const STACK_SIZE: usize = 32 * 4096;
