// Copyright © 2021 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Helpers shared by the integration tests.
//!
//! The library is process-wide, so every test file holds a single test.
//! Green threads must not allocate or log while others may be preempted
//! (they could be interrupted inside the allocator), so the tests only
//! communicate through atomics.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Quantum used by the tests: 10ms of CPU time.
pub const QUANTUM_USECS: usize = 10_000;

/// Busy-waits (and thereby burns quanta) until `cond` holds.
///
/// Gives up after a generous wall-clock timeout so a broken scheduler fails
/// the test instead of hanging it.
pub fn spin_until<F: Fn() -> bool>(cond: F) {
    let start = Instant::now();
    while !cond() {
        assert!(
            start.elapsed() < Duration::from_secs(30),
            "condition not reached in time"
        );
        core::hint::spin_loop();
    }
}

/// Burns CPU until at least `n` more switches happened.
pub fn spin_switches(n: usize) {
    let target = uthreads::get_total_quantums() + n;
    spin_until(|| uthreads::get_total_quantums() >= target);
}

/// A fixed-size log of thread ids that green threads can append to without
/// allocating.
pub struct TidLog {
    entries: [AtomicUsize; 64],
    len: AtomicUsize,
}

impl TidLog {
    pub const fn new() -> Self {
        const EMPTY: AtomicUsize = AtomicUsize::new(usize::MAX);
        TidLog {
            entries: [EMPTY; 64],
            len: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, tid: uthreads::ThreadId) {
        let idx = self.len.fetch_add(1, Ordering::SeqCst);
        if idx < self.entries.len() {
            self.entries[idx].store(tid.0, Ordering::SeqCst);
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    pub fn get(&self, idx: usize) -> usize {
        self.entries[idx].load(Ordering::SeqCst)
    }
}
