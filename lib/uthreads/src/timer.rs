// Copyright © 2021 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Timer API
//!
//! The quantum is measured with the virtual interval timer: it only
//! advances while the process executes in user mode, so time spent
//! descheduled by the OS doesn't count against a thread.

use core::ptr;

use libc::{itimerval, suseconds_t, time_t, timeval};

use crate::error::system_error;

const USECS_PER_SEC: usize = 1_000_000;

#[derive(Clone, Copy)]
pub struct VirtualTimer {
    quantum_usecs: usize,
    interval: itimerval,
}

impl VirtualTimer {
    pub fn new(quantum_usecs: usize) -> VirtualTimer {
        debug_assert!(quantum_usecs > 0);
        let quantum = timeval {
            tv_sec: (quantum_usecs / USECS_PER_SEC) as time_t,
            tv_usec: (quantum_usecs % USECS_PER_SEC) as suseconds_t,
        };
        VirtualTimer {
            quantum_usecs,
            interval: itimerval {
                it_value: quantum,
                it_interval: quantum,
            },
        }
    }

    #[cfg(test)]
    pub fn quantum_usecs(&self) -> usize {
        self.quantum_usecs
    }

    /// (Re-)starts the timer: the next expiry is one full quantum from now,
    /// after that it keeps expiring every quantum.
    pub fn arm(&self) {
        self.set(&self.interval);
    }

    /// Stops the timer.
    pub fn disarm(&self) {
        let zero = timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        self.set(&itimerval {
            it_value: zero,
            it_interval: zero,
        });
    }

    fn set(&self, value: &itimerval) {
        if unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, value, ptr::null_mut()) } != 0 {
            system_error("setitimer failed");
        }
    }
}

impl core::fmt::Debug for VirtualTimer {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "VirtualTimer {{ quantum_usecs={} }}", self.quantum_usecs)
    }
}
