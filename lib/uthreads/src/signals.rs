// Copyright © 2021 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The preemption signal.
//!
//! `SIGVTALRM` is the only asynchronous event that can interrupt the
//! library. Masking it for the OS thread that runs the green threads turns
//! every section of code into a critical section with respect to the
//! scheduler; this is the only synchronization scheduler state needs.

use core::mem::MaybeUninit;
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use libc::{c_int, sigset_t};

use crate::error::system_error;

/// The signal raised when a quantum expires.
pub const PREEMPTION_SIGNAL: c_int = libc::SIGVTALRM;

/// OS thread that runs the green threads (a `pthread_t`).
static OWNER: AtomicUsize = AtomicUsize::new(0);
static OWNER_SET: AtomicBool = AtomicBool::new(false);

fn preemption_set() -> sigset_t {
    unsafe {
        let mut set = MaybeUninit::<sigset_t>::zeroed();
        libc::sigemptyset(set.as_mut_ptr());
        libc::sigaddset(set.as_mut_ptr(), PREEMPTION_SIGNAL);
        set.assume_init()
    }
}

fn change_mask(how: c_int) -> sigset_t {
    let set = preemption_set();
    let mut old = MaybeUninit::<sigset_t>::zeroed();
    let r = unsafe { libc::pthread_sigmask(how, &set, old.as_mut_ptr()) };
    if r != 0 {
        system_error("failed to change the signal mask");
    }
    unsafe { old.assume_init() }
}

fn contains_preemption(set: &sigset_t) -> bool {
    unsafe { libc::sigismember(set, PREEMPTION_SIGNAL) == 1 }
}

/// Critical section with respect to the scheduler.
///
/// Masks the preemption signal while alive. On drop the signal becomes
/// deliverable again, unless it was already masked when the guard was
/// created. A thread that switches away inside a guard gets its own
/// deliverability back when it is resumed and the guard goes out of scope.
#[must_use]
#[derive(Debug)]
pub struct PreemptionGuard {
    was_masked: bool,
}

impl PreemptionGuard {
    pub fn new() -> PreemptionGuard {
        let old = change_mask(libc::SIG_BLOCK);
        PreemptionGuard {
            was_masked: contains_preemption(&old),
        }
    }
}

impl Drop for PreemptionGuard {
    fn drop(&mut self) {
        if !self.was_masked {
            unmask();
        }
    }
}

/// Makes the preemption signal deliverable.
pub fn unmask() {
    change_mask(libc::SIG_UNBLOCK);
}

/// Is the preemption signal currently masked for this OS thread?
#[cfg(test)]
pub(crate) fn is_masked() -> bool {
    let mut current = MaybeUninit::<sigset_t>::zeroed();
    let r = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, ptr::null(), current.as_mut_ptr()) };
    if r != 0 {
        system_error("failed to read the signal mask");
    }
    contains_preemption(unsafe { &current.assume_init() })
}

/// Installs `handler` for the preemption signal and returns the previous
/// disposition.
///
/// The handler runs with the preemption signal masked.
pub(crate) fn install_handler(handler: extern "C" fn(c_int)) -> libc::sigaction {
    unsafe {
        let mut sa: libc::sigaction = MaybeUninit::zeroed().assume_init();
        sa.sa_sigaction = handler as libc::sighandler_t;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut sa.sa_mask);

        let mut previous: libc::sigaction = MaybeUninit::zeroed().assume_init();
        if libc::sigaction(PREEMPTION_SIGNAL, &sa, &mut previous) < 0 {
            system_error("sigaction failed");
        }
        previous
    }
}

/// Puts back a disposition returned by [`install_handler`].
///
/// A signal that is still pending gets discarded first so it can't reach
/// the old disposition (for `SIGVTALRM` the default terminates the process).
pub(crate) fn restore_handler(previous: &libc::sigaction) {
    unsafe {
        let mut ignore: libc::sigaction = MaybeUninit::zeroed().assume_init();
        ignore.sa_sigaction = libc::SIG_IGN;
        libc::sigemptyset(&mut ignore.sa_mask);
        if libc::sigaction(PREEMPTION_SIGNAL, &ignore, ptr::null_mut()) < 0
            || libc::sigaction(PREEMPTION_SIGNAL, previous, ptr::null_mut()) < 0
        {
            system_error("sigaction failed");
        }
    }
}

/// Remembers the calling OS thread as the one that runs the green threads.
pub(crate) fn set_owner() {
    let me = unsafe { libc::pthread_self() };
    OWNER.store(me as usize, Ordering::SeqCst);
    OWNER_SET.store(true, Ordering::SeqCst);
}

/// Is the calling OS thread the one that runs the green threads?
pub(crate) fn on_owner_thread() -> bool {
    OWNER_SET.load(Ordering::SeqCst)
        && unsafe { libc::pthread_equal(libc::pthread_self(), OWNER.load(Ordering::SeqCst) as libc::pthread_t) != 0 }
}

/// The interval timer is per process, so the kernel may deliver its signal
/// to any OS thread that doesn't mask it. Hands it on to the owner.
pub(crate) fn forward_to_owner() {
    if OWNER_SET.load(Ordering::SeqCst) {
        unsafe {
            libc::pthread_kill(OWNER.load(Ordering::SeqCst) as libc::pthread_t, PREEMPTION_SIGNAL);
        }
    }
}
