// Copyright © 2021 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Saving and restoring execution contexts.
//!
//! A context is just the stack pointer of a suspended thread: `switch`
//! pushes the callee-saved registers (and the floating point control state)
//! on the current stack, stores the stack pointer into the outgoing
//! [`Context`], loads the stack pointer of the incoming one, pops its
//! registers and returns into it.
//!
//! A fresh context is seeded by writing the same frame by hand on top of a
//! new stack, with the return address pointing to the thread start routine.
//!
//! The signal mask is not part of a context. Every suspended thread is
//! suspended inside a `PreemptionGuard` which restores the mask once the
//! thread runs again (see `signals`).

use crate::stack::ThreadStack;

#[cfg(target_arch = "x86_64")]
pub mod x86_64;
#[cfg(target_arch = "x86_64")]
pub use crate::context::x86_64 as arch;

#[cfg(target_arch = "aarch64")]
pub mod aarch64;
#[cfg(target_arch = "aarch64")]
pub use crate::context::aarch64 as arch;

/// The saved resumption point of a thread that is not running.
#[repr(C)]
#[derive(Debug, Default)]
pub struct Context {
    /// Stack pointer pointing at the saved register frame.
    sp: usize,
}

impl Context {
    /// Seeds a context that starts executing `start` on top of `stack`.
    ///
    /// `start` runs with an empty stack and must never return.
    pub fn new(stack: &ThreadStack, start: extern "C" fn() -> !) -> Context {
        let sp = unsafe { arch::init_frame(stack.base(), start as usize) };
        Context { sp: sp as usize }
    }

    /// The saved stack pointer (zero if the context was never captured or
    /// seeded).
    #[cfg(test)]
    pub fn stack_pointer(&self) -> usize {
        self.sp
    }
}

/// Captures the current execution into `from` and resumes `to`.
///
/// Returns once some other thread switches back to `from`.
///
/// # Safety
/// * `to` must have been seeded by [`Context::new`] or captured by an
///   earlier `switch`, and its stack must still be alive.
/// * `from` must stay valid until it is resumed (or never used again).
/// * Nothing may hold a reference to either context during the switch.
#[inline(never)]
pub unsafe fn switch(from: *mut Context, to: *const Context) {
    arch::switch_context(from, to);
}
