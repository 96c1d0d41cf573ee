// Copyright © 2021 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The thread control block.

use core::fmt;
use core::hash::{Hash, Hasher};

use crate::context::Context;
use crate::stack::ThreadStack;

/// The function a spawned thread starts executing in.
pub type ThreadEntry = fn();

/// The id of a thread.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct ThreadId(pub usize);

impl ThreadId {
    /// The thread that called `init`.
    pub const MAIN: ThreadId = ThreadId(0);

    pub fn is_main(&self) -> bool {
        *self == ThreadId::MAIN
    }
}

impl Hash for ThreadId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduling state of a thread.
///
/// A sleeping thread is `Blocked`; whether it also waits for an explicit
/// resume is tracked by the run queue.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ThreadState {
    Ready,
    Running,
    Blocked,
}

pub(crate) struct Thread {
    pub(crate) id: ThreadId,
    pub(crate) state: ThreadState,
    /// Number of quanta this thread has been running for.
    pub(crate) quantums: usize,
    /// `None` for the main thread.
    pub(crate) entry: Option<ThreadEntry>,
    /// Saved resumption point while the thread is not running.
    pub(crate) context: Context,
    /// The stack the thread runs on; the main thread keeps running on
    /// the stack of whoever called `init`.
    ///
    /// Must outlive every use of `context`, which points into it.
    stack: Option<ThreadStack>,
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Thread#{} ({:?}, {} quantums, stack {:?})",
            self.id.0,
            self.state,
            self.quantums,
            self.stack().map(|s| s.size())
        )
    }
}

impl PartialEq for Thread {
    fn eq(&self, other: &Thread) -> bool {
        self.id.0 == other.id.0
    }
}

impl Eq for Thread {}

impl Hash for Thread {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Thread {
    /// The TCB of the thread that is already running when the library
    /// gets initialized.
    ///
    /// Its context is filled in the first time it gets switched out.
    pub(crate) fn main() -> Thread {
        Thread {
            id: ThreadId::MAIN,
            state: ThreadState::Running,
            quantums: 1,
            entry: None,
            context: Context::default(),
            stack: None,
        }
    }

    /// Creates a ready thread that will begin in `start` on its own `stack`
    /// the first time it is switched to; `start` looks up and calls `entry`.
    pub(crate) fn new(
        tid: ThreadId,
        stack: ThreadStack,
        entry: ThreadEntry,
        start: extern "C" fn() -> !,
    ) -> Thread {
        let context = Context::new(&stack, start);
        Thread {
            id: tid,
            state: ThreadState::Ready,
            quantums: 0,
            entry: Some(entry),
            context,
            stack: Some(stack),
        }
    }

    pub(crate) fn stack(&self) -> Option<&ThreadStack> {
        self.stack.as_ref()
    }
}
