// Copyright © 2021 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The containers a thread lives in while it isn't running.
//!
//! These are plain data structures; keeping the scheduler invariants
//! (every thread lives in exactly one of them, or is running) is up to the
//! [`Scheduler`](crate::scheduler::Scheduler).
//!
//! Everything is allocated up-front for [`MAX_THREADS`] entries: the
//! operations used from the preemption signal handler must not allocate.

use std::collections::VecDeque;

use hashbrown::HashSet;

use crate::threads::ThreadId;
use crate::MAX_THREADS;

#[derive(Debug)]
pub struct RunQueue {
    /// Threads that can run, in scheduling order.
    ready: VecDeque<ThreadId>,
    /// Threads that wait for an explicit `resume`.
    blocked: HashSet<ThreadId>,
    /// Sleeping threads with their remaining number of quanta, in the order
    /// they went to sleep.
    sleeping: Vec<(ThreadId, usize)>,
}

impl Default for RunQueue {
    fn default() -> Self {
        RunQueue::new()
    }
}

impl RunQueue {
    pub fn new() -> Self {
        RunQueue {
            ready: VecDeque::with_capacity(MAX_THREADS),
            blocked: HashSet::with_capacity(MAX_THREADS),
            sleeping: Vec::with_capacity(MAX_THREADS),
        }
    }

    /// Puts `tid` at the end of the ready queue.
    pub fn enqueue_ready(&mut self, tid: ThreadId) {
        debug_assert!(!self.ready.contains(&tid), "{} is already ready", tid);
        self.ready.push_back(tid);
    }

    /// Takes the next thread to run.
    pub fn dequeue_ready(&mut self) -> Option<ThreadId> {
        self.ready.pop_front()
    }

    /// Removes `tid` from the ready queue (wherever it is).
    ///
    /// This is O(n) but only happens when a ready thread gets blocked or
    /// terminated by someone else.
    pub fn remove_ready(&mut self, tid: ThreadId) {
        self.ready.retain(|&rtid| rtid != tid);
    }

    #[cfg(test)]
    pub fn is_ready(&self, tid: ThreadId) -> bool {
        self.ready.contains(&tid)
    }

    #[cfg(test)]
    pub fn ready(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.ready.iter().copied()
    }

    pub fn block(&mut self, tid: ThreadId) {
        self.blocked.insert(tid);
    }

    /// Clears the explicit block of `tid`, returns whether it was blocked.
    pub fn unblock(&mut self, tid: ThreadId) -> bool {
        self.blocked.remove(&tid)
    }

    #[cfg(test)]
    pub fn is_blocked(&self, tid: ThreadId) -> bool {
        self.blocked.contains(&tid)
    }

    /// Lets `tid` sleep for `quantums` (> 0) switches.
    pub fn sleep(&mut self, tid: ThreadId, quantums: usize) {
        debug_assert!(quantums > 0);
        debug_assert!(!self.is_sleeping(tid), "{} already sleeps", tid);
        self.sleeping.push((tid, quantums));
    }

    pub fn is_sleeping(&self, tid: ThreadId) -> bool {
        self.sleeping.iter().any(|&(stid, _)| stid == tid)
    }

    /// Remaining quanta `tid` sleeps for.
    #[cfg(test)]
    pub fn sleep_remaining(&self, tid: ThreadId) -> Option<usize> {
        self.sleeping
            .iter()
            .find(|&&(stid, _)| stid == tid)
            .map(|&(_, left)| left)
    }

    pub fn remove_sleeping(&mut self, tid: ThreadId) {
        self.sleeping.retain(|&(stid, _)| stid != tid);
    }

    /// Counts down all sleepers by one quantum.
    ///
    /// Sleepers that reach zero stop sleeping; unless they are also
    /// explicitly blocked they are appended to the ready queue (in the
    /// order they went to sleep) and handed to `on_wake`. Returns how many
    /// threads became ready.
    pub fn tick_sleepers<F: FnMut(ThreadId)>(&mut self, mut on_wake: F) -> usize {
        let mut woken = 0;
        let mut i = 0;
        while i < self.sleeping.len() {
            let (tid, left) = &mut self.sleeping[i];
            *left -= 1;
            if *left == 0 {
                let tid = *tid;
                self.sleeping.remove(i);
                if !self.blocked.contains(&tid) {
                    self.ready.push_back(tid);
                    on_wake(tid);
                    woken += 1;
                }
            } else {
                i += 1;
            }
        }
        woken
    }

    /// Removes `tid` from every container.
    pub fn remove(&mut self, tid: ThreadId) {
        self.remove_ready(tid);
        self.unblock(tid);
        self.remove_sleeping(tid);
    }

    /// Forgets about all threads.
    pub fn clear(&mut self) {
        self.ready.clear();
        self.blocked.clear();
        self.sleeping.clear();
    }
}
