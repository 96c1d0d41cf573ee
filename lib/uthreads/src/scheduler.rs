// Copyright © 2021 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The core logic of the scheduler.
//!
//! Has the following properties:
//! * Exactly one thread runs at a time; all threads share one OS thread
//! * Round robin scheduling with a FIFO ready queue (no priorities)
//! * Threads leave the CPU when their quantum expires or when they block,
//!   sleep or terminate themselves
//! * Sleeping is measured in scheduler switches, not wall-clock time
//!
//! The [`Scheduler`] only does book-keeping. It decides which thread runs
//! next and hands out the contexts to switch between; masking the preemption
//! signal, re-arming the timer and the actual switch are done by the caller
//! (see `api`).

use log::trace;

use crate::context::Context;
use crate::error::{system_error, UthreadError};
use crate::registry::ThreadRegistry;
use crate::runqueue::RunQueue;
use crate::stack::ThreadStack;
use crate::threads::{Thread, ThreadEntry, ThreadId, ThreadState};

/// What happens to the running thread when it leaves the CPU.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Disposition {
    /// Its quantum expired, back to the end of the ready queue.
    Preempted,
    /// Wait until someone resumes it.
    Blocked,
    /// Wait for the given number of switches.
    Sleep(usize),
    /// Remove it for good.
    Terminated,
}

/// Outcome of a request to the scheduler.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Resolution {
    /// The request was completed, the caller keeps running.
    Completed,
    /// The caller has to switch away from the running thread.
    Switch(Disposition),
    /// The main thread was terminated, the process ends.
    Exit,
}

/// The pair of contexts to switch between.
///
/// Both point into boxed TCBs owned by the scheduler (or its zombie slot).
#[derive(Debug)]
pub(crate) struct SwitchTo {
    pub(crate) from: *mut Context,
    pub(crate) to: *const Context,
}

pub(crate) struct Scheduler {
    /// All threads (including the running one).
    threads: ThreadRegistry,
    /// Threads that are not running.
    runqueue: RunQueue,
    /// The thread currently on the CPU.
    running: ThreadId,
    /// Number of quanta since initialization.
    total_quantums: usize,
    /// A thread that terminated itself.
    ///
    /// It can't be freed while we still run on its stack so it stays here
    /// until the next explicit request.
    zombie: Option<Box<Thread>>,
}

impl Scheduler {
    /// Creates a scheduler where the caller is the main thread, running its
    /// first quantum.
    pub(crate) fn new() -> Self {
        let mut threads = ThreadRegistry::new();
        threads.register(Box::new(Thread::main()));
        Scheduler {
            threads,
            runqueue: RunQueue::new(),
            running: ThreadId::MAIN,
            total_quantums: 1,
            zombie: None,
        }
    }

    pub(crate) fn running(&self) -> ThreadId {
        self.running
    }

    pub(crate) fn total_quantums(&self) -> usize {
        self.total_quantums
    }

    pub(crate) fn quantums(&self, tid: ThreadId) -> Result<usize, UthreadError> {
        self.thread(tid).map(|t| t.quantums)
    }

    #[cfg(test)]
    pub(crate) fn state(&self, tid: ThreadId) -> Option<ThreadState> {
        self.threads.get(tid).map(|t| t.state)
    }

    pub(crate) fn entry(&self, tid: ThreadId) -> Option<ThreadEntry> {
        self.threads.get(tid).and_then(|t| t.entry)
    }

    #[cfg(test)]
    pub(crate) fn is_sleeping(&self, tid: ThreadId) -> bool {
        self.runqueue.is_sleeping(tid)
    }

    #[cfg(test)]
    pub(crate) fn is_blocked(&self, tid: ThreadId) -> bool {
        self.runqueue.is_blocked(tid)
    }

    /// Ids in the order they will run.
    #[cfg(test)]
    pub(crate) fn ready(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.runqueue.ready()
    }

    pub(crate) fn len(&self) -> usize {
        self.threads.len()
    }

    fn thread(&self, tid: ThreadId) -> Result<&Thread, UthreadError> {
        self.threads.get(tid).ok_or(UthreadError::NoSuchThread { tid })
    }

    fn thread_mut(&mut self, tid: ThreadId) -> Result<&mut Thread, UthreadError> {
        self.threads
            .get_mut(tid)
            .ok_or(UthreadError::NoSuchThread { tid })
    }

    /// Creates a thread that starts in `entry` and appends it to the ready
    /// queue.
    ///
    /// `start` is what the new context first returns into; it has to look
    /// up and run the entry of the running thread.
    pub(crate) fn spawn(
        &mut self,
        entry: Option<ThreadEntry>,
        start: extern "C" fn() -> !,
    ) -> Result<ThreadId, UthreadError> {
        let entry = entry.ok_or(UthreadError::NullEntryPoint)?;
        let tid = self.threads.allocate_id()?;

        let thread = Thread::new(tid, ThreadStack::default(), entry, start);
        self.threads.register(Box::new(thread));
        self.runqueue.enqueue_ready(tid);
        trace!("Spawned thread {}", tid);
        Ok(tid)
    }

    pub(crate) fn terminate(&mut self, tid: ThreadId) -> Result<Resolution, UthreadError> {
        self.thread(tid)?;
        if tid.is_main() {
            return Ok(Resolution::Exit);
        }
        if tid == self.running {
            return Ok(Resolution::Switch(Disposition::Terminated));
        }

        self.runqueue.remove(tid);
        let thread = self.threads.unregister(tid);
        trace!("Thread {:?} was terminated.", thread);
        Ok(Resolution::Completed)
    }

    pub(crate) fn block(&mut self, tid: ThreadId) -> Result<Resolution, UthreadError> {
        self.thread(tid)?;
        if tid.is_main() {
            return Err(UthreadError::BlockMainThread);
        }
        if tid == self.running {
            return Ok(Resolution::Switch(Disposition::Blocked));
        }

        let thread = self.thread_mut(tid)?;
        if thread.state == ThreadState::Ready {
            thread.state = ThreadState::Blocked;
            self.runqueue.remove_ready(tid);
        }
        // A sleeping thread is blocked already, it now also waits for a resume.
        self.runqueue.block(tid);
        Ok(Resolution::Completed)
    }

    /// Clears the explicit block of `tid`.
    ///
    /// A thread that also sleeps becomes ready only once its countdown
    /// expires.
    pub(crate) fn resume(&mut self, tid: ThreadId) -> Result<(), UthreadError> {
        let state = self.thread(tid)?.state;
        if state != ThreadState::Blocked {
            return Ok(());
        }

        self.runqueue.unblock(tid);
        if !self.runqueue.is_sleeping(tid) {
            self.thread_mut(tid)?.state = ThreadState::Ready;
            self.runqueue.enqueue_ready(tid);
        }
        Ok(())
    }

    pub(crate) fn sleep(&mut self, quantums: usize) -> Result<Resolution, UthreadError> {
        if self.running.is_main() {
            return Err(UthreadError::MainThreadSleep);
        }
        if quantums == 0 {
            return Err(UthreadError::InvalidSleepDuration);
        }
        Ok(Resolution::Switch(Disposition::Sleep(quantums)))
    }

    /// Takes the running thread off the CPU and picks its successor.
    ///
    /// Returns the contexts to switch between, or `None` if the running
    /// thread was picked again.
    ///
    /// Called from the preemption signal handler: must not allocate, free
    /// or log for `Disposition::Preempted`.
    pub(crate) fn switch(&mut self, disposition: Disposition) -> Option<SwitchTo> {
        let threads = &mut self.threads;
        self.runqueue.tick_sleepers(|tid| {
            if let Some(thread) = threads.get_mut(tid) {
                thread.state = ThreadState::Ready;
            }
        });
        self.total_quantums += 1;

        let prev = self.running;
        match disposition {
            Disposition::Preempted => {
                self.set_state(prev, ThreadState::Ready);
                self.runqueue.enqueue_ready(prev);
            }
            Disposition::Blocked => {
                self.set_state(prev, ThreadState::Blocked);
                self.runqueue.block(prev);
            }
            Disposition::Sleep(quantums) => {
                self.set_state(prev, ThreadState::Blocked);
                self.runqueue.sleep(prev, quantums);
            }
            Disposition::Terminated => {
                // Replaces (and frees) an older zombie, we're not on its stack.
                self.zombie = self.threads.unregister(prev);
            }
        }

        let next = match self.runqueue.dequeue_ready() {
            Some(tid) => tid,
            None => system_error("no thread is ready to run"),
        };
        self.running = next;
        let thread = match self.threads.get_mut(next) {
            Some(thread) => thread,
            None => system_error("ready thread does not exist"),
        };
        thread.state = ThreadState::Running;
        thread.quantums += 1;

        if next == prev {
            return None;
        }

        let from = if disposition == Disposition::Terminated {
            self.zombie.as_mut().map(|t| &mut t.context as *mut Context)
        } else {
            self.threads
                .get_mut(prev)
                .map(|t| &mut t.context as *mut Context)
        };
        let from = match from {
            Some(from) => from,
            None => system_error("outgoing thread has no context"),
        };
        let to = match self.threads.get(next) {
            Some(thread) => &thread.context as *const Context,
            None => system_error("incoming thread has no context"),
        };
        Some(SwitchTo { from, to })
    }

    fn set_state(&mut self, tid: ThreadId, state: ThreadState) {
        if let Some(thread) = self.threads.get_mut(tid) {
            thread.state = state;
        }
    }

    /// Frees the TCB of a thread that terminated itself.
    ///
    /// Only call this from an explicit request: it frees memory.
    pub(crate) fn reap(&mut self) {
        if let Some(zombie) = self.zombie.take() {
            trace!("Reaping {:?}", zombie);
        }
    }

    /// Frees all threads before the process exits.
    ///
    /// The running thread's TCB is leaked since its stack is still in use.
    pub(crate) fn release_all(&mut self) {
        self.runqueue.clear();
        self.zombie = None;
        let running = self.running;
        for thread in self.threads.drain() {
            if thread.id == running {
                core::mem::forget(thread);
            }
        }
    }

    /// Checks that every thread is in exactly one place.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        assert_eq!(self.state(self.running), Some(ThreadState::Running));
        assert!(!self.runqueue.is_ready(self.running));
        assert!(!self.runqueue.is_blocked(self.running));
        assert!(!self.runqueue.is_sleeping(self.running));
        assert!(!self.runqueue.is_blocked(ThreadId::MAIN));
        assert!(!self.runqueue.is_sleeping(ThreadId::MAIN));

        for tid in self.threads.ids() {
            let ready = self.runqueue.is_ready(tid);
            let waiting = self.runqueue.is_blocked(tid) || self.runqueue.is_sleeping(tid);
            let running = tid == self.running;
            assert_eq!(
                [ready, waiting, running].iter().filter(|&&b| b).count(),
                1,
                "Thread {} is in more or less than one place",
                tid
            );
            let expected = match (ready, waiting) {
                (true, _) => ThreadState::Ready,
                (_, true) => ThreadState::Blocked,
                _ => ThreadState::Running,
            };
            assert_eq!(self.state(tid), Some(expected));
        }
        for tid in self.runqueue.ready() {
            assert!(self.threads.contains(tid));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_THREADS;

    extern "C" fn never_started() -> ! {
        unreachable!("scheduler tests don't switch contexts")
    }

    fn noop() {}

    fn spawn(s: &mut Scheduler) -> ThreadId {
        let tid = s.spawn(Some(noop), never_started).unwrap();
        s.assert_invariants();
        tid
    }

    /// Runs a switch and checks the invariants afterwards.
    fn switch(s: &mut Scheduler, d: Disposition) -> ThreadId {
        s.switch(d);
        s.assert_invariants();
        s.running()
    }

    /// Runs a request and the switch it asks for (like the api does).
    fn request<F>(s: &mut Scheduler, f: F) -> ThreadId
    where
        F: FnOnce(&mut Scheduler) -> Result<Resolution, UthreadError>,
    {
        match f(s) {
            Ok(Resolution::Switch(d)) => switch(s, d),
            Ok(Resolution::Completed) => {
                s.assert_invariants();
                s.running()
            }
            other => panic!("Unexpected resolution {:?}", other),
        }
    }

    #[test]
    fn init_state() {
        let s = Scheduler::new();
        s.assert_invariants();
        assert_eq!(s.running(), ThreadId::MAIN);
        assert_eq!(s.total_quantums(), 1);
        assert_eq!(s.quantums(ThreadId::MAIN), Ok(1));
    }

    #[test]
    fn spawned_thread_runs_after_one_quantum() {
        let _r = env_logger::try_init();
        let mut s = Scheduler::new();
        let t1 = spawn(&mut s);
        assert_eq!(t1, ThreadId(1));
        assert_eq!(s.quantums(t1), Ok(0));
        assert_eq!(s.state(t1), Some(ThreadState::Ready));

        assert_eq!(switch(&mut s, Disposition::Preempted), t1);
        assert_eq!(s.quantums(t1), Ok(1));
        assert_eq!(s.total_quantums(), 2);
    }

    #[test]
    fn preempting_the_only_thread_keeps_it_running() {
        let mut s = Scheduler::new();
        assert!(s.switch(Disposition::Preempted).is_none());
        s.assert_invariants();
        assert_eq!(s.running(), ThreadId::MAIN);
        assert_eq!(s.total_quantums(), 2);
        assert_eq!(s.quantums(ThreadId::MAIN), Ok(2));
    }

    #[test]
    fn round_robin_is_fair() {
        let mut s = Scheduler::new();
        let spawned: Vec<ThreadId> = (0..4).map(|_| spawn(&mut s)).collect();

        let mut order = vec![ThreadId::MAIN];
        order.extend(spawned.iter().copied());
        for round in 0..3 {
            for (i, expected) in order.iter().cycle().skip(1).take(order.len()).enumerate() {
                assert_eq!(
                    switch(&mut s, Disposition::Preempted),
                    *expected,
                    "round {} switch {}",
                    round,
                    i
                );
            }
        }
        for tid in spawned {
            assert_eq!(s.quantums(tid), Ok(3));
        }
        assert_eq!(s.quantums(ThreadId::MAIN), Ok(4));
        assert_eq!(s.total_quantums(), 1 + 3 * 5);
    }

    #[test]
    fn switch_returns_contexts_of_both_threads() {
        let mut s = Scheduler::new();
        let t1 = spawn(&mut s);
        let to_expected: *const Context = &s.threads.get(t1).unwrap().context;
        let from_expected: *const Context = &s.threads.get(ThreadId::MAIN).unwrap().context;

        let sw = s.switch(Disposition::Preempted).unwrap();
        assert_eq!(sw.to, to_expected);
        assert_eq!(sw.from as *const Context, from_expected);
        let stack = s.threads.get(t1).unwrap().stack().unwrap();
        let sp = unsafe { (*sw.to).stack_pointer() };
        assert!(sp > stack.limit() as usize && sp < stack.base() as usize);
    }

    #[test]
    fn spawn_errors_leave_state_untouched() {
        let mut s = Scheduler::new();
        assert_eq!(
            s.spawn(None, never_started),
            Err(UthreadError::NullEntryPoint)
        );
        for _ in 1..MAX_THREADS {
            spawn(&mut s);
        }
        let ready_before: Vec<ThreadId> = s.ready().collect();
        assert_eq!(
            s.spawn(Some(noop), never_started),
            Err(UthreadError::TooManyThreads)
        );
        s.assert_invariants();
        assert_eq!(s.len(), MAX_THREADS);
        assert_eq!(s.ready().collect::<Vec<_>>(), ready_before);
    }

    #[test]
    fn terminated_ids_are_reused() {
        let mut s = Scheduler::new();
        let t1 = spawn(&mut s);
        let t2 = spawn(&mut s);
        assert_eq!(request(&mut s, |s| s.terminate(t1)), ThreadId::MAIN);
        assert_eq!(s.quantums(t1), Err(UthreadError::NoSuchThread { tid: t1 }));
        assert_eq!(spawn(&mut s), t1);
        assert_eq!(s.ready().collect::<Vec<_>>(), vec![t2, t1]);
    }

    #[test]
    fn terminate_running_switches_to_front_of_queue() {
        let mut s = Scheduler::new();
        let t1 = spawn(&mut s);
        let t2 = spawn(&mut s);
        assert_eq!(switch(&mut s, Disposition::Preempted), t1);

        assert_eq!(
            s.terminate(t1),
            Ok(Resolution::Switch(Disposition::Terminated))
        );
        let sw = s.switch(Disposition::Terminated).unwrap();
        s.assert_invariants();
        assert_eq!(s.running(), t2);
        // The outgoing context lives on in the zombie until it's reaped.
        assert_eq!(
            sw.from as *const Context,
            &s.zombie.as_ref().unwrap().context as *const Context
        );
        assert!(!s.threads.contains(t1));
        s.reap();
        assert!(s.zombie.is_none());
        assert_eq!(s.ready().collect::<Vec<_>>(), vec![ThreadId::MAIN]);
    }

    #[test]
    fn terminate_checks() {
        let mut s = Scheduler::new();
        assert_eq!(
            s.terminate(ThreadId(5)),
            Err(UthreadError::NoSuchThread { tid: ThreadId(5) })
        );
        assert_eq!(s.terminate(ThreadId::MAIN), Ok(Resolution::Exit));
        s.assert_invariants();
    }

    #[test]
    fn terminate_blocked_and_sleeping_threads() {
        let mut s = Scheduler::new();
        let t1 = spawn(&mut s);
        let t2 = spawn(&mut s);
        assert_eq!(request(&mut s, |s| s.block(t1)), ThreadId::MAIN);
        assert_eq!(switch(&mut s, Disposition::Preempted), t2);
        assert_eq!(request(&mut s, |s| s.sleep(5)), ThreadId::MAIN);

        assert_eq!(s.terminate(t1), Ok(Resolution::Completed));
        assert_eq!(s.terminate(t2), Ok(Resolution::Completed));
        s.assert_invariants();
        assert!(!s.is_blocked(t1));
        assert!(!s.is_sleeping(t2));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn block_checks() {
        let mut s = Scheduler::new();
        assert_eq!(s.block(ThreadId::MAIN), Err(UthreadError::BlockMainThread));
        assert_eq!(
            s.block(ThreadId(3)),
            Err(UthreadError::NoSuchThread { tid: ThreadId(3) })
        );
        let t1 = spawn(&mut s);
        assert_eq!(s.block(t1), Ok(Resolution::Completed));
        assert_eq!(s.block(t1), Ok(Resolution::Completed));
        s.assert_invariants();
        assert_eq!(s.state(t1), Some(ThreadState::Blocked));
    }

    #[test]
    fn blocked_thread_is_skipped_until_resumed() {
        let mut s = Scheduler::new();
        let t1 = spawn(&mut s);
        let t2 = spawn(&mut s);
        let t3 = spawn(&mut s);

        // t1 blocks itself.
        assert_eq!(switch(&mut s, Disposition::Preempted), t1);
        assert_eq!(request(&mut s, |s| s.block(t1)), t2);
        for _ in 0..10 {
            let running = switch(&mut s, Disposition::Preempted);
            assert_ne!(running, t1);
        }

        // Resume puts it at the end of the queue, regardless of how long it waited.
        let ready_before: Vec<ThreadId> = s.ready().collect();
        s.resume(t1).unwrap();
        s.assert_invariants();
        let mut expected = ready_before;
        expected.push(t1);
        assert_eq!(s.ready().collect::<Vec<_>>(), expected);
        assert!(expected.contains(&t3));
    }

    #[test]
    fn resume_is_noop_for_ready_and_running() {
        let mut s = Scheduler::new();
        let t1 = spawn(&mut s);
        s.resume(t1).unwrap();
        s.resume(ThreadId::MAIN).unwrap();
        s.assert_invariants();
        assert_eq!(s.ready().collect::<Vec<_>>(), vec![t1]);
        assert_eq!(
            s.resume(ThreadId(9)),
            Err(UthreadError::NoSuchThread { tid: ThreadId(9) })
        );
    }

    #[test]
    fn sleep_checks() {
        let mut s = Scheduler::new();
        assert_eq!(s.sleep(3), Err(UthreadError::MainThreadSleep));
        let t1 = spawn(&mut s);
        assert_eq!(switch(&mut s, Disposition::Preempted), t1);
        assert_eq!(s.sleep(0), Err(UthreadError::InvalidSleepDuration));
        assert_eq!(s.sleep(2), Ok(Resolution::Switch(Disposition::Sleep(2))));
        s.assert_invariants();
    }

    #[test]
    fn sleeper_wakes_after_exactly_n_switches() {
        let mut s = Scheduler::new();
        let t1 = spawn(&mut s);
        assert_eq!(switch(&mut s, Disposition::Preempted), t1);
        assert_eq!(request(&mut s, |s| s.sleep(3)), ThreadId::MAIN);
        let total = s.total_quantums();

        for i in 1..3 {
            assert_eq!(switch(&mut s, Disposition::Preempted), ThreadId::MAIN);
            assert_eq!(s.runqueue.sleep_remaining(t1), Some(3 - i));
        }
        // The third switch wakes it up before main goes back to the queue.
        assert_eq!(switch(&mut s, Disposition::Preempted), t1);
        assert!(!s.is_sleeping(t1));
        assert_eq!(s.ready().collect::<Vec<_>>(), vec![ThreadId::MAIN]);
        assert_eq!(s.total_quantums(), total + 3);
    }

    #[test]
    fn resume_of_blocked_sleeper_waits_for_countdown() {
        let mut s = Scheduler::new();
        let t1 = spawn(&mut s);
        assert_eq!(switch(&mut s, Disposition::Preempted), t1);
        assert_eq!(request(&mut s, |s| s.sleep(2)), ThreadId::MAIN);

        // Block it while it sleeps, then resume it right away.
        assert_eq!(s.block(t1), Ok(Resolution::Completed));
        assert!(s.is_blocked(t1) && s.is_sleeping(t1));
        s.resume(t1).unwrap();
        s.assert_invariants();
        assert!(!s.is_blocked(t1));
        assert_eq!(s.ready().count(), 0);

        assert_eq!(switch(&mut s, Disposition::Preempted), ThreadId::MAIN);
        assert_eq!(s.state(t1), Some(ThreadState::Blocked));
        assert_eq!(switch(&mut s, Disposition::Preempted), t1);
    }

    #[test]
    fn blocked_sleeper_needs_resume_after_countdown() {
        let mut s = Scheduler::new();
        let t1 = spawn(&mut s);
        assert_eq!(switch(&mut s, Disposition::Preempted), t1);
        assert_eq!(request(&mut s, |s| s.sleep(1)), ThreadId::MAIN);
        assert_eq!(s.block(t1), Ok(Resolution::Completed));

        for _ in 0..3 {
            assert_eq!(switch(&mut s, Disposition::Preempted), ThreadId::MAIN);
        }
        assert!(!s.is_sleeping(t1));
        assert!(s.is_blocked(t1));

        s.resume(t1).unwrap();
        assert_eq!(switch(&mut s, Disposition::Preempted), t1);
    }

    /// Main runs; `t1` woke from a one-quantum sleep and waits in the ready
    /// queue behind main, followed by `t2`.
    fn woken_sleeper_in_queue() -> (Scheduler, ThreadId, ThreadId) {
        let mut s = Scheduler::new();
        let t1 = spawn(&mut s);
        let t2 = spawn(&mut s);
        assert_eq!(switch(&mut s, Disposition::Preempted), t1);
        assert_eq!(request(&mut s, |s| s.sleep(1)), t2);
        assert_eq!(switch(&mut s, Disposition::Preempted), ThreadId::MAIN);
        assert!(!s.is_sleeping(t1));
        (s, t1, t2)
    }

    #[test]
    fn woken_sleeper_is_ready() {
        let (s, t1, t2) = woken_sleeper_in_queue();
        assert_eq!(s.state(t1), Some(ThreadState::Ready));
        assert_eq!(s.ready().collect::<Vec<_>>(), vec![t1, t2]);
    }

    #[test]
    fn block_woken_sleeper_takes_it_off_the_queue() {
        let (mut s, t1, t2) = woken_sleeper_in_queue();
        assert_eq!(request(&mut s, |s| s.block(t1)), ThreadId::MAIN);
        assert!(s.is_blocked(t1));
        assert_eq!(s.state(t1), Some(ThreadState::Blocked));
        assert_eq!(s.ready().collect::<Vec<_>>(), vec![t2]);

        assert_eq!(switch(&mut s, Disposition::Preempted), t2);
        assert_eq!(switch(&mut s, Disposition::Preempted), ThreadId::MAIN);

        s.resume(t1).unwrap();
        s.assert_invariants();
        assert_eq!(s.ready().collect::<Vec<_>>(), vec![t2, t1]);
    }

    #[test]
    fn resume_woken_sleeper_is_noop() {
        let (mut s, t1, t2) = woken_sleeper_in_queue();
        s.resume(t1).unwrap();
        s.assert_invariants();
        assert_eq!(s.ready().collect::<Vec<_>>(), vec![t1, t2]);
        assert_eq!(switch(&mut s, Disposition::Preempted), t1);
    }

    #[test]
    fn terminate_woken_sleeper() {
        let (mut s, t1, t2) = woken_sleeper_in_queue();
        assert_eq!(request(&mut s, |s| s.terminate(t1)), ThreadId::MAIN);
        assert_eq!(s.ready().collect::<Vec<_>>(), vec![t2]);
        assert_eq!(
            s.quantums(t1),
            Err(UthreadError::NoSuchThread { tid: t1 })
        );
        assert_eq!(switch(&mut s, Disposition::Preempted), t2);
    }

    #[test]
    fn release_all_empties_the_scheduler() {
        let mut s = Scheduler::new();
        spawn(&mut s);
        let t2 = spawn(&mut s);
        assert_eq!(switch(&mut s, Disposition::Preempted), ThreadId(1));
        assert_eq!(request(&mut s, |s| s.terminate(ThreadId(1))), t2);
        s.release_all();
        assert_eq!(s.len(), 0);
        assert!(s.zombie.is_none());
        assert_eq!(s.ready().count(), 0);
    }
}
