// Copyright © 2021 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The library interface.
//!
//! There is one scheduler per process. It lives in [`UTHREADS`] and may only
//! be touched with the preemption signal masked: every entry point first
//! creates a [`PreemptionGuard`], then takes the lock. The lock is therefore
//! never contended; it only hands out the `&mut` safely.
//!
//! Switching threads happens after the lock is released but before the
//! guard is dropped; the guard of the thread we switch to is dropped once
//! it continues.
//!
//! Logging allocates, so it only happens inside a guard as well.

use std::process;

use libc::c_int;
use log::{debug, trace};

use crate::context;
use crate::error::{system_error, UthreadError};
use crate::scheduler::{Disposition, Resolution, Scheduler};
use crate::signals::{self, PreemptionGuard};
use crate::threads::{ThreadEntry, ThreadId};
use crate::timer::VirtualTimer;

struct Uthreads {
    scheduler: Scheduler,
    timer: VirtualTimer,
    /// What was installed for the preemption signal before `init`.
    previous_action: libc::sigaction,
}

static UTHREADS: spin::Mutex<Option<Uthreads>> = spin::Mutex::new(None);

/// Runs `f` on the scheduler inside a critical section.
///
/// Frees the TCB of a thread that terminated itself earlier and logs
/// errors before handing them back.
fn with_scheduler<R, F>(f: F) -> Result<R, UthreadError>
where
    F: FnOnce(&mut Scheduler) -> Result<R, UthreadError>,
{
    let _guard = PreemptionGuard::new();
    let mut uthreads = UTHREADS.lock();
    let uthreads = uthreads
        .as_mut()
        .ok_or(UthreadError::NotInitialized)
        .map_err(UthreadError::report)?;
    uthreads.scheduler.reap();
    f(&mut uthreads.scheduler).map_err(UthreadError::report)
}

/// Like [`with_scheduler`] but carries out the switch `f` may ask for.
///
/// If the running thread blocks or sleeps this returns once it runs again;
/// if it terminates itself (or the main thread is terminated) it never
/// returns.
fn request<F>(f: F) -> Result<(), UthreadError>
where
    F: FnOnce(&mut Scheduler) -> Result<Resolution, UthreadError>,
{
    let _guard = PreemptionGuard::new();
    match with_scheduler(f)? {
        Resolution::Completed => {}
        Resolution::Switch(disposition) => {
            trace!("Thread {} leaves the CPU: {:?}", get_tid(), disposition);
            switch(disposition);
        }
        Resolution::Exit => exit_process(),
    }
    Ok(())
}

/// Takes the running thread off the CPU, hands it to the next ready thread
/// and restarts the quantum.
///
/// Must be called with the preemption signal masked.
fn switch(disposition: Disposition) {
    let next = {
        let mut uthreads = match UTHREADS.try_lock() {
            Some(uthreads) => uthreads,
            // Only the timer can find it locked, by interrupting another OS
            // thread that didn't mask the signal.
            None if disposition == Disposition::Preempted => return,
            None => system_error("scheduler state is locked during a switch"),
        };
        let uthreads = match uthreads.as_mut() {
            Some(uthreads) => uthreads,
            None => return,
        };
        let next = uthreads.scheduler.switch(disposition);
        uthreads.timer.arm();
        next
    };

    if let Some(next) = next {
        unsafe { context::switch(next.from, next.to) };
    }
}

/// Handler for the preemption signal.
///
/// Runs with the signal masked (by the kernel), on the stack of the
/// interrupted thread. Nothing in here allocates or logs.
extern "C" fn on_timer_fire(_signal: c_int) {
    if !signals::on_owner_thread() {
        signals::forward_to_owner();
        return;
    }
    let _guard = PreemptionGuard::new();
    switch(Disposition::Preempted);
}

/// Where every spawned thread starts out.
///
/// We got here through a switch, so the preemption signal is masked.
extern "C" fn thread_start() -> ! {
    let entry = {
        let uthreads = UTHREADS.lock();
        uthreads
            .as_ref()
            .and_then(|u| u.scheduler.entry(u.scheduler.running()))
    };
    signals::unmask();

    if let Some(entry) = entry {
        entry();
    }

    // Returning from the entry function ends the thread.
    let tid = get_tid();
    let _r = terminate(tid);
    system_error("terminated thread was resumed");
}

/// Ends the process after the main thread was terminated.
fn exit_process() -> ! {
    if let Some(mut uthreads) = UTHREADS.lock().take() {
        uthreads.timer.disarm();
        uthreads.scheduler.release_all();
        debug!("Main thread terminated, exiting.");
    }
    process::exit(0);
}

/// Initializes the library.
///
/// The caller becomes the main thread (id 0) and is running its first
/// quantum. `quantum_usecs` is the length of a quantum in microseconds of
/// virtual (process CPU) time.
pub fn init(quantum_usecs: usize) -> Result<(), UthreadError> {
    if quantum_usecs == 0 {
        return Err(UthreadError::InvalidQuantum.report());
    }

    let _guard = PreemptionGuard::new();
    let mut uthreads = UTHREADS.lock();
    if uthreads.is_some() {
        return Err(UthreadError::AlreadyInitialized.report());
    }

    signals::set_owner();
    let previous_action = signals::install_handler(on_timer_fire);
    let timer = VirtualTimer::new(quantum_usecs);
    timer.arm();
    *uthreads = Some(Uthreads {
        scheduler: Scheduler::new(),
        timer,
        previous_action,
    });
    debug!("Initialized with a quantum of {} usecs.", quantum_usecs);
    Ok(())
}

/// Creates a thread that starts running `entry` and puts it at the end of
/// the ready queue.
///
/// Returns the id of the new thread, the smallest one not in use.
pub fn spawn(entry: Option<ThreadEntry>) -> Result<ThreadId, UthreadError> {
    let _guard = PreemptionGuard::new();
    let tid = with_scheduler(|s| s.spawn(entry, thread_start))?;
    debug!("Spawned thread {}.", tid);
    Ok(tid)
}

/// Terminates thread `tid` and frees its resources.
///
/// * Terminating the calling thread does not return, the next ready thread
///   runs instead.
/// * Terminating the main thread (0) frees all threads and exits the
///   process.
pub fn terminate(tid: ThreadId) -> Result<(), UthreadError> {
    let _guard = PreemptionGuard::new();
    request(|s| s.terminate(tid))?;
    debug!("Terminated thread {}.", tid);
    Ok(())
}

/// Blocks thread `tid` until it is resumed.
///
/// A thread blocking itself switches to the next ready thread and returns
/// once resumed and scheduled again. Blocking a blocked thread does
/// nothing. The main thread can't be blocked.
pub fn block(tid: ThreadId) -> Result<(), UthreadError> {
    request(|s| s.block(tid))
}

/// Resumes a blocked thread by putting it at the end of the ready queue.
///
/// A thread that is also sleeping only has its block lifted and becomes
/// ready once the sleep ends. Resuming a ready or running thread does
/// nothing.
pub fn resume(tid: ThreadId) -> Result<(), UthreadError> {
    with_scheduler(|s| s.resume(tid))
}

/// Puts the calling thread to sleep for `num_quantums` scheduler switches.
///
/// The thread becomes ready again at the switch where the countdown hits
/// zero; the switch caused by this call doesn't count. The main thread
/// can't sleep.
pub fn sleep(num_quantums: usize) -> Result<(), UthreadError> {
    request(|s| s.sleep(num_quantums))
}

/// The id of the calling thread (0 before `init`).
pub fn get_tid() -> ThreadId {
    let _guard = PreemptionGuard::new();
    let uthreads = UTHREADS.lock();
    uthreads
        .as_ref()
        .map_or(ThreadId::MAIN, |u| u.scheduler.running())
}

/// Number of quanta since `init`, the current one included (0 before
/// `init`).
pub fn get_total_quantums() -> usize {
    let _guard = PreemptionGuard::new();
    let uthreads = UTHREADS.lock();
    uthreads.as_ref().map_or(0, |u| u.scheduler.total_quantums())
}

/// Number of quanta thread `tid` was running for, the current one included
/// if it is running.
pub fn get_quantums(tid: ThreadId) -> Result<usize, UthreadError> {
    with_scheduler(|s| s.quantums(tid))
}

/// Tears the library down: frees all threads except the main thread, stops
/// the timer and restores the previous signal disposition.
///
/// Only the main thread may call this. Afterwards `init` can be called
/// again.
pub fn shutdown() -> Result<(), UthreadError> {
    let _guard = PreemptionGuard::new();
    let mut uthreads = UTHREADS.lock();
    let running = uthreads
        .as_ref()
        .ok_or(UthreadError::NotInitialized)
        .map_err(UthreadError::report)?
        .scheduler
        .running();
    if !running.is_main() {
        return Err(UthreadError::ShutdownFromThread { tid: running }.report());
    }

    if let Some(u) = uthreads.take() {
        u.timer.disarm();
        signals::restore_handler(&u.previous_action);
        debug!(
            "Shut down after {} quantums, {} threads left.",
            u.scheduler.total_quantums(),
            u.scheduler.len()
        );
    }
    Ok(())
}
