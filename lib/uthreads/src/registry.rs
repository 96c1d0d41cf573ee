// Copyright © 2021 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Maps thread ids to their control blocks.
//!
//! The registry is an arena of [`MAX_THREADS`] slots indexed by the thread
//! id; a free slot is a free id. Ids are handed out smallest first so they
//! get reused as soon as a thread is gone.

use crate::error::UthreadError;
use crate::threads::{Thread, ThreadId};
use crate::MAX_THREADS;

pub(crate) struct ThreadRegistry {
    /// TCBs are boxed so their contexts don't move while we
    /// switch from/to them.
    slots: Vec<Option<Box<Thread>>>,
}

impl ThreadRegistry {
    pub(crate) fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_THREADS);
        slots.resize_with(MAX_THREADS, || None);
        ThreadRegistry { slots }
    }

    /// Finds the smallest id that's not in use; the main thread's id is
    /// never handed out.
    pub(crate) fn allocate_id(&self) -> Result<ThreadId, UthreadError> {
        self.slots
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, slot)| slot.is_none())
            .map(|(id, _)| ThreadId(id))
            .ok_or(UthreadError::TooManyThreads)
    }

    /// Adds `thread` under its id, which must be free.
    pub(crate) fn register(&mut self, thread: Box<Thread>) {
        let slot = &mut self.slots[thread.id.0];
        assert!(slot.is_none(), "Thread {} already exists?", thread.id);
        *slot = Some(thread);
    }

    /// Removes the thread, this releases its id.
    pub(crate) fn unregister(&mut self, tid: ThreadId) -> Option<Box<Thread>> {
        self.slots.get_mut(tid.0).and_then(Option::take)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, tid: ThreadId) -> bool {
        self.get(tid).is_some()
    }

    pub(crate) fn get(&self, tid: ThreadId) -> Option<&Thread> {
        self.slots.get(tid.0).and_then(|slot| slot.as_deref())
    }

    pub(crate) fn get_mut(&mut self, tid: ThreadId) -> Option<&mut Thread> {
        self.slots.get_mut(tid.0).and_then(|slot| slot.as_deref_mut())
    }

    /// Number of live threads.
    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Ids of all live threads in ascending order.
    #[cfg(test)]
    pub(crate) fn ids(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(id, _)| ThreadId(id))
    }

    /// Removes all threads.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Box<Thread>> + '_ {
        self.slots.iter_mut().filter_map(Option::take)
    }
}
