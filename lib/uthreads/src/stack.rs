// Copyright © 2021 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::alloc::{alloc, dealloc, Layout};

use crate::error::system_error;

/// Alignment of stack tops on all supported architectures.
pub const STACK_ALIGNMENT: usize = 16;

/// ThreadStack holds a non-guarded, heap-allocated stack.
#[derive(Debug, PartialEq)]
pub struct ThreadStack {
    base_ptr: *mut u8,
    layout: Layout,
}

// The buffer is exclusively owned; only raw pointers into it are handed out.
unsafe impl Send for ThreadStack {}

impl Default for ThreadStack {
    fn default() -> Self {
        ThreadStack::from_size(crate::STACK_SIZE)
    }
}

impl ThreadStack {
    /// Allocates a new stack with `size` accessible bytes (rounded down to
    /// [`STACK_ALIGNMENT`]) using the default Rust allocator.
    ///
    /// Running out of memory here is a system error and ends the process.
    pub fn from_size(size: usize) -> ThreadStack {
        let aligned_size = size & !(STACK_ALIGNMENT - 1);
        if aligned_size == 0 {
            system_error("stack size too small");
        }
        let layout = match Layout::from_size_align(aligned_size, STACK_ALIGNMENT) {
            Ok(layout) => layout,
            Err(_) => system_error("invalid stack layout"),
        };

        let base_ptr = unsafe { alloc(layout) };
        if base_ptr.is_null() {
            system_error("memory allocation failed for thread stack");
        }

        ThreadStack { base_ptr, layout }
    }

    /// One past the highest usable address, where the stack starts (it grows
    /// downwards). Always aligned to [`STACK_ALIGNMENT`].
    #[inline(always)]
    pub fn base(&self) -> *mut u8 {
        // The allocation cannot wrap around the address space.
        unsafe { self.limit().add(self.layout.size()) }
    }

    /// The lowest usable address.
    #[inline(always)]
    pub fn limit(&self) -> *mut u8 {
        self.base_ptr
    }

    pub fn size(&self) -> usize {
        self.layout.size()
    }
}

impl Drop for ThreadStack {
    fn drop(&mut self) {
        unsafe { dealloc(self.base_ptr, self.layout) }
    }
}
