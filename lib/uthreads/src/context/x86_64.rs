// Copyright © 2021 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Context switch for x86-64 (System V ABI).
//!
//! Saved frame, from the saved stack pointer upwards:
//!
//! ```text
//! sp + 0x00  mxcsr (u32), x87 control word (u16)
//! sp + 0x08  r15
//! sp + 0x10  r14
//! sp + 0x18  r13
//! sp + 0x20  r12
//! sp + 0x28  rbx
//! sp + 0x30  rbp
//! sp + 0x38  return address
//! ```

use core::arch::global_asm;
use core::ptr;

use super::Context;

/// Size of the saved frame, including the return address.
const FRAME_SIZE: usize = 0x40;

/// MXCSR after reset: all exceptions masked, round to nearest.
const DEFAULT_MXCSR: u32 = 0x1f80;

/// x87 control word after `fninit`.
const DEFAULT_FPU_CW: u16 = 0x037f;

global_asm!(
    ".pushsection .text",
    ".global uthreads_switch_context",
    ".type uthreads_switch_context, @function",
    ".p2align 4",
    "uthreads_switch_context:",
    "push rbp",
    "push rbx",
    "push r12",
    "push r13",
    "push r14",
    "push r15",
    "sub rsp, 8",
    "stmxcsr [rsp]",
    "fnstcw [rsp + 4]",
    "mov [rdi], rsp",
    "mov rsp, [rsi]",
    "ldmxcsr [rsp]",
    "fldcw [rsp + 4]",
    "add rsp, 8",
    "pop r15",
    "pop r14",
    "pop r13",
    "pop r12",
    "pop rbx",
    "pop rbp",
    "ret",
    ".size uthreads_switch_context, . - uthreads_switch_context",
    ".popsection",
);

extern "C" {
    fn uthreads_switch_context(from: *mut Context, to: *const Context);
}

#[inline(always)]
pub(crate) unsafe fn switch_context(from: *mut Context, to: *const Context) {
    uthreads_switch_context(from, to);
}

/// Writes an initial frame below `top` that returns into `start`.
///
/// `start` is entered with `rsp + 8` aligned to 16 bytes, exactly as if it
/// had been called. The slot above the return address is a null return
/// address so that backtraces end there.
///
/// # Safety
/// `top` must be 16-byte aligned with at least `FRAME_SIZE + 8` writable
/// bytes below it.
pub(crate) unsafe fn init_frame(top: *mut u8, start: usize) -> *mut u8 {
    debug_assert_eq!(top as usize % 16, 0);
    let top = top as *mut usize;
    top.sub(1).write(0);

    let sp = (top.sub(1) as *mut u8).sub(FRAME_SIZE);
    ptr::write_bytes(sp, 0, FRAME_SIZE);
    (sp as *mut u32).write(DEFAULT_MXCSR);
    (sp.add(4) as *mut u16).write(DEFAULT_FPU_CW);
    (sp.add(0x38) as *mut usize).write(start);
    sp
}
