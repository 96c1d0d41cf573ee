// Copyright © 2021 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Context switch for AArch64 (AAPCS64).
//!
//! Saved frame, from the saved stack pointer upwards: `x19`-`x28`,
//! `x29` (frame pointer), `x30` (link register) and the lower halves of
//! `v8`-`v15`.

use core::arch::global_asm;
use core::ptr;

use super::Context;

/// Size of the saved frame.
const FRAME_SIZE: usize = 0xa0;

/// Offset of the saved link register within the frame.
const LR_OFFSET: usize = 0x58;

global_asm!(
    ".pushsection .text",
    ".global uthreads_switch_context",
    ".type uthreads_switch_context, %function",
    ".p2align 4",
    "uthreads_switch_context:",
    "sub sp, sp, #0xa0",
    "stp x19, x20, [sp, #0x00]",
    "stp x21, x22, [sp, #0x10]",
    "stp x23, x24, [sp, #0x20]",
    "stp x25, x26, [sp, #0x30]",
    "stp x27, x28, [sp, #0x40]",
    "stp x29, x30, [sp, #0x50]",
    "stp d8, d9, [sp, #0x60]",
    "stp d10, d11, [sp, #0x70]",
    "stp d12, d13, [sp, #0x80]",
    "stp d14, d15, [sp, #0x90]",
    "mov x9, sp",
    "str x9, [x0]",
    "ldr x9, [x1]",
    "mov sp, x9",
    "ldp x19, x20, [sp, #0x00]",
    "ldp x21, x22, [sp, #0x10]",
    "ldp x23, x24, [sp, #0x20]",
    "ldp x25, x26, [sp, #0x30]",
    "ldp x27, x28, [sp, #0x40]",
    "ldp x29, x30, [sp, #0x50]",
    "ldp d8, d9, [sp, #0x60]",
    "ldp d10, d11, [sp, #0x70]",
    "ldp d12, d13, [sp, #0x80]",
    "ldp d14, d15, [sp, #0x90]",
    "add sp, sp, #0xa0",
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

/// Writes an initial frame below `top` whose link register is `start`.
///
/// `start` is entered with `sp == top` and a null frame pointer.
///
/// # Safety
/// `top` must be 16-byte aligned with at least `FRAME_SIZE` writable bytes
/// below it.
pub(crate) unsafe fn init_frame(top: *mut u8, start: usize) -> *mut u8 {
    debug_assert_eq!(top as usize % 16, 0);
    let sp = top.sub(FRAME_SIZE);
    ptr::write_bytes(sp, 0, FRAME_SIZE);
    (sp.add(LR_OFFSET) as *mut usize).write(start);
    sp
}
