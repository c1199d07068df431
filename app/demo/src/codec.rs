// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Audio playback. Owns the DMA engine and the I2S port, both granted at
//! boot from the resource table, and talks to the PMC through the system
//! service's mailbox.

use appfw::{AppDesc, AppMode, ObjectRef, Stack, Syscalls};

use crate::ThreadBlock;

pub const ID: u8 = 8;

const STACK_SIZE: usize = 2048;

/// Devices this slot expects to have been granted.
pub const DEVICES: [&str; 2] = ["DMA_0", "I2S_0"];

static THREAD: ThreadBlock = ThreadBlock::new();
static STACK: Stack<STACK_SIZE> = Stack::new();

pub static DESC: AppDesc = AppDesc::new(
    AppMode::APP.union(AppMode::PART_GLOBAL),
    main,
    ObjectRef::of(&THREAD),
    ObjectRef::of(&STACK),
    STACK_SIZE,
);

fn main(_: &mut dyn Syscalls) {
    crate::mark_started(ID);
}
