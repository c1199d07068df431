// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The smallest possible application: a main thread and nothing else.

use appfw::{AppDesc, AppMode, ObjectRef, Stack, Syscalls};

use crate::ThreadBlock;

pub const ID: u8 = 3;

const STACK_SIZE: usize = 1024;

static THREAD: ThreadBlock = ThreadBlock::new();
static STACK: Stack<STACK_SIZE> = Stack::new();

pub static DESC: AppDesc = AppDesc::new(
    AppMode::APP,
    main,
    ObjectRef::of(&THREAD),
    ObjectRef::of(&STACK),
    STACK_SIZE,
);

fn main(_: &mut dyn Syscalls) {
    crate::mark_started(ID);
}
