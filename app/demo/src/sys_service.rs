// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! System service.
//!
//! Fronts the power management controller and the host IPC link. Clients
//! reach it through one mailbox per link; the config hook hands each mailbox
//! to every slot whose resource entry lists the matching sys-service.

use appfw::{
    AppDesc, AppMode, ObjectRef, Stack, Supervisor, SysService, Syscalls,
};

use crate::{SyncObject, ThreadBlock};

pub const ID: u8 = 0;

const STACK_SIZE: usize = 1024;

static THREAD: ThreadBlock = ThreadBlock::new();
static STACK: Stack<STACK_SIZE> = Stack::new();

pub static PMC_MAILBOX: SyncObject = SyncObject::new();
pub static HOST_MAILBOX: SyncObject = SyncObject::new();

static PMC_OBJECTS: [ObjectRef; 1] = [ObjectRef::of(&PMC_MAILBOX)];
static HOST_OBJECTS: [ObjectRef; 1] = [ObjectRef::of(&HOST_MAILBOX)];

static OBJECTS: [ObjectRef; 2] =
    [ObjectRef::of(&PMC_MAILBOX), ObjectRef::of(&HOST_MAILBOX)];

pub static DESC: AppDesc = AppDesc::new(
    AppMode::SERVICE.union(AppMode::PART_GLOBAL),
    main,
    ObjectRef::of(&THREAD),
    ObjectRef::of(&STACK),
    STACK_SIZE,
)
.with_objects(&OBJECTS)
.with_config(config);

fn config(sup: &mut dyn Supervisor) {
    sup.grant_to_capable(SysService::PMC, &PMC_OBJECTS);
    sup.grant_to_capable(SysService::HOST, &HOST_OBJECTS);
}

fn main(_: &mut dyn Syscalls) {
    crate::mark_started(ID);
}
