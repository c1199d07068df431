// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Demo image.
//!
//! Five slots, declared against the framework:
//!
//! | id | slot          | role        | notes                              |
//! |----|---------------|-------------|------------------------------------|
//! | 0  | `sys_service` | service     | PMC/host mailboxes, config hook    |
//! | 3  | `hello`       | application | nothing but a main thread          |
//! | 5  | `ipc`         | service     | two workers, shared partition      |
//! | 7  | `subtask`     | application | two workers, private partition     |
//! | 8  | `codec`       | application | DMA and I2S devices                |
//!
//! Priorities, capabilities and devices come from `app.toml`.

#![cfg_attr(not(test), no_std)]

use core::sync::atomic::{AtomicUsize, Ordering};

use appfw::{
    AppDesc, BootLog, BootProfile, BootReport, KObject, Kernel, Partition,
    SystemRegistry, MAX_APPS,
};

pub mod codec;
pub mod hello;
pub mod ipc;
pub mod subtask;
pub mod sys_service;

include!(concat!(env!("OUT_DIR"), "/resource_table.rs"));

/// Storage for a thread control block.
pub type ThreadBlock = KObject<256>;
/// Storage for a mailbox.
pub type SyncObject = KObject<32>;

/// Every slot the image defines.
pub static APPS: [(u8, &AppDesc); 5] = [
    (sys_service::ID, &sys_service::DESC),
    (hello::ID, &hello::DESC),
    (ipc::ID, &ipc::DESC),
    (subtask::ID, &subtask::DESC),
    (codec::ID, &codec::DESC),
];

// Placeholder layout. On hardware these come from the linker script.
const RUNTIME_BASE: usize = 0x6000_0000;
const RUNTIME_SIZE: usize = 0x4000;
const PRIVATE_BASE: usize = 0x6001_0000;
const PRIVATE_SIZE: usize = 0x1000;
const SHARED_BASE: usize = 0x6002_0000;
const SHARED_SIZE: usize = 0x1000;

/// Builds the image's registry.
pub fn registry(log: &mut BootLog) -> SystemRegistry {
    let mut registry = SystemRegistry::new(
        Partition::new(RUNTIME_BASE, RUNTIME_SIZE),
        core::array::from_fn(|i| {
            Partition::new(PRIVATE_BASE + i * PRIVATE_SIZE, PRIVATE_SIZE)
        }),
        Partition::new(SHARED_BASE, SHARED_SIZE),
    );
    let descs = APPS.map(|(id, desc)| (id, *desc));
    registry.populate(&descs, &RESOURCE_TABLE, log);
    registry
}

/// Builds the registry and boots it.
pub fn start<K: Kernel>(
    kernel: &mut K,
    log: &mut BootLog,
) -> (SystemRegistry, BootReport) {
    let mut registry = registry(log);
    let report =
        appfw::boot(&mut registry, kernel, BootProfile::default(), log);
    (registry, report)
}

#[allow(clippy::declare_interior_mutable_const)]
const NOT_STARTED: AtomicUsize = AtomicUsize::new(0);

static NEXT_START: AtomicUsize = AtomicUsize::new(1);
static STARTED: [AtomicUsize; MAX_APPS] = [NOT_STARTED; MAX_APPS];

/// Called first thing by each slot's main thread.
pub(crate) fn mark_started(id: u8) {
    if let Some(slot) = STARTED.get(id as usize) {
        let n = NEXT_START.fetch_add(1, Ordering::Relaxed);
        slot.store(n, Ordering::Relaxed);
    }
}

/// Position, counting from 1, at which slot `id`'s main thread first ran.
pub fn start_position(id: u8) -> Option<usize> {
    match STARTED.get(id as usize)?.load(Ordering::Relaxed) {
        0 => None,
        n => Some(n),
    }
}
