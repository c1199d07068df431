// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inter-service communication.
//!
//! This service keeps its main thread short, as services run cooperatively:
//! it only starts a producer and a consumer worker and returns. Its domain
//! includes the shared partition, where the message counters live, so other
//! services that opt in can read them.

use core::sync::atomic::{AtomicU32, Ordering};

use appfw::{
    spawn_sub_thread, AppDesc, AppMode, ObjectRef, Priority, SpawnError,
    Stack, SubThread, Syscalls,
};

use crate::ThreadBlock;

pub const ID: u8 = 5;

const STACK_SIZE: usize = 1024;
const WORKER_STACK_SIZE: usize = 1024;

static THREAD: ThreadBlock = ThreadBlock::new();
static STACK: Stack<STACK_SIZE> = Stack::new();

static PRODUCER_THREAD: ThreadBlock = ThreadBlock::new();
static CONSUMER_THREAD: ThreadBlock = ThreadBlock::new();
static PRODUCER_STACK: Stack<WORKER_STACK_SIZE> = Stack::new();
static CONSUMER_STACK: Stack<WORKER_STACK_SIZE> = Stack::new();

static OBJECTS: [ObjectRef; 4] = [
    ObjectRef::of(&PRODUCER_THREAD),
    ObjectRef::of(&CONSUMER_THREAD),
    ObjectRef::of(&PRODUCER_STACK),
    ObjectRef::of(&CONSUMER_STACK),
];

pub static DESC: AppDesc = AppDesc::new(
    AppMode::SERVICE.union(AppMode::PART_SHARED),
    main,
    ObjectRef::of(&THREAD),
    ObjectRef::of(&STACK),
    STACK_SIZE,
)
.with_objects(&OBJECTS);

/// Message counters. Placed in the shared partition on hardware.
pub static SENT: AtomicU32 = AtomicU32::new(0);
pub static RECEIVED: AtomicU32 = AtomicU32::new(0);
static SPAWN_FAILED: AtomicU32 = AtomicU32::new(0);

fn main(sys: &mut dyn Syscalls) {
    crate::mark_started(ID);
    if start_workers(sys).is_err() {
        SPAWN_FAILED.fetch_add(1, Ordering::Relaxed);
    }
}

fn producer(_: &mut dyn Syscalls) {
    SENT.fetch_add(1, Ordering::Relaxed);
}

fn consumer(_: &mut dyn Syscalls) {
    RECEIVED.fetch_add(1, Ordering::Relaxed);
}

pub fn workers() -> [SubThread; 2] {
    [
        SubThread {
            thread: ObjectRef::of(&PRODUCER_THREAD),
            stack: ObjectRef::of(&PRODUCER_STACK),
            stack_size: WORKER_STACK_SIZE,
            entry: producer,
            priority: Priority::preempt(10),
        },
        SubThread {
            thread: ObjectRef::of(&CONSUMER_THREAD),
            stack: ObjectRef::of(&CONSUMER_STACK),
            stack_size: WORKER_STACK_SIZE,
            entry: consumer,
            priority: Priority::preempt(12),
        },
    ]
}

/// Starts both workers. Runs on the main thread.
pub fn start_workers<K: Syscalls + ?Sized>(
    sys: &mut K,
) -> Result<(), SpawnError> {
    for worker in &workers() {
        spawn_sub_thread(sys, &DESC, worker)?;
    }
    Ok(())
}

/// Times the main thread failed to start its workers.
pub fn spawn_failures() -> u32 {
    SPAWN_FAILED.load(Ordering::Relaxed)
}
