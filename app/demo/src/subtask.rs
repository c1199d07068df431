// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An application whose main thread starts two workers.
//!
//! The workers are not known to the framework. Their control blocks and
//! stacks are declared in this slot's object list, so the main thread holds
//! permission on them and can start the workers with inherited permissions.
//! Both count into this slot's private partition.

use core::sync::atomic::{AtomicU32, Ordering};

use appfw::{
    spawn_sub_thread, AppDesc, AppMode, ObjectRef, Priority, SpawnError,
    Stack, SubThread, Syscalls,
};

use crate::ThreadBlock;

pub const ID: u8 = 7;

const STACK_SIZE: usize = 1024;
const WORKER_STACK_SIZE: usize = 4096;

/// Number of times each worker counts.
pub const ROUNDS: u32 = 6;

static THREAD: ThreadBlock = ThreadBlock::new();
static STACK: Stack<STACK_SIZE> = Stack::new();

static GIVER_THREAD: ThreadBlock = ThreadBlock::new();
static TAKER_THREAD: ThreadBlock = ThreadBlock::new();
static GIVER_STACK: Stack<WORKER_STACK_SIZE> = Stack::new();
static TAKER_STACK: Stack<WORKER_STACK_SIZE> = Stack::new();

static OBJECTS: [ObjectRef; 4] = [
    ObjectRef::of(&GIVER_THREAD),
    ObjectRef::of(&TAKER_THREAD),
    ObjectRef::of(&GIVER_STACK),
    ObjectRef::of(&TAKER_STACK),
];

pub static DESC: AppDesc = AppDesc::new(
    AppMode::APP.union(AppMode::PART_GLOBAL),
    main,
    ObjectRef::of(&THREAD),
    ObjectRef::of(&STACK),
    STACK_SIZE,
)
.with_objects(&OBJECTS);

static GIVEN: AtomicU32 = AtomicU32::new(0);
static TAKEN: AtomicU32 = AtomicU32::new(0);
static SPAWN_FAILED: AtomicU32 = AtomicU32::new(0);

fn main(sys: &mut dyn Syscalls) {
    crate::mark_started(ID);
    if start_workers(sys).is_err() {
        SPAWN_FAILED.fetch_add(1, Ordering::Relaxed);
    }
}

fn giver(_: &mut dyn Syscalls) {
    for _ in 0..ROUNDS {
        GIVEN.fetch_add(1, Ordering::Relaxed);
    }
}

fn taker(_: &mut dyn Syscalls) {
    for _ in 0..ROUNDS {
        TAKEN.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn workers() -> [SubThread; 2] {
    [
        SubThread {
            thread: ObjectRef::of(&GIVER_THREAD),
            stack: ObjectRef::of(&GIVER_STACK),
            stack_size: WORKER_STACK_SIZE,
            entry: giver,
            priority: Priority::preempt(10),
        },
        SubThread {
            thread: ObjectRef::of(&TAKER_THREAD),
            stack: ObjectRef::of(&TAKER_STACK),
            stack_size: WORKER_STACK_SIZE,
            entry: taker,
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

/// Counts made by each worker so far.
pub fn worker_counts() -> (u32, u32) {
    (GIVEN.load(Ordering::Relaxed), TAKEN.load(Ordering::Relaxed))
}

/// Times the main thread failed to start its workers.
pub fn spawn_failures() -> u32 {
    SPAWN_FAILED.load(Ordering::Relaxed)
}
