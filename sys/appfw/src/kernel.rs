// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interface to the underlying RTOS.
//!
//! The framework never touches threads, memory domains or object
//! permissions directly. It asks a `Kernel` to do so, which keeps the boot
//! logic testable on the host (see `sim`) and keeps the RTOS binding in one
//! place in the image.

use core::cell::UnsafeCell;

use abi::{AppId, ObjectRef, Priority};

use crate::descs::{EntryFn, Partition};

bitflags::bitflags! {
    /// Thread creation options, with the RTOS's bit assignments.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct ThreadOptions: u32 {
        /// Run the thread unprivileged, confined to its memory domain.
        const USER = 1 << 2;
        /// Give the thread every object permission its creator holds, and
        /// put it in its creator's memory domain.
        const INHERIT_PERMS = 1 << 3;
    }
}

/// Everything needed to create one thread.
#[derive(Copy, Clone, Debug)]
pub struct ThreadSpec {
    /// Control block to initialize. This becomes the thread's handle.
    pub thread: ObjectRef,
    pub stack: ObjectRef,
    pub stack_size: usize,
    pub entry: EntryFn,
    pub priority: Priority,
    pub options: ThreadOptions,
}

/// Thread calls a running application may make.
///
/// Every entry point is handed one of these. On hardware it is a thin
/// wrapper over the RTOS syscalls, and the kernel checks the caller's
/// permissions on every object it names.
pub trait Syscalls {
    /// Creates a thread without starting it, returning its handle.
    fn thread_create(&mut self, spec: &ThreadSpec) -> ObjectRef;

    /// Makes a created thread runnable.
    fn thread_start(&mut self, thread: ObjectRef);
}

/// Operations the framework needs from the RTOS.
///
/// Calls are made from the single bootstrap context, strictly in sequence.
pub trait Kernel: Syscalls {
    /// Allows `thread` to operate on `object`. Returns `false` if the kernel
    /// refused, e.g. because `object` is not a kernel object.
    fn object_access_grant(&mut self, object: ObjectRef, thread: ObjectRef)
        -> bool;

    /// Lets `thread` allocate from the kernel's system resource pool.
    fn thread_system_pool_assign(&mut self, thread: ObjectRef);

    /// Looks up a device instance by name.
    fn device_get_binding(&self, name: &str) -> Option<ObjectRef>;

    /// Initializes the empty memory domain belonging to `domain`.
    fn mem_domain_init(&mut self, domain: AppId);

    fn mem_domain_add_partition(&mut self, domain: AppId, part: &Partition);

    fn mem_domain_add_thread(&mut self, domain: AppId, thread: ObjectRef);
}

/// Statically allocated storage for a kernel object of `N` bytes, such as a
/// thread control block, semaphore or FIFO.
///
/// The storage is only ever handed to the kernel by address.
#[repr(C, align(8))]
pub struct KObject<const N: usize>(UnsafeCell<[u8; N]>);

// Safety: the framework never reads or writes the contents; the kernel
// serializes its own access.
unsafe impl<const N: usize> Sync for KObject<N> {}

impl<const N: usize> KObject<N> {
    pub const fn new() -> Self {
        Self(UnsafeCell::new([0; N]))
    }

    pub const fn size(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for KObject<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread stack of `N` bytes.
///
/// Placed on an 8-byte boundary as the procedure call standard requires; the
/// MPU granule is the image's concern.
pub type Stack<const N: usize> = KObject<N>;

#[cfg(test)]
mod tests {
    use super::*;

    static BLOCK: KObject<64> = KObject::new();
    static STACK: Stack<1024> = Stack::new();

    #[test]
    fn storage_is_distinct_and_aligned() {
        let b = ObjectRef::of(&BLOCK);
        let s = ObjectRef::of(&STACK);
        assert_ne!(b, s);
        assert_eq!(b.addr() % 8, 0);
        assert_eq!(s.addr() % 8, 0);
        assert_eq!(STACK.size(), 1024);
    }

    #[test]
    fn option_bits() {
        assert_eq!(ThreadOptions::USER.bits(), 4);
        assert_eq!(ThreadOptions::INHERIT_PERMS.bits(), 8);
    }
}
