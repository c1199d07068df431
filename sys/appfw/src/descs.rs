// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Descriptor types, used to statically define applications and the
//! resources they need.

use core::fmt;

use abi::{AppMode, DeviceName, ObjectRef, Priority, SysService, MAX_APPS};

use crate::kernel::Syscalls;
use crate::supervisor::Supervisor;

/// Main function of an application or service thread.
pub type EntryFn = fn(&mut dyn Syscalls);

/// Hardware configuration hook. Runs once, privileged, after every domain
/// has been built and before any thread is released.
pub type ConfigFn = fn(&mut dyn Supervisor);

/// Record describing one application or service slot.
///
/// A slot whose `entry` is `None` is a placeholder and is never booted; see
/// `AppDesc::EMPTY`.
#[derive(Copy, Clone)]
pub struct AppDesc {
    /// Boot role and partition selection.
    pub mode: AppMode,
    /// Kernel objects the domain's threads may operate on. Sub-threads the
    /// application spawns at runtime must appear here (both their control
    /// block and their stack), since they only inherit what the main thread
    /// was granted.
    pub objects: &'static [ObjectRef],
    /// Control block for the main thread. This is also the thread's handle.
    pub thread: ObjectRef,
    /// Stack for the main thread.
    pub stack: ObjectRef,
    /// Size of `stack`, in bytes.
    pub stack_size: usize,
    /// Main function of the slot, or `None` if the slot is unused.
    pub entry: Option<EntryFn>,
    /// Optional privileged configuration hook.
    pub config: Option<ConfigFn>,
    /// Run the main thread unprivileged. Cleared only for slots that must run
    /// in supervisor mode even in a user-mode build.
    pub user_task: bool,
}

impl AppDesc {
    /// Placeholder for a slot with nothing registered.
    pub const EMPTY: Self = Self {
        mode: AppMode::empty(),
        objects: &[],
        thread: ObjectRef::NULL,
        stack: ObjectRef::NULL,
        stack_size: 0,
        entry: None,
        config: None,
        user_task: true,
    };

    pub const fn new(
        mode: AppMode,
        entry: EntryFn,
        thread: ObjectRef,
        stack: ObjectRef,
        stack_size: usize,
    ) -> Self {
        Self {
            mode,
            thread,
            stack,
            stack_size,
            entry: Some(entry),
            ..Self::EMPTY
        }
    }

    pub const fn with_objects(self, objects: &'static [ObjectRef]) -> Self {
        Self { objects, ..self }
    }

    pub const fn with_config(self, config: ConfigFn) -> Self {
        Self {
            config: Some(config),
            ..self
        }
    }

    /// Marks the main thread as privileged.
    pub const fn privileged(self) -> Self {
        Self {
            user_task: false,
            ..self
        }
    }

    pub fn is_populated(&self) -> bool {
        self.entry.is_some()
    }

    /// Checks whether `object` was declared in this slot's object list.
    pub fn declares(&self, object: ObjectRef) -> bool {
        self.objects.contains(&object)
    }
}

impl fmt::Debug for AppDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppDesc")
            .field("mode", &self.mode)
            .field("objects", &self.objects)
            .field("thread", &self.thread)
            .field("stack", &self.stack)
            .field("stack_size", &self.stack_size)
            .field("entry", &self.entry.is_some())
            .field("config", &self.config.is_some())
            .field("user_task", &self.user_task)
            .finish()
    }
}

/// Boot-time resource requirements of one slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ResourceEntry {
    /// Main thread priority. Must lie in the band matching the slot's role.
    pub priority: Priority,
    /// System services the slot may call into.
    pub sys_service: SysService,
    /// Devices the slot's domain needs access to, by name.
    pub devices: &'static [DeviceName],
}

impl ResourceEntry {
    pub const fn new(priority: Priority) -> Self {
        Self {
            priority,
            sys_service: SysService::empty(),
            devices: &[],
        }
    }

    pub const fn with_sys_service(self, sys_service: SysService) -> Self {
        Self {
            sys_service,
            ..self
        }
    }

    pub const fn with_devices(self, devices: &'static [DeviceName]) -> Self {
        Self { devices, ..self }
    }
}

/// The resource table: one optional entry per slot, indexed by slot id. A
/// slot with no entry never boots.
pub type ResourceTable = [Option<ResourceEntry>; MAX_APPS];

bitflags::bitflags! {
    /// Access and cache attributes of a memory partition.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct PartitionAttributes: u32 {
        /// Partition can be read by threads of domains that include it.
        const READ = 1 << 0;
        /// Partition can be written by threads of domains that include it.
        const WRITE = 1 << 1;
        /// Partition can contain executable code.
        const EXECUTE = 1 << 2;
        /// Normal memory, as opposed to device memory.
        const NORMAL = 1 << 3;
        /// Outer and inner write-back caching.
        const WRITE_BACK = 1 << 4;
        /// Not shared with other bus masters.
        const NON_SHAREABLE = 1 << 5;

        /// The one cache policy applied to every application partition.
        const NORMAL_WRITE_BACK_NON_SHAREABLE = Self::NORMAL.bits()
            | Self::WRITE_BACK.bits()
            | Self::NON_SHAREABLE.bits();
    }
}

/// Description of one contiguous memory partition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Partition {
    /// Address of start of partition. The MPU has alignment requirements
    /// for this; the linker script that places partitions must meet them.
    pub base: usize,
    /// Size of the partition, in bytes.
    pub size: usize,
    pub attributes: PartitionAttributes,
}

impl Partition {
    /// A read-write data partition, before any cache policy is applied.
    pub const fn new(base: usize, size: usize) -> Self {
        Self {
            base,
            size,
            attributes: PartitionAttributes::READ
                .union(PartitionAttributes::WRITE),
        }
    }

    /// Address one past the end of this partition.
    pub fn end_addr(&self) -> usize {
        self.base.wrapping_add(self.size)
    }

    pub fn contains(&self, addr: usize) -> bool {
        self.base <= addr && addr < self.end_addr()
    }
}

bitflags::bitflags! {
    /// Which partitions were composed into a domain.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct PartitionSet: u8 {
        /// The C library / runtime partition. Always present.
        const BASE = 1 << 0;
        /// The slot's own private partition.
        const PRIVATE = 1 << 1;
        /// The partition shared between every domain that opts in.
        const SHARED = 1 << 2;
    }
}

impl PartitionSet {
    /// The partitions a domain with `mode` is built from.
    pub fn for_mode(mode: AppMode) -> Self {
        let mut set = Self::BASE;
        if mode.contains(AppMode::PART_GLOBAL) {
            set |= Self::PRIVATE;
        }
        if mode.contains(AppMode::PART_SHARED) {
            set |= Self::SHARED;
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop(_: &mut dyn Syscalls) {}

    #[test]
    fn empty_desc_is_unpopulated() {
        assert!(!AppDesc::EMPTY.is_populated());
        assert!(AppDesc::EMPTY.objects.is_empty());
    }

    #[test]
    fn desc_builders() {
        static OBJS: [ObjectRef; 2] =
            [ObjectRef::from_addr(0x100), ObjectRef::from_addr(0x200)];
        let d = AppDesc::new(
            AppMode::APP,
            nop,
            ObjectRef::from_addr(0x10),
            ObjectRef::from_addr(0x20),
            1024,
        )
        .with_objects(&OBJS)
        .privileged();

        assert!(d.is_populated());
        assert!(!d.user_task);
        assert!(d.config.is_none());
        assert!(d.declares(ObjectRef::from_addr(0x200)));
        assert!(!d.declares(ObjectRef::from_addr(0x300)));
    }

    #[test]
    fn partition_bounds() {
        let p = Partition::new(0x2000_0000, 0x1000);
        assert!(p.contains(0x2000_0000));
        assert!(p.contains(0x2000_0fff));
        assert!(!p.contains(0x2000_1000));
        assert!(!p.contains(0x1fff_ffff));
        assert!(p.attributes.contains(PartitionAttributes::WRITE));
        assert!(!p.attributes.intersects(
            PartitionAttributes::NORMAL_WRITE_BACK_NON_SHAREABLE
        ));
    }

    #[test]
    fn partition_set_follows_mode() {
        assert_eq!(PartitionSet::for_mode(AppMode::APP), PartitionSet::BASE);
        assert_eq!(
            PartitionSet::for_mode(AppMode::SERVICE | AppMode::PART_GLOBAL),
            PartitionSet::BASE | PartitionSet::PRIVATE
        );
        assert_eq!(
            PartitionSet::for_mode(
                AppMode::APP | AppMode::PART_GLOBAL | AppMode::PART_SHARED
            ),
            PartitionSet::all()
        );
    }
}
