// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The system registry: every per-slot table the framework keeps, in one
//! place.
//!
//! A slot's descriptor, resource entry, private partition and, once booted,
//! main thread and domain layout are all stored at the slot's index. The
//! registry is filled in before boot and, after that, only changes when the
//! orchestrator records the thread and domain it built for a slot.

use abi::{AppId, ObjectRef, SysService, MAX_APPS, MAX_DEVICES_PER_APP};

use crate::descs::{AppDesc, Partition, PartitionSet, ResourceEntry};
use crate::err::ConfigError;
use crate::trace::{boot_trace, BootLog};

#[derive(Copy, Clone, Debug)]
struct Slot {
    desc: AppDesc,
    resources: Option<ResourceEntry>,
    partition: Partition,
    thread: Option<ObjectRef>,
    domain: Option<PartitionSet>,
}

#[derive(Debug)]
pub struct SystemRegistry {
    slots: [Slot; MAX_APPS],
    base: Partition,
    shared: Partition,
    booted: bool,
}

impl SystemRegistry {
    /// Creates a registry with every slot empty.
    ///
    /// `base` is the runtime library partition every domain includes,
    /// `private[i]` belongs to slot `i`, and `shared` is included by domains
    /// that ask for it.
    pub fn new(
        base: Partition,
        private: [Partition; MAX_APPS],
        shared: Partition,
    ) -> Self {
        Self {
            slots: private.map(|partition| Slot {
                desc: AppDesc::EMPTY,
                resources: None,
                partition,
                thread: None,
                domain: None,
            }),
            base,
            shared,
            booted: false,
        }
    }

    /// Installs the descriptor for slot `id`. A slot can only be registered
    /// once; later attempts are rejected and leave the first in place.
    pub fn register(
        &mut self,
        id: AppId,
        desc: AppDesc,
    ) -> Result<(), ConfigError> {
        if self.booted {
            return Err(ConfigError::AlreadyBooted);
        }
        let slot = &mut self.slots[id.index()];
        if slot.desc.is_populated() {
            return Err(ConfigError::IdCollision(id));
        }
        slot.desc = desc;
        Ok(())
    }

    /// Installs the resource table entry for slot `id`.
    pub fn set_resources(
        &mut self,
        id: AppId,
        entry: ResourceEntry,
    ) -> Result<(), ConfigError> {
        if self.booted {
            return Err(ConfigError::AlreadyBooted);
        }
        let slot = &mut self.slots[id.index()];
        if slot.resources.is_some() {
            return Err(ConfigError::IdCollision(id));
        }
        if entry.devices.len() > MAX_DEVICES_PER_APP {
            return Err(ConfigError::TooManyDevices(id));
        }
        slot.resources = Some(entry);
        Ok(())
    }

    /// Fills the registry from an image's descriptor list and resource
    /// table. Problems are logged and the offending item is left out.
    pub fn populate(
        &mut self,
        descs: &[(u8, AppDesc)],
        table: &[Option<ResourceEntry>; MAX_APPS],
        log: &mut BootLog,
    ) {
        for &(raw, desc) in descs {
            let Some(id) = AppId::new(raw) else {
                boot_trace!(log, ConfigError::IdOutOfRange(raw));
                continue;
            };
            if let Err(e) = self.register(id, desc) {
                boot_trace!(log, e);
            }
        }

        for (id, entry) in AppId::all().zip(table) {
            if let Some(entry) = *entry {
                if let Err(e) = self.set_resources(id, entry) {
                    boot_trace!(log, e);
                }
            }
        }
    }

    pub fn descriptor(&self, id: AppId) -> &AppDesc {
        &self.slots[id.index()].desc
    }

    pub fn resources(&self, id: AppId) -> Option<&ResourceEntry> {
        self.slots[id.index()].resources.as_ref()
    }

    /// Main thread of slot `id`, if the slot was booted.
    pub fn main_thread(&self, id: AppId) -> Option<ObjectRef> {
        self.slots[id.index()].thread
    }

    pub fn is_booted(&self, id: AppId) -> bool {
        self.main_thread(id).is_some()
    }

    /// Partitions composed into slot `id`'s memory domain, if one was built.
    pub fn domain(&self, id: AppId) -> Option<PartitionSet> {
        self.slots[id.index()].domain
    }

    /// Private partition of slot `id`.
    pub fn partition(&self, id: AppId) -> &Partition {
        &self.slots[id.index()].partition
    }

    pub fn shared_partition(&self) -> &Partition {
        &self.shared
    }

    pub fn base_partition(&self) -> &Partition {
        &self.base
    }

    /// Main threads of every booted slot whose resource entry grants all of
    /// `cap`, in id order.
    pub fn capable_threads(
        &self,
        cap: SysService,
    ) -> impl Iterator<Item = (AppId, ObjectRef)> + '_ {
        AppId::all().zip(self.slots.iter()).filter_map(move |(id, slot)| {
            let resources = slot.resources.as_ref()?;
            if resources.sys_service.contains(cap) {
                slot.thread.map(|t| (id, t))
            } else {
                None
            }
        })
    }

    /// Whether `boot` has been run on this registry.
    pub fn is_sealed(&self) -> bool {
        self.booted
    }

    /// Marks the registry as booted. Descriptors and resource entries are
    /// fixed from here on, and a second `boot` does nothing.
    pub(crate) fn seal(&mut self) {
        self.booted = true;
    }

    /// Records the main thread of slot `id`. Returns `false`, changing
    /// nothing, if one was already recorded.
    #[must_use]
    pub(crate) fn bind_thread(&mut self, id: AppId, thread: ObjectRef) -> bool {
        let slot = &mut self.slots[id.index()];
        if slot.thread.is_some() {
            return false;
        }
        slot.thread = Some(thread);
        true
    }

    pub(crate) fn set_domain(&mut self, id: AppId, set: PartitionSet) {
        self.slots[id.index()].domain = Some(set);
    }

    pub(crate) fn partition_mut(&mut self, id: AppId) -> &mut Partition {
        &mut self.slots[id.index()].partition
    }

    pub(crate) fn shared_partition_mut(&mut self) -> &mut Partition {
        &mut self.shared
    }
}
