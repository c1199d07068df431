// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A hosted `Kernel` that records what it is asked to do.
//!
//! Nothing is actually scheduled. Threads are "run" by calling their entry
//! points, in the order they were started, from `SimKernel::run_started`.

extern crate std;

use std::string::{String, ToString};
use std::vec::Vec;

use abi::{AppId, ObjectRef, Priority};

use crate::descs::{EntryFn, Partition};
use crate::kernel::{Kernel, Syscalls, ThreadOptions, ThreadSpec};

/// Base of the handles given to simulated devices.
pub const SIM_DEVICE_BASE: usize = 0xD000_0000;

/// One call into the kernel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Call {
    ThreadCreate {
        thread: ObjectRef,
        stack: ObjectRef,
        stack_size: usize,
        priority: Priority,
        options: ThreadOptions,
    },
    ThreadStart(ObjectRef),
    ObjectAccessGrant {
        object: ObjectRef,
        thread: ObjectRef,
        granted: bool,
    },
    PoolAssign(ObjectRef),
    DomainInit(AppId),
    DomainAddPartition(AppId, Partition),
    DomainAddThread(AppId, ObjectRef),
}

#[derive(Debug, Default)]
pub struct SimKernel {
    /// Every call made so far, oldest first.
    pub calls: Vec<Call>,
    devices: Vec<(String, ObjectRef)>,
    refused: Vec<ObjectRef>,
    entries: Vec<(ObjectRef, EntryFn)>,
}

impl SimKernel {
    /// Creates a kernel whose device namespace holds `names`.
    pub fn with_devices(names: &[&str]) -> Self {
        let devices = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let handle = ObjectRef::from_addr(SIM_DEVICE_BASE + i * 0x100);
                (name.to_string(), handle)
            })
            .collect();
        Self {
            devices,
            ..Self::default()
        }
    }

    /// Handle of a simulated device.
    pub fn device(&self, name: &str) -> Option<ObjectRef> {
        self.devices
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, handle)| handle)
    }

    /// Makes every future grant of `object` fail.
    pub fn refuse_grants_of(&mut self, object: ObjectRef) {
        self.refused.push(object);
    }

    /// Threads started so far, in start order.
    pub fn started(&self) -> Vec<ObjectRef> {
        self.calls
            .iter()
            .filter_map(|c| match *c {
                Call::ThreadStart(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    /// Threads created so far, in creation order.
    pub fn created(&self) -> Vec<ObjectRef> {
        self.calls
            .iter()
            .filter_map(|c| match *c {
                Call::ThreadCreate { thread, .. } => Some(thread),
                _ => None,
            })
            .collect()
    }

    /// Priority and options `thread` was created with.
    pub fn creation(
        &self,
        thread: ObjectRef,
    ) -> Option<(Priority, ThreadOptions)> {
        self.calls.iter().find_map(|c| match *c {
            Call::ThreadCreate {
                thread: t,
                priority,
                options,
                ..
            } if t == thread => Some((priority, options)),
            _ => None,
        })
    }

    /// Objects successfully granted to `thread`, in grant order.
    pub fn grants_to(&self, thread: ObjectRef) -> Vec<ObjectRef> {
        self.calls
            .iter()
            .filter_map(|c| match *c {
                Call::ObjectAccessGrant {
                    object,
                    thread: t,
                    granted: true,
                } if t == thread => Some(object),
                _ => None,
            })
            .collect()
    }

    /// Number of times `thread` was given the system pool.
    pub fn pool_assignments(&self, thread: ObjectRef) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == Call::PoolAssign(thread))
            .count()
    }

    /// Partitions added to `domain`, in order.
    pub fn domain_partitions(&self, domain: AppId) -> Vec<Partition> {
        self.calls
            .iter()
            .filter_map(|c| match *c {
                Call::DomainAddPartition(d, p) if d == domain => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Threads added to `domain`, in order.
    pub fn domain_threads(&self, domain: AppId) -> Vec<ObjectRef> {
        self.calls
            .iter()
            .filter_map(|c| match *c {
                Call::DomainAddThread(d, t) if d == domain => Some(t),
                _ => None,
            })
            .collect()
    }

    /// Position of `call` in the call history.
    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls.iter().position(|c| c == call)
    }

    /// Calls the entry point of every started thread once, in start order.
    /// Threads started by an entry point are run after the ones already
    /// started.
    pub fn run_started(&mut self) {
        let mut next = 0;
        while let Some(thread) = self.started().get(next).copied() {
            next += 1;
            let entry = self
                .entries
                .iter()
                .find(|&&(t, _)| t == thread)
                .map(|&(_, entry)| entry);
            if let Some(entry) = entry {
                entry(self);
            }
        }
    }
}

impl Syscalls for SimKernel {
    fn thread_create(&mut self, spec: &ThreadSpec) -> ObjectRef {
        self.calls.push(Call::ThreadCreate {
            thread: spec.thread,
            stack: spec.stack,
            stack_size: spec.stack_size,
            priority: spec.priority,
            options: spec.options,
        });
        self.entries.push((spec.thread, spec.entry));
        spec.thread
    }

    fn thread_start(&mut self, thread: ObjectRef) {
        self.calls.push(Call::ThreadStart(thread));
    }
}

impl Kernel for SimKernel {
    fn object_access_grant(
        &mut self,
        object: ObjectRef,
        thread: ObjectRef,
    ) -> bool {
        let granted = !self.refused.contains(&object);
        self.calls.push(Call::ObjectAccessGrant {
            object,
            thread,
            granted,
        });
        granted
    }

    fn thread_system_pool_assign(&mut self, thread: ObjectRef) {
        self.calls.push(Call::PoolAssign(thread));
    }

    fn device_get_binding(&self, name: &str) -> Option<ObjectRef> {
        self.device(name)
    }

    fn mem_domain_init(&mut self, domain: AppId) {
        self.calls.push(Call::DomainInit(domain));
    }

    fn mem_domain_add_partition(&mut self, domain: AppId, part: &Partition) {
        self.calls.push(Call::DomainAddPartition(domain, *part));
    }

    fn mem_domain_add_thread(&mut self, domain: AppId, thread: ObjectRef) {
        self.calls.push(Call::DomainAddThread(domain, thread));
    }
}
