// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Privileged context handed to hardware-configuration callbacks.

use abi::{AppId, ObjectRef, SysService};

use crate::boot::BootProfile;
use crate::kernel::{Kernel, ThreadSpec};
use crate::registry::SystemRegistry;
use crate::trace::{boot_trace, BootLog, Trace};

/// What a slot's config callback may do.
///
/// Callbacks run in the bootstrap context after every domain is built and
/// before any thread is released, so they see the final set of booted slots
/// and nothing they set up can race an application.
pub trait Supervisor {
    /// Looks up a device instance by name.
    fn device(&self, name: &str) -> Option<ObjectRef>;

    /// Main thread of a booted slot.
    fn main_thread(&self, app: AppId) -> Option<ObjectRef>;

    /// Grants `object` to `thread`.
    fn grant(&mut self, object: ObjectRef, thread: ObjectRef) -> bool;

    /// Grants every object in `objects` to the main thread of each booted
    /// slot whose resource entry carries `cap`. Returns the number of slots
    /// that received all of them.
    fn grant_to_capable(
        &mut self,
        cap: SysService,
        objects: &[ObjectRef],
    ) -> usize;

    /// Creates a suspended helper thread.
    fn create_thread(&mut self, spec: &ThreadSpec) -> ObjectRef;
}

pub(crate) struct SupervisorCtx<'a, K> {
    pub kernel: &'a mut K,
    pub registry: &'a SystemRegistry,
    pub profile: BootProfile,
    pub log: &'a mut BootLog,
}

impl<K: Kernel> Supervisor for SupervisorCtx<'_, K> {
    fn device(&self, name: &str) -> Option<ObjectRef> {
        self.kernel.device_get_binding(name)
    }

    fn main_thread(&self, app: AppId) -> Option<ObjectRef> {
        self.registry.main_thread(app)
    }

    fn grant(&mut self, object: ObjectRef, thread: ObjectRef) -> bool {
        match self.profile {
            BootProfile::UserMode => {
                self.kernel.object_access_grant(object, thread)
            }
            // Privileged threads can already reach everything.
            BootProfile::Supervisor => true,
        }
    }

    fn grant_to_capable(
        &mut self,
        cap: SysService,
        objects: &[ObjectRef],
    ) -> usize {
        let registry = self.registry;
        let mut granted = 0;
        for (app, thread) in registry.capable_threads(cap) {
            let mut all = true;
            for &object in objects {
                if !self.grant(object, thread) {
                    boot_trace!(
                        self.log,
                        Trace::ObjectGrantFailed { app, object }
                    );
                    all = false;
                }
            }
            if all {
                boot_trace!(self.log, Trace::CapabilityGranted { app, cap });
                granted += 1;
            }
        }
        granted
    }

    fn create_thread(&mut self, spec: &ThreadSpec) -> ObjectRef {
        self.kernel.thread_create(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descs::{Partition, ResourceEntry};
    use crate::kernel::{Syscalls, ThreadOptions};
    use crate::sim::{Call, SimKernel};
    use crate::trace::ErrorKind;
    use abi::Priority;

    fn app(n: u8) -> AppId {
        AppId::new(n).unwrap()
    }

    fn registry() -> SystemRegistry {
        let mut r = SystemRegistry::new(
            Partition::new(0, 0x100),
            core::array::from_fn(|i| Partition::new(0x1000 * (i + 1), 0x100)),
            Partition::new(0x10_0000, 0x100),
        );
        let entry = ResourceEntry::new(Priority::app(0));
        r.set_resources(app(1), entry.with_sys_service(SysService::PMC))
            .unwrap();
        r.set_resources(app(2), entry.with_sys_service(SysService::HOST))
            .unwrap();
        r.bind_thread(app(1), ObjectRef::from_addr(0x100));
        r.bind_thread(app(2), ObjectRef::from_addr(0x200));
        r
    }

    const OBJS: [ObjectRef; 2] =
        [ObjectRef::from_addr(0xa0), ObjectRef::from_addr(0xb0)];

    #[test]
    fn capability_grants_reach_only_capable_slots() {
        let r = registry();
        let mut kernel = SimKernel::default();
        let mut log = BootLog::new();
        let mut ctx = SupervisorCtx {
            kernel: &mut kernel,
            registry: &r,
            profile: BootProfile::UserMode,
            log: &mut log,
        };

        assert_eq!(ctx.grant_to_capable(SysService::PMC, &OBJS), 1);
        assert_eq!(ctx.main_thread(app(2)), Some(ObjectRef::from_addr(0x200)));
        assert_eq!(ctx.main_thread(app(3)), None);

        assert_eq!(
            kernel.grants_to(ObjectRef::from_addr(0x100)),
            OBJS.to_vec()
        );
        assert!(kernel.grants_to(ObjectRef::from_addr(0x200)).is_empty());
        assert!(log.contains(&Trace::CapabilityGranted {
            app: app(1),
            cap: SysService::PMC
        }));
    }

    #[test]
    fn refused_capability_grant_is_an_error() {
        let r = registry();
        let mut kernel = SimKernel::default();
        kernel.refuse_grants_of(OBJS[1]);
        let mut log = BootLog::new();
        let mut ctx = SupervisorCtx {
            kernel: &mut kernel,
            registry: &r,
            profile: BootProfile::UserMode,
            log: &mut log,
        };

        assert_eq!(ctx.grant_to_capable(SysService::HOST, &OBJS), 0);
        assert_eq!(log.count(ErrorKind::ObjectGrant), 1);
    }

    #[test]
    fn supervisor_profile_skips_kernel_grants() {
        let r = registry();
        let mut kernel = SimKernel::with_devices(&["IPC_HOST"]);
        let mut log = BootLog::new();
        let mut ctx = SupervisorCtx {
            kernel: &mut kernel,
            registry: &r,
            profile: BootProfile::Supervisor,
            log: &mut log,
        };

        let dev = ctx.device("IPC_HOST").unwrap();
        assert!(ctx.grant(dev, ObjectRef::from_addr(0x200)));
        assert_eq!(ctx.grant_to_capable(SysService::PMC, &OBJS), 1);

        fn helper(_: &mut dyn Syscalls) {}
        let t = ctx.create_thread(&ThreadSpec {
            thread: ObjectRef::from_addr(0x300),
            stack: ObjectRef::from_addr(0x400),
            stack_size: 0x100,
            entry: helper,
            priority: Priority::service(0),
            options: ThreadOptions::empty(),
        });
        assert_eq!(t, ObjectRef::from_addr(0x300));
        assert!(!kernel
            .calls
            .iter()
            .any(|c| matches!(c, Call::ObjectAccessGrant { .. })));
    }
}
