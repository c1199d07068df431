// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device access grants.
//!
//! Each resource table entry lists the devices its domain needs by name.
//! Once every domain has a thread, names are bound to device instances and
//! each instance is granted to the domain's main thread.

use abi::{AppId, DeviceName, ObjectRef, MAX_APPS, MAX_DEVICES_PER_APP};

use crate::err::ResolveError;
use crate::kernel::Kernel;
use crate::registry::SystemRegistry;
use crate::trace::{boot_trace, BootLog, Trace};

/// Most device grants a single pass can produce.
pub const MAX_DEVICE_GRANTS: usize = MAX_APPS * MAX_DEVICES_PER_APP;

/// One device handed to one domain.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DeviceGrant {
    pub app: AppId,
    pub device: DeviceName,
    pub handle: ObjectRef,
}

/// Grants made by one pass, in table order.
pub type GrantSet = heapless::Vec<DeviceGrant, MAX_DEVICE_GRANTS>;

/// Binds `name`, on behalf of `app`.
pub fn resolve<K: Kernel>(
    kernel: &K,
    app: AppId,
    name: DeviceName,
) -> Result<ObjectRef, ResolveError> {
    kernel
        .device_get_binding(&name)
        .ok_or(ResolveError::DeviceNotFound(app, name))
}

/// Runs one device grant pass over every booted slot, in id order.
///
/// Names that don't resolve are logged once each and skipped; nothing is
/// retried. The pass only adds permissions, so running it again yields the
/// same set.
pub fn grant_devices<K: Kernel>(
    registry: &SystemRegistry,
    kernel: &mut K,
    log: &mut BootLog,
) -> GrantSet {
    let mut grants = GrantSet::new();

    for id in AppId::all() {
        let Some(entry) = registry.resources(id) else {
            continue;
        };
        let Some(thread) = registry.main_thread(id) else {
            continue;
        };
        if entry.devices.is_empty() {
            boot_trace!(log, Trace::NoDeviceRequest(id));
            continue;
        }

        for &device in entry.devices {
            let handle = match resolve(&*kernel, id, device) {
                Ok(handle) => handle,
                Err(e) => {
                    boot_trace!(log, e);
                    continue;
                }
            };

            if kernel.object_access_grant(handle, thread) {
                boot_trace!(log, Trace::DeviceGranted { app: id, device });
                // Device lists are capped when installed, so this fits.
                let _ = grants.push(DeviceGrant {
                    app: id,
                    device,
                    handle,
                });
            } else {
                boot_trace!(log, Trace::DeviceGrantFailed { app: id, device });
            }
        }
    }

    grants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descs::{Partition, ResourceEntry};
    use crate::sim::SimKernel;
    use crate::trace::ErrorKind;
    use abi::Priority;

    static DEVS: [DeviceName; 3] = [
        DeviceName::from_str("I2C_0"),
        DeviceName::from_str("GPIO_99"),
        DeviceName::from_str("PWM_0"),
    ];

    fn app(n: u8) -> AppId {
        AppId::new(n).unwrap()
    }

    fn registry() -> SystemRegistry {
        SystemRegistry::new(
            Partition::new(0, 0x100),
            core::array::from_fn(|i| Partition::new(0x1000 * (i + 1), 0x100)),
            Partition::new(0x10_0000, 0x100),
        )
    }

    #[test]
    fn unbooted_slots_get_nothing() {
        let mut r = registry();
        let entry = ResourceEntry::new(Priority::app(0)).with_devices(&DEVS);
        r.set_resources(app(1), entry).unwrap();

        let mut kernel = SimKernel::with_devices(&["I2C_0", "PWM_0"]);
        let mut log = BootLog::new();
        let grants = grant_devices(&r, &mut kernel, &mut log);

        assert!(grants.is_empty());
        assert_eq!(log.errors(), 0);
        assert!(kernel.calls.is_empty());
    }

    #[test]
    fn refused_grant_is_logged() {
        let mut r = registry();
        let entry = ResourceEntry::new(Priority::app(0)).with_devices(&DEVS);
        r.set_resources(app(1), entry).unwrap();
        r.bind_thread(app(1), ObjectRef::from_addr(0x40));

        let mut kernel = SimKernel::with_devices(&["I2C_0", "PWM_0"]);
        let pwm = kernel.device("PWM_0").unwrap();
        kernel.refuse_grants_of(pwm);

        let mut log = BootLog::new();
        let grants = grant_devices(&r, &mut kernel, &mut log);

        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].device.as_str(), "I2C_0");
        assert_eq!(log.count(ErrorKind::DeviceBind), 1);
        assert_eq!(log.count(ErrorKind::DeviceGrant), 1);
    }

    #[test]
    fn empty_device_list_is_not_an_error() {
        let mut r = registry();
        r.set_resources(app(0), ResourceEntry::new(Priority::service(0)))
            .unwrap();
        r.bind_thread(app(0), ObjectRef::from_addr(0x40));

        let mut kernel = SimKernel::default();
        let mut log = BootLog::new();
        assert!(grant_devices(&r, &mut kernel, &mut log).is_empty());
        assert_eq!(log.errors(), 0);
        assert!(log.contains(&Trace::NoDeviceRequest(app(0))));
    }
}
