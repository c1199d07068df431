// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common error-handling support.
//!
//! None of these errors stop the boot. Each one costs, at most, the slot or
//! the single grant it was raised for; callers record it in the
//! [`BootLog`](crate::trace::BootLog) and move on.

use abi::{AppId, DeviceName, ObjectRef, Priority, Role};

/// A problem with the static configuration of a slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// A descriptor or resource entry named a slot past `MAX_APPS`.
    IdOutOfRange(u8),
    /// Two descriptors, or two resource entries, claimed the same slot. The
    /// first one wins.
    IdCollision(AppId),
    /// The mode sets both or neither of the service and application bits.
    AmbiguousMode(AppId),
    /// The table priority is outside the band for the slot's role.
    InvalidPriority {
        app: AppId,
        role: Role,
        priority: Priority,
    },
    /// The resource entry requests more devices than a slot may have.
    TooManyDevices(AppId),
    /// The registry was already booted. Nothing about it may change.
    AlreadyBooted,
}

/// Failure to turn a device name into a live device handle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResolveError {
    DeviceNotFound(AppId, DeviceName),
}

/// Failure to spawn a sub-thread inside an existing domain.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SpawnError {
    /// The child's control block or stack is missing from the parent's
    /// object list, so the child could not use it.
    Undeclared(ObjectRef),
}
