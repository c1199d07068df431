// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Application framework.
//!
//! This partitions a single firmware image into isolated applications and
//! services, each confined to its own memory domain with an explicit list of
//! the kernel objects and devices it may touch, and brings them all up in a
//! fixed order before any of their code runs.
//!
//! The RTOS itself is not part of this crate. Everything we need from it is
//! behind the [`Kernel`] trait.
//!
//! # Design principles
//!
//! 1. Static configuration. The set of applications, their priorities and the
//!    resources they need are fixed when the image is built. There is no
//!    runtime registration, restart, or teardown.
//! 2. Slot ids are indices. An application's descriptor, resource table entry
//!    and private partition all live at the same index, so they can't drift
//!    apart.
//! 3. Boot never aborts. A misconfigured slot is logged and left out; the
//!    rest of the image still comes up.
//! 4. Services first. Every service thread is released before any
//!    application thread.

#![cfg_attr(not(test), no_std)]
#![forbid(clippy::wildcard_imports)]

pub mod boot;
pub mod descs;
pub mod err;
pub mod grant;
pub mod kernel;
pub mod registry;
pub mod spawn;
pub mod supervisor;
pub mod trace;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use abi::{
    AppId, AppMode, DeviceName, ObjectRef, Priority, Role, SysService,
    MAX_APPS,
};
pub use boot::{boot, BootProfile, BootReport, SkipReason};
pub use descs::{
    AppDesc, ConfigFn, EntryFn, Partition, PartitionAttributes, PartitionSet,
    ResourceEntry, ResourceTable,
};
pub use err::{ConfigError, ResolveError, SpawnError};
pub use grant::{grant_devices, DeviceGrant, GrantSet};
pub use kernel::{
    KObject, Kernel, Stack, Syscalls, ThreadOptions, ThreadSpec,
};
pub use registry::SystemRegistry;
pub use spawn::{create_sub_thread, spawn_sub_thread, SubThread};
pub use supervisor::Supervisor;
pub use trace::{BootLog, ErrorKind, Trace};
