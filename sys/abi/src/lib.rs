// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Framework ABI definitions, shared between the framework and the
//! applications and services it boots.

#![cfg_attr(not(test), no_std)]

use core::fmt;
use core::ops::Deref;

use serde::{Deserialize, Serialize};
use static_assertions::const_assert;

/// Number of memory partitions the MPU can enforce for user-mode domains.
pub const MAX_MPU_PARTITIONS: usize = 9;

/// Number of application/service slots in an image. Every slot owns one
/// private partition, so this can't exceed what the MPU supports.
pub const MAX_APPS: usize = 9;

const_assert!(MAX_APPS <= MAX_MPU_PARTITIONS);

/// Index of the shared partition, which follows the private partitions.
pub const SHARED_PARTITION_INDEX: usize = MAX_APPS;

/// Largest number of devices a single resource table entry may request.
pub const MAX_DEVICES_PER_APP: usize = 4;

/// Size of the RTOS's device name buffer, NUL terminator included. Names
/// may be at most `MAX_DEV_NAME_LEN - 1` bytes long.
pub const MAX_DEV_NAME_LEN: usize = 20;

/// Number of cooperative priority levels configured in the RTOS.
pub const NUM_COOP_PRIORITIES: i8 = 16;

/// Names an application or service slot.
///
/// Applications and services share a single id space. Ids are indices into
/// the framework's fixed-size tables, so an `AppId` is always less than
/// `MAX_APPS`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct AppId(u8);

impl AppId {
    /// Fabricates an `AppId`, if `index` names a slot.
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < MAX_APPS {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Iterates over every slot id in ascending order.
    pub fn all() -> impl Iterator<Item = AppId> {
        (0..MAX_APPS as u8).map(AppId)
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app{}", self.0)
    }
}

/// The role a domain plays during boot.
///
/// Services are released before applications. Each role owns one priority
/// band.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Role {
    Service,
    Application,
}

/// RTOS thread priority.
///
/// Follows the RTOS convention: negative values are cooperative (never
/// preempted by other threads), non-negative values are preemptible, and
/// numerically lower values are more important.
///
/// Like the kernel's own priority type, this deliberately does not implement
/// `PartialOrd`/`Ord`.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Hash, Default, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct Priority(pub i8);

pub const APP_BOOT_PRIO_0: Priority = Priority::app(0);
pub const APP_BOOT_PRIO_9: Priority = Priority::app(9);
pub const SERV_BOOT_PRIO_0: Priority = Priority::service(0);
pub const SERV_BOOT_PRIO_9: Priority = Priority::service(9);

/// Number of boot priority levels in each band.
pub const BOOT_PRIO_LEVELS: u8 = 10;

impl Priority {
    /// The `n`th cooperative priority, counting from the least important.
    pub const fn coop(n: i8) -> Self {
        Self(-(NUM_COOP_PRIORITIES - n))
    }

    /// The `n`th preemptible priority.
    pub const fn preempt(n: i8) -> Self {
        Self(n)
    }

    /// Level `n` of the service boot band.
    ///
    /// # Panics
    ///
    /// If `n` is not below `BOOT_PRIO_LEVELS`; in a const context this is a
    /// build failure.
    pub const fn service(n: u8) -> Self {
        assert!(n < BOOT_PRIO_LEVELS);
        Self::coop(n as i8 + 1)
    }

    /// Level `n` of the application boot band.
    ///
    /// # Panics
    ///
    /// If `n` is not below `BOOT_PRIO_LEVELS`.
    pub const fn app(n: u8) -> Self {
        assert!(n < BOOT_PRIO_LEVELS);
        Self::preempt(n as i8)
    }

    /// Reports which boot band, if any, contains this priority.
    pub const fn band(self) -> Option<Role> {
        if self.0 >= SERV_BOOT_PRIO_0.0 && self.0 <= SERV_BOOT_PRIO_9.0 {
            Some(Role::Service)
        } else if self.0 >= APP_BOOT_PRIO_0.0 && self.0 <= APP_BOOT_PRIO_9.0 {
            Some(Role::Application)
        } else {
            None
        }
    }

    /// Checks if `self` is strictly more important than `other`.
    pub fn is_more_important_than(self, other: Self) -> bool {
        self.0 < other.0
    }
}

bitflags::bitflags! {
    /// How an application slot boots and which partitions its domain gets.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct AppMode: u32 {
        /// Released in the application wave.
        const APP = 1 << 0;
        /// Released in the service wave, before any application.
        const SERVICE = 1 << 1;
        /// Include the slot's private partition in its domain.
        const PART_GLOBAL = 1 << 2;
        /// Include the shared partition in its domain.
        const PART_SHARED = 1 << 3;
    }
}

impl AppMode {
    /// Extracts the boot role. Exactly one of `APP` and `SERVICE` must be
    /// set; anything else is `None`.
    pub fn role(self) -> Option<Role> {
        match (self.contains(Self::SERVICE), self.contains(Self::APP)) {
            (true, false) => Some(Role::Service),
            (false, true) => Some(Role::Application),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// System services a domain is allowed to call into.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct SysService: u8 {
        /// Power management controller messaging.
        const PMC = 1 << 0;
        /// Host IPC.
        const HOST = 1 << 1;
    }
}

/// Opaque reference to a kernel object: a semaphore, FIFO, thread control
/// block, thread stack, or device instance.
///
/// Threads are named by the `ObjectRef` of their control block.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct ObjectRef(*const ());

// Safety: an `ObjectRef` is only an address. Nothing in this crate, or in the
// framework, dereferences it; that is left to the RTOS.
unsafe impl Send for ObjectRef {}
unsafe impl Sync for ObjectRef {}

impl ObjectRef {
    pub const NULL: Self = Self(core::ptr::null());

    /// Names the object stored at `obj`.
    pub const fn of<T>(obj: &T) -> Self {
        Self(obj as *const T as *const ())
    }

    /// Names the object at a raw address, for kernels that hand out handles
    /// rather than pointers.
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr as *const ())
    }

    pub fn addr(self) -> usize {
        self.0 as usize
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:#x})", self.addr())
    }
}

/// A device name, as used to bind a driver instance.
///
/// Fixed capacity so that it can live in a resource table in Flash and be
/// copied into trace entries. Construct it with `DeviceName::from_str` in
/// const context; an oversized literal fails the build.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct DeviceName {
    buf: [u8; MAX_DEV_NAME_LEN],
    len: u8,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NameTooLong;

impl DeviceName {
    pub const EMPTY: Self = Self {
        buf: [0; MAX_DEV_NAME_LEN],
        len: 0,
    };

    pub const fn try_from_str(s: &str) -> Result<Self, NameTooLong> {
        let bytes = s.as_bytes();
        let len = bytes.len();
        if len >= MAX_DEV_NAME_LEN {
            return Err(NameTooLong);
        }

        let mut buf = [0; MAX_DEV_NAME_LEN];
        // byte loop so this can stay a const fn
        let mut idx = 0;
        while idx < len {
            buf[idx] = bytes[idx];
            idx += 1;
        }
        Ok(Self {
            buf,
            len: len as u8,
        })
    }

    pub const fn from_str(s: &str) -> Self {
        match Self::try_from_str(s) {
            Ok(name) => name,
            Err(_) => panic!("device name too long"),
        }
    }

    pub fn as_str(&self) -> &str {
        // Only ever filled from a `&str`, so this can't fail.
        core::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or("")
    }
}

impl Deref for DeviceName {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Debug for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
