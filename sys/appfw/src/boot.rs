// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boot orchestration.
//!
//! `boot` turns a populated `SystemRegistry` into running threads. It runs
//! once, in the bootstrap context, with the scheduler not yet handing time
//! to any slot, and goes through these steps in order:
//!
//! 1. Apply the cache policy to every private partition and the shared
//!    partition.
//! 2. For each slot, in id order: validate it, create its main thread
//!    suspended, grant it its declared objects, and build its memory domain.
//!    Slots that fail validation are left out of every later step.
//! 3. Grant devices (see `grant`).
//! 4. Run config callbacks.
//! 5. Release every service.
//! 6. Release every application.
//!
//! Nothing here aborts. Errors are recorded in the `BootLog`, and the slot
//! (or single grant) concerned is dropped.

use heapless::Vec;

use abi::{AppId, AppMode, ObjectRef, Role, MAX_APPS, SHARED_PARTITION_INDEX};

use crate::descs::{AppDesc, PartitionAttributes, PartitionSet};
use crate::err::ConfigError;
use crate::grant::{grant_devices, GrantSet};
use crate::kernel::{Kernel, ThreadOptions, ThreadSpec};
use crate::registry::SystemRegistry;
use crate::supervisor::SupervisorCtx;
use crate::trace::{boot_trace, BootLog, Trace};

/// How isolated the booted threads are.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BootProfile {
    /// Unprivileged threads, each confined to a memory domain and granted
    /// only what its slot declares.
    UserMode,
    /// Privileged threads with no domains or grants. Priorities and release
    /// order are still enforced.
    Supervisor,
}

impl BootProfile {
    pub fn is_user_mode(self) -> bool {
        self == Self::UserMode
    }
}

impl Default for BootProfile {
    fn default() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(feature = "user-mode")] {
                Self::UserMode
            } else {
                Self::Supervisor
            }
        }
    }
}

/// Why a slot was not booted.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// No entry point.
    Unpopulated,
    /// No resource table entry.
    NoResources,
    AmbiguousMode,
    InvalidPriority,
}

/// Outcome of a boot.
#[derive(Debug, Default)]
pub struct BootReport {
    /// Every released slot, in release order.
    pub released: Vec<(AppId, Role), MAX_APPS>,
    /// Every slot that was left out, in id order.
    pub skipped: Vec<(AppId, SkipReason), MAX_APPS>,
    /// Device grants made.
    pub grants: GrantSet,
    /// Errors logged during this boot.
    pub errors: u32,
}

impl BootReport {
    /// Position of `id` in the release order.
    pub fn release_position(&self, id: AppId) -> Option<usize> {
        self.released.iter().position(|&(a, _)| a == id)
    }

    pub fn is_released(&self, id: AppId) -> bool {
        self.release_position(id).is_some()
    }

    pub fn skip_reason(&self, id: AppId) -> Option<SkipReason> {
        self.skipped
            .iter()
            .find(|&&(a, _)| a == id)
            .map(|&(_, reason)| reason)
    }

    /// Slots released in the `role` wave, in release order.
    pub fn released_as(&self, role: Role) -> impl Iterator<Item = AppId> + '_ {
        self.released
            .iter()
            .filter(move |&&(_, r)| r == role)
            .map(|&(a, _)| a)
    }
}

/// Boots every slot in `registry`.
pub fn boot<K: Kernel>(
    registry: &mut SystemRegistry,
    kernel: &mut K,
    profile: BootProfile,
    log: &mut BootLog,
) -> BootReport {
    let errors_before = log.errors();
    let mut report = BootReport::default();

    if registry.is_sealed() {
        boot_trace!(log, ConfigError::AlreadyBooted);
        report.errors = log.errors().saturating_sub(errors_before);
        return report;
    }
    registry.seal();

    init_partitions(registry, log);

    let mut services: Vec<AppId, MAX_APPS> = Vec::new();
    let mut apps: Vec<AppId, MAX_APPS> = Vec::new();

    for id in AppId::all() {
        match construct(registry, kernel, profile, id, log) {
            Ok(role) => {
                let queue = match role {
                    Role::Service => &mut services,
                    Role::Application => &mut apps,
                };
                // One entry per slot at most.
                let _ = queue.push(id);
            }
            Err(reason) => {
                let _ = report.skipped.push((id, reason));
            }
        }
    }

    if profile.is_user_mode() {
        report.grants = grant_devices(registry, kernel, log);
    }

    run_config_callbacks(registry, kernel, profile, log);

    let waves = [(&services, Role::Service), (&apps, Role::Application)];
    for (queue, role) in waves {
        for &id in queue {
            if let Some(thread) = registry.main_thread(id) {
                kernel.thread_start(thread);
                boot_trace!(log, Trace::Released { app: id, role });
                let _ = report.released.push((id, role));
            }
        }
    }

    boot_trace!(
        log,
        Trace::BootDone {
            services: services.len() as u8,
            apps: apps.len() as u8,
        }
    );

    report.errors = log.errors().saturating_sub(errors_before);
    report
}

fn init_partitions(registry: &mut SystemRegistry, log: &mut BootLog) {
    let policy = PartitionAttributes::NORMAL_WRITE_BACK_NON_SHAREABLE;
    for id in AppId::all() {
        registry.partition_mut(id).attributes |= policy;
        boot_trace!(
            log,
            Trace::PartitionInit {
                index: id.index() as u8
            }
        );
    }
    registry.shared_partition_mut().attributes |= policy;
    boot_trace!(
        log,
        Trace::PartitionInit {
            index: SHARED_PARTITION_INDEX as u8
        }
    );
}

/// Validates slot `id` and, if it passes, creates its thread and domain.
fn construct<K: Kernel>(
    registry: &mut SystemRegistry,
    kernel: &mut K,
    profile: BootProfile,
    id: AppId,
    log: &mut BootLog,
) -> Result<Role, SkipReason> {
    let desc = *registry.descriptor(id);
    let Some(entry) = desc.entry else {
        boot_trace!(log, Trace::Unpopulated(id));
        return Err(SkipReason::Unpopulated);
    };
    let Some(&resources) = registry.resources(id) else {
        boot_trace!(log, Trace::NoResources(id));
        return Err(SkipReason::NoResources);
    };
    let Some(role) = desc.mode.role() else {
        boot_trace!(log, ConfigError::AmbiguousMode(id));
        return Err(SkipReason::AmbiguousMode);
    };
    let priority = resources.priority;
    if priority.band() != Some(role) {
        boot_trace!(
            log,
            ConfigError::InvalidPriority {
                app: id,
                role,
                priority
            }
        );
        return Err(SkipReason::InvalidPriority);
    }

    let user = profile.is_user_mode() && desc.user_task;
    let options = if user {
        ThreadOptions::USER
    } else {
        ThreadOptions::empty()
    };
    let thread = kernel.thread_create(&ThreadSpec {
        thread: desc.thread,
        stack: desc.stack,
        stack_size: desc.stack_size,
        entry,
        priority,
        options,
    });
    boot_trace!(
        log,
        Trace::ThreadCreated {
            app: id,
            priority,
            user
        }
    );
    let bound = registry.bind_thread(id, thread);
    debug_assert!(bound, "{id} bound twice in one boot");

    if profile.is_user_mode() {
        grant_objects(kernel, id, &desc, thread, log);
        build_domain(registry, kernel, id, desc.mode, thread, log);
    }

    Ok(role)
}

fn grant_objects<K: Kernel>(
    kernel: &mut K,
    id: AppId,
    desc: &AppDesc,
    thread: ObjectRef,
    log: &mut BootLog,
) {
    for &object in desc.objects {
        if kernel.object_access_grant(object, thread) {
            boot_trace!(log, Trace::ObjectGranted { app: id, object });
        } else {
            boot_trace!(log, Trace::ObjectGrantFailed { app: id, object });
        }
    }

    if !desc.objects.is_empty() {
        kernel.thread_system_pool_assign(thread);
        boot_trace!(log, Trace::PoolAssigned(id));
    }
}

fn build_domain<K: Kernel>(
    registry: &mut SystemRegistry,
    kernel: &mut K,
    id: AppId,
    mode: AppMode,
    thread: ObjectRef,
    log: &mut BootLog,
) {
    let set = PartitionSet::for_mode(mode);

    kernel.mem_domain_init(id);
    kernel.mem_domain_add_partition(id, registry.base_partition());
    if set.contains(PartitionSet::PRIVATE) {
        kernel.mem_domain_add_partition(id, registry.partition(id));
    }
    if set.contains(PartitionSet::SHARED) {
        kernel.mem_domain_add_partition(id, registry.shared_partition());
    }
    kernel.mem_domain_add_thread(id, thread);

    registry.set_domain(id, set);
    boot_trace!(
        log,
        Trace::DomainBuilt {
            app: id,
            partitions: set
        }
    );
}

fn run_config_callbacks<K: Kernel>(
    registry: &SystemRegistry,
    kernel: &mut K,
    profile: BootProfile,
    log: &mut BootLog,
) {
    for id in AppId::all() {
        if !registry.is_booted(id) {
            continue;
        }
        let Some(config) = registry.descriptor(id).config else {
            continue;
        };
        boot_trace!(log, Trace::ConfigCallback(id));
        let mut ctx = SupervisorCtx {
            kernel: &mut *kernel,
            registry,
            profile,
            log: &mut *log,
        };
        config(&mut ctx);
    }
}
