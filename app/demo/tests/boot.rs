// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::atomic::Ordering;

use appfw::sim::SimKernel;
use appfw::{
    AppId, BootLog, BootProfile, ErrorKind, ObjectRef, PartitionSet, Role,
    SysService, ThreadOptions,
};

use app_demo::{codec, hello, ipc, subtask, sys_service};

const ALL_DEVICES: [&str; 4] = ["IPC_HOST", "IPC_PMC", "DMA_0", "I2S_0"];

fn id(n: u8) -> AppId {
    AppId::new(n).unwrap()
}

#[test]
fn image_boots_as_configured() {
    let mut kernel = SimKernel::with_devices(&ALL_DEVICES);
    let mut log = BootLog::new();
    let (registry, report) = app_demo::start(&mut kernel, &mut log);

    assert_eq!(report.errors, 0);
    assert_eq!(log.errors(), 0);

    let services: Vec<_> = report.released_as(Role::Service).collect();
    let apps: Vec<_> = report.released_as(Role::Application).collect();
    assert_eq!(services, [id(sys_service::ID), id(ipc::ID)]);
    assert_eq!(apps, [id(hello::ID), id(subtask::ID), id(codec::ID)]);

    let order = [sys_service::ID, ipc::ID, hello::ID, subtask::ID, codec::ID];
    let expected: Vec<_> = order
        .iter()
        .map(|&n| registry.main_thread(id(n)).unwrap())
        .collect();
    assert_eq!(kernel.started(), expected);

    // every name in app.toml is present in the namespace
    assert_eq!(report.grants.len(), ALL_DEVICES.len());
    let codec_thread = registry.main_thread(id(codec::ID)).unwrap();
    for name in codec::DEVICES {
        let dev = kernel.device(name).unwrap();
        assert!(kernel.grants_to(codec_thread).contains(&dev));
    }

    kernel.run_started();
    for (pos, &n) in order.iter().enumerate() {
        assert_eq!(app_demo::start_position(n), Some(pos + 1));
    }
    assert_eq!(app_demo::start_position(1), None);

    // main threads started their workers, which then ran
    let workers: Vec<_> = ipc::workers()
        .iter()
        .chain(subtask::workers().iter())
        .map(|w| w.thread)
        .collect();
    let created = kernel.created();
    assert_eq!(created.len(), order.len() + workers.len());
    assert_eq!(created[order.len()..], workers[..]);
    assert_eq!(kernel.started()[order.len()..], workers[..]);
    assert_eq!(ipc::spawn_failures(), 0);
    assert_eq!(subtask::spawn_failures(), 0);
    assert_eq!(subtask::worker_counts(), (subtask::ROUNDS, subtask::ROUNDS));
    assert_eq!(ipc::SENT.load(Ordering::Relaxed), 1);
    assert_eq!(ipc::RECEIVED.load(Ordering::Relaxed), 1);
}

#[test]
fn system_service_grants_mailboxes_by_capability() {
    let mut kernel = SimKernel::with_devices(&ALL_DEVICES);
    let mut log = BootLog::new();
    let (registry, _) = app_demo::start(&mut kernel, &mut log);

    let pmc = ObjectRef::of(&sys_service::PMC_MAILBOX);
    let host = ObjectRef::of(&sys_service::HOST_MAILBOX);
    let grants_of = |n: u8| {
        kernel.grants_to(registry.main_thread(id(n)).unwrap())
    };

    assert!(grants_of(codec::ID).contains(&pmc));
    assert!(!grants_of(codec::ID).contains(&host));
    assert!(grants_of(ipc::ID).contains(&host));
    assert!(!grants_of(ipc::ID).contains(&pmc));
    assert!(!grants_of(hello::ID).contains(&pmc));
    assert!(!grants_of(hello::ID).contains(&host));

    let capable: Vec<_> = registry
        .capable_threads(SysService::PMC)
        .map(|(a, _)| a)
        .collect();
    assert_eq!(capable, [id(sys_service::ID), id(codec::ID)]);
}

#[test]
fn domains_match_modes() {
    let mut kernel = SimKernel::with_devices(&ALL_DEVICES);
    let mut log = BootLog::new();
    let (registry, _) = app_demo::start(&mut kernel, &mut log);

    assert_eq!(
        registry.domain(id(ipc::ID)),
        Some(PartitionSet::BASE | PartitionSet::SHARED)
    );
    assert_eq!(
        registry.domain(id(subtask::ID)),
        Some(PartitionSet::BASE | PartitionSet::PRIVATE)
    );
    assert_eq!(registry.domain(id(hello::ID)), Some(PartitionSet::BASE));
    assert_eq!(registry.domain(id(1)), None);

    let shared = *registry.shared_partition();
    for n in [sys_service::ID, hello::ID, subtask::ID, codec::ID] {
        assert!(!kernel.domain_partitions(id(n)).contains(&shared));
    }
    assert!(kernel.domain_partitions(id(ipc::ID)).contains(&shared));
}

#[test]
fn missing_device_costs_only_its_grant() {
    let mut kernel =
        SimKernel::with_devices(&["IPC_HOST", "IPC_PMC", "DMA_0"]);
    let mut log = BootLog::new();
    let (_, report) = app_demo::start(&mut kernel, &mut log);

    assert_eq!(report.errors, 1);
    assert_eq!(log.count(ErrorKind::DeviceBind), 1);
    assert_eq!(report.grants.len(), 3);
    assert!(report.is_released(id(codec::ID)));
}

#[test]
fn workers_inherit_from_their_slot() {
    let mut kernel = SimKernel::default();
    subtask::start_workers(&mut kernel).unwrap();
    ipc::start_workers(&mut kernel).unwrap();

    let threads: Vec<_> = subtask::workers()
        .iter()
        .chain(ipc::workers().iter())
        .map(|w| w.thread)
        .collect();
    assert_eq!(kernel.started(), threads);
    for &t in &threads {
        let (_, options) = kernel.creation(t).unwrap();
        assert_eq!(
            options,
            ThreadOptions::USER | ThreadOptions::INHERIT_PERMS
        );
        assert!(kernel.grants_to(t).is_empty());
    }
}

#[test]
fn supervisor_profile_keeps_release_order() {
    let mut kernel = SimKernel::with_devices(&ALL_DEVICES);
    let mut log = BootLog::new();
    let mut registry = app_demo::registry(&mut log);
    let report = appfw::boot(
        &mut registry,
        &mut kernel,
        BootProfile::Supervisor,
        &mut log,
    );

    let released: Vec<_> = report.released.iter().map(|&(a, _)| a).collect();
    assert_eq!(released, [0, 5, 3, 7, 8].map(id));
    assert!(report.grants.is_empty());
    let codec_thread = registry.main_thread(id(codec::ID)).unwrap();
    assert!(kernel.grants_to(codec_thread).is_empty());
}
