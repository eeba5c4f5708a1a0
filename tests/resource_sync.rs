// Copyright (c) 2024 Mike Tsao. All rights reserved.

mod common;

use common::{app_info, quiet_settings, remote_dir, Harness, ScriptedBackend};
use ensnare_sync::{prelude::*, sync::LAST_UPDATES_INFO_KEY};
use std::{sync::Arc, time::Duration};

fn themes() -> ResourceType {
    ResourceType::from("themes")
}

fn remembered(resources: &[(&str, &str)]) -> MemoryConfigStore {
    let config = MemoryConfigStore::default();
    config
        .save(&app_info(resources), LAST_UPDATES_INFO_KEY)
        .unwrap();
    config
}

#[test]
fn changed_hash_requests_exactly_that_resource() {
    let (dir, remote) = remote_dir();
    remote
        .publish_app_info(&app_info(&[("themes", "H2"), ("translations", "T1")]))
        .unwrap();
    let dark = Record::new("themes").with_attribute("name", "dark");
    remote.publish_resource(&themes(), &dark).unwrap();

    let mut h = Harness::new_with(
        ResourceSyncSettings::immediate(),
        Arc::new(ScriptedBackend::new_with(dir.path())),
        remembered(&[("themes", "H1"), ("translations", "T1")]),
    );
    assert!(h.service.is_running(&TaskSlot::UpdatesCheck));

    // The updates check is the only thing running, so it reports first.
    assert!(h.service.handle_next_completion(Duration::from_secs(10)));
    assert_eq!(
        h.service.task_state(&TaskSlot::UpdatesCheck),
        TaskState::Completed
    );
    assert!(h.service.is_running(&TaskSlot::ResourceRequest(themes())));
    assert_eq!(
        h.service
            .task_state(&TaskSlot::ResourceRequest(ResourceType::from("translations"))),
        TaskState::Idle,
        "unchanged hashes aren't requested"
    );
    assert_eq!(
        h.events(),
        vec![ResourceSyncEvent::UpdatesChecked {
            outdated: vec![themes()]
        }]
    );

    h.wait_for_all();
    assert_eq!(h.events(), vec![ResourceSyncEvent::ResourceUpdated(themes())]);
    let manager = h.themes.lock().unwrap();
    assert_eq!(manager.update_count(), 1);
    assert_eq!(manager.base(), Some(&dark));
    assert_eq!(h.translations.lock().unwrap().update_count(), 0);
}

#[test]
fn matching_hashes_request_nothing() {
    let (dir, remote) = remote_dir();
    remote
        .publish_app_info(&app_info(&[("themes", "H1")]))
        .unwrap();

    let mut h = Harness::new_with(
        ResourceSyncSettings::immediate(),
        Arc::new(ScriptedBackend::new_with(dir.path())),
        remembered(&[("themes", "H1")]),
    );
    h.wait_for(&TaskSlot::UpdatesCheck);

    assert_eq!(
        h.service.task_state(&TaskSlot::ResourceRequest(themes())),
        TaskState::Idle
    );
    assert!(!h.service.has_running_tasks());
    assert_eq!(
        h.events(),
        vec![ResourceSyncEvent::UpdatesChecked {
            outdated: Vec::default()
        }]
    );
}

#[test]
fn successful_check_is_remembered() {
    let (dir, remote) = remote_dir();
    let latest = app_info(&[("themes", "H2"), ("translations", "T9")]);
    remote.publish_app_info(&latest).unwrap();

    let mut h = Harness::new_with(
        ResourceSyncSettings::immediate(),
        Arc::new(ScriptedBackend::new_with(dir.path())),
        MemoryConfigStore::default(),
    );
    h.wait_for_all();

    // Nothing was remembered, so everything looked new.
    assert!(matches!(
        h.events().first(),
        Some(ResourceSyncEvent::UpdatesChecked { outdated }) if outdated.len() == 2
    ));

    let mut stored = AppInfoDto::default();
    h.config.load(&mut stored, LAST_UPDATES_INFO_KEY).unwrap();
    assert_eq!(stored, latest);
}

#[test]
fn failed_check_leaves_config_alone() {
    let (dir, _remote) = remote_dir();
    let mut h = Harness::new_with(
        ResourceSyncSettings::immediate(),
        Arc::new(ScriptedBackend::new_with(dir.path())),
        MemoryConfigStore::default(),
    );
    h.wait_for(&TaskSlot::UpdatesCheck);

    assert_eq!(
        h.service.task_state(&TaskSlot::UpdatesCheck),
        TaskState::Failed
    );
    assert!(h.events().is_empty());
    assert!(h
        .config
        .load_record(LAST_UPDATES_INFO_KEY)
        .unwrap()
        .is_none());
}

#[test]
fn unknown_resource_types_are_dropped() {
    let (dir, remote) = remote_dir();
    remote
        .publish_app_info(&app_info(&[("fonts", "F1"), ("themes", "H1")]))
        .unwrap();
    remote
        .publish_resource(&ResourceType::from("fonts"), &Record::new("fonts"))
        .unwrap();

    let mut h = Harness::new_with(
        ResourceSyncSettings::immediate(),
        Arc::new(ScriptedBackend::new_with(dir.path())),
        remembered(&[("themes", "H1")]),
    );
    h.wait_for_all();

    assert_eq!(
        h.service
            .task_state(&TaskSlot::ResourceRequest(ResourceType::from("fonts"))),
        TaskState::Completed
    );
    let events = h.events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, ResourceSyncEvent::ResourceUpdated(_))));
    assert_eq!(h.themes.lock().unwrap().update_count(), 0);
}

#[test]
fn same_resource_type_is_single_flight() {
    let (dir, _remote) = remote_dir();
    let mut h = Harness::new_with(
        quiet_settings(),
        Arc::new(ScriptedBackend::new_with(dir.path())),
        MemoryConfigStore::default(),
    );
    let later = Duration::from_secs(60 * 60);

    h.service.request_resource(themes(), later).unwrap();
    assert!(matches!(
        h.service.request_resource(themes(), later),
        Err(ResourceSyncError::AlreadyRunning(TaskSlot::ResourceRequest(t))) if t == themes()
    ));
    h.service
        .request_resource(ResourceType::from("translations"), later)
        .unwrap();
    assert!(h.service.is_running(&TaskSlot::ResourceRequest(themes())));

    h.service.exit();
}

#[test]
fn exit_cancels_waiting_tasks() {
    let (dir, _remote) = remote_dir();
    let mut h = Harness::new_with(
        quiet_settings(),
        Arc::new(ScriptedBackend::new_with(dir.path())),
        MemoryConfigStore::default(),
    );
    assert!(h.service.is_running(&TaskSlot::UpdatesCheck));

    h.service.exit();
    assert_eq!(h.service.handle_pending_completions(), 1);
    assert_eq!(
        h.service.task_state(&TaskSlot::UpdatesCheck),
        TaskState::Cancelled
    );
    assert_eq!(
        h.events(),
        vec![ResourceSyncEvent::TaskCancelled(TaskSlot::UpdatesCheck)]
    );

    // Cancelled isn't running, so the slot is free again.
    h.service.check_for_updates(Duration::from_secs(60)).unwrap();
    h.service.exit();
}

#[test]
fn dropping_the_service_joins_its_tasks() {
    let (dir, _remote) = remote_dir();
    let backend: Arc<dyn RemoteBackend> = Arc::new(ScriptedBackend::new_with(dir.path()));
    let mut h = Harness::new_with(
        quiet_settings(),
        Arc::clone(&backend),
        MemoryConfigStore::default(),
    );
    h.service
        .request_resource(themes(), Duration::from_secs(60 * 60))
        .unwrap();
    assert!(h.service.has_running_tasks());

    // Each worker holds a clone of the backend until its thread ends.
    drop(h);
    assert_eq!(Arc::strong_count(&backend), 1);
}
