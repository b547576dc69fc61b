// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! End-to-end lifecycle of the mounting service against a fake driver and
//! a settings file on disk

use std::io::Read;
use std::sync::Arc;

use resmount_core::testing::{FakeDriver, MemoryAccessor};
use resmount_core::{
    MountError, MountResolver, ResourceMountingService, ServiceState, SettingsStore, SystemRole,
    TomlSettingsStore, DEFAULT_DRIVE_LETTER_SERVER,
};
use tempfile::TempDir;

fn service(settings: &TomlSettingsStore, role: SystemRole) -> (Arc<FakeDriver>, ResourceMountingService) {
    let driver = Arc::new(FakeDriver::new());
    let resolver = MountResolver::new(Arc::new(settings.clone()), role);
    (driver.clone(), ResourceMountingService::new(driver, resolver))
}

#[test]
fn default_letter_is_persisted_and_reused_across_processes() {
    let dir = TempDir::new().unwrap();
    let store = TomlSettingsStore::new(dir.path().join("resmount").join("settings.toml"));

    let (_driver, first) = service(&store, SystemRole::Server);
    assert!(first.startup());
    assert_eq!(first.mount_point().unwrap().letter(), DEFAULT_DRIVE_LETTER_SERVER);
    assert_eq!(store.load().unwrap().drive_letter, Some(DEFAULT_DRIVE_LETTER_SERVER));
    drop(first);

    // An operator moves the volume; the next process must honor it.
    std::fs::write(store.path(), "drive-letter = \"V\"\n").unwrap();
    let (_driver, second) = service(&store, SystemRole::Server);
    assert!(second.startup());
    assert_eq!(second.root_path().as_deref(), Some("V:\\"));
    assert!(second.is_virtual_resource("V:\\anything"));
    assert!(!second.is_virtual_resource("S:\\anything"));
}

#[test]
fn mounted_resources_are_readable_through_driver_callbacks() {
    let dir = TempDir::new().unwrap();
    let store = TomlSettingsStore::new(dir.path().join("settings.toml"));
    let (driver, service) = service(&store, SystemRole::Client);
    assert!(service.startup());

    let root = service.create_root("library").unwrap();
    assert_eq!(root, "R:\\library");

    let album = MemoryAccessor::directory(
        "album",
        vec![MemoryAccessor::file("01.flac", b"first track").shared()],
    )
    .shared();
    let path = service.add_resource("library", album).unwrap();
    assert_eq!(path, "R:\\library\\album");
    assert!(service.is_virtual_resource(&path));

    let callbacks = driver.callbacks().unwrap();
    let tracks = callbacks.list("\\library\\album").unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].name, "01.flac");

    let mut stream = callbacks.open("\\library\\album\\01.flac").unwrap();
    let mut text = String::new();
    stream.read_to_string(&mut text).unwrap();
    assert_eq!(text, "first track");

    service.shutdown();
    assert_eq!(service.state(), ServiceState::Stopped);
    assert!(driver.callbacks().is_none());
    assert!(matches!(callbacks.list("\\library"), Err(MountError::NotFound)));
}

#[test]
fn missing_driver_degrades_gracefully() {
    let dir = TempDir::new().unwrap();
    let store = TomlSettingsStore::new(dir.path().join("settings.toml"));
    let driver = Arc::new(FakeDriver::unavailable());
    let resolver = MountResolver::new(Arc::new(store), SystemRole::Client);
    let service = ResourceMountingService::new(driver.clone(), resolver);

    assert!(!service.startup());
    assert!(service.create_root("library").is_none());

    driver.set_fail_install(false);
    assert!(service.startup());
    assert!(service.create_root("library").is_some());
}
