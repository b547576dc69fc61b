// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Resource mounting core: exposes pluggable resource accessors as a
//! read-only mounted volume
//!
//! This crate is platform-agnostic. The OS filesystem driver plugs in
//! through [`DriverAdapter`] and serves its callbacks via
//! [`VolumeCallbacks`]; everything else (namespace, drive selection,
//! lifecycle) lives here and is tested against [`testing::FakeDriver`].

pub mod driver;
pub mod error;
pub mod namespace;
pub mod resolver;
pub mod service;
pub mod settings;
pub mod testing;
pub mod types;

// Re-export key types
pub use driver::{lock_tree, DriverAdapter, DriverHandle, SharedTree, VolumeCallbacks};
pub use error::{MountError, MountResult, SettingsError};
pub use namespace::{NamespaceTree, NodeKey, VirtualResource, VolumePath};
pub use resolver::{MountResolver, DEFAULT_DRIVE_LETTER_CLIENT, DEFAULT_DRIVE_LETTER_SERVER};
pub use service::{ResourceMountingService, ServiceState};
pub use settings::{
    MemorySettingsStore, ResourceMountingSettings, SettingsStore, TomlSettingsStore,
    SETTINGS_PATH_ENV,
};
pub use types::{
    is_valid_entry_name, Attributes, DirEntry, FileTimes, MountPoint, ReadStream,
    ResourceAccessor, ResourceKind, SystemRole, FILE_ATTRIBUTE_DIRECTORY,
    FILE_ATTRIBUTE_NOT_CONTENT_INDEXED, FILE_ATTRIBUTE_READONLY, MIN_FILE_TIME, VOLUME_LABEL,
};
