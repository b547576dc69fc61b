// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Core type definitions for the resource mounting service

use serde::{Deserialize, Serialize};
use std::io::{self, Read, Seek};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::SettingsError;

/// Volume label reported by drivers that support one.
pub const VOLUME_LABEL: &str = "Virtual resource access";

/// Timestamp reported for every virtual entry.
///
/// Hosts reject entries dated before their epoch (Windows shell APIs refuse
/// anything older than FILETIME 0, POSIX tools choke on negative times), so
/// all entries carry this fixed value instead of a real creation time.
pub const MIN_FILE_TIME: SystemTime = SystemTime::UNIX_EPOCH;

/// Win32 attribute bits used when a driver speaks the Windows contract
pub const FILE_ATTRIBUTE_READONLY: u32 = 0x01;
pub const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x10;
pub const FILE_ATTRIBUTE_NOT_CONTENT_INDEXED: u32 = 0x2000;

/// Byte stream handed out by a resource accessor
pub trait ReadStream: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadStream for T {}

/// Capability object naming a resource and opening read streams over it.
///
/// Accessors are owned by whoever registers them; the namespace only keeps a
/// shared reference for as long as the resource stays mounted.
pub trait ResourceAccessor: Send + Sync {
    /// Name used as the unique key among siblings
    fn resource_name(&self) -> &str;

    /// `true` for leaf resources, `false` for containers
    fn is_file(&self) -> bool;

    /// Length in bytes, when cheaply known
    fn size(&self) -> Option<u64> {
        None
    }

    /// Open a new read stream positioned at the start of the resource
    fn open_read(&self) -> io::Result<Box<dyn ReadStream>>;

    /// Child resources of a container. Leaves have none.
    fn children(&self) -> io::Result<Vec<Arc<dyn ResourceAccessor>>> {
        Ok(Vec::new())
    }
}

impl std::fmt::Debug for dyn ResourceAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResourceAccessor({})", self.resource_name())
    }
}

/// Kind of a virtual entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    File,
    Directory,
}

impl ResourceKind {
    pub fn of(accessor: &dyn ResourceAccessor) -> Self {
        if accessor.is_file() {
            ResourceKind::File
        } else {
            ResourceKind::Directory
        }
    }

    pub fn is_dir(self) -> bool {
        self == ResourceKind::Directory
    }
}

/// File timestamps
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileTimes {
    pub created: SystemTime,
    pub accessed: SystemTime,
    pub modified: SystemTime,
}

impl Default for FileTimes {
    fn default() -> Self {
        Self {
            created: MIN_FILE_TIME,
            accessed: MIN_FILE_TIME,
            modified: MIN_FILE_TIME,
        }
    }
}

/// Attributes of a virtual entry as reported to the host
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attributes {
    pub kind: ResourceKind,
    pub len: u64,
    pub read_only: bool,
    pub times: FileTimes,
}

impl Attributes {
    pub fn directory() -> Self {
        Self {
            kind: ResourceKind::Directory,
            len: 0,
            read_only: true,
            times: FileTimes::default(),
        }
    }

    pub fn file(len: u64) -> Self {
        Self {
            kind: ResourceKind::File,
            len,
            read_only: true,
            times: FileTimes::default(),
        }
    }

    pub fn for_accessor(accessor: &dyn ResourceAccessor) -> Self {
        match ResourceKind::of(accessor) {
            ResourceKind::File => Self::file(accessor.size().unwrap_or(0)),
            ResourceKind::Directory => Self::directory(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Win32 `FILE_ATTRIBUTE_*` bits for this entry
    pub fn win32_flags(&self) -> u32 {
        match self.kind {
            ResourceKind::File => FILE_ATTRIBUTE_READONLY,
            ResourceKind::Directory => {
                FILE_ATTRIBUTE_READONLY
                    | FILE_ATTRIBUTE_NOT_CONTENT_INDEXED
                    | FILE_ATTRIBUTE_DIRECTORY
            }
        }
    }
}

/// Directory entry information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub attributes: Attributes,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.attributes.is_dir()
    }
}

/// Drive letter the virtual volume is exposed at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub struct MountPoint(char);

impl MountPoint {
    pub(crate) const SERVER_DEFAULT: MountPoint = MountPoint('S');
    pub(crate) const CLIENT_DEFAULT: MountPoint = MountPoint('R');

    /// Build a mount point from an ASCII letter; the letter is upper-cased.
    pub fn new(letter: char) -> Option<Self> {
        letter.is_ascii_alphabetic().then(|| Self(letter.to_ascii_uppercase()))
    }

    pub fn letter(&self) -> char {
        self.0
    }

    /// Drive root, e.g. `R:\`
    pub fn root_path(&self) -> String {
        format!("{}:\\", self.0)
    }

    /// Externally visible path of `segments` below the drive root
    pub fn join<S: AsRef<str>>(&self, segments: &[S]) -> String {
        let mut path = self.root_path();
        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                path.push('\\');
            }
            path.push_str(segment.as_ref());
        }
        path
    }
}

impl TryFrom<char> for MountPoint {
    type Error = SettingsError;

    fn try_from(letter: char) -> Result<Self, Self::Error> {
        Self::new(letter).ok_or(SettingsError::InvalidDriveLetter(letter))
    }
}

impl From<MountPoint> for char {
    fn from(mount_point: MountPoint) -> char {
        mount_point.0
    }
}

impl std::fmt::Display for MountPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:", self.0)
    }
}

/// Deployment role of the hosting application
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemRole {
    Server,
    #[default]
    Client,
}

impl std::fmt::Display for SystemRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemRole::Server => write!(f, "server"),
            SystemRole::Client => write!(f, "client"),
        }
    }
}

impl std::str::FromStr for SystemRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "server" => Ok(SystemRole::Server),
            "client" => Ok(SystemRole::Client),
            _ => Err(format!("Invalid system role: {}. Use 'server' or 'client'", s)),
        }
    }
}

/// Whether `name` can be used as a single path component on the volume
pub fn is_valid_entry_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.chars().any(|c| matches!(c, '\\' | '/' | ':' | '\0'))
}
