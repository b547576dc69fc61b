// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Translation of drive paths to host mount paths

use std::path::{Path, PathBuf};

use resmount_core::{MountPoint, MountResolver};

/// Directory a drive letter is mounted at
pub fn drive_dir(mount_base: &Path, mount_point: MountPoint) -> PathBuf {
    mount_base.join(mount_point.letter().to_string())
}

/// Host path of a drive path such as `R:\lib\movie.mkv`, i.e.
/// `<mount_base>/R/lib/movie.mkv`. `None` for paths without a drive.
pub fn host_path(mount_base: &Path, dos_path: &str) -> Option<PathBuf> {
    let letter = MountResolver::path_drive(dos_path)?;
    let mut path = drive_dir(mount_base, MountPoint::new(letter)?);
    for segment in dos_path[2..].split(|c| c == '\\' || c == '/') {
        if !segment.is_empty() {
            path.push(segment);
        }
    }
    Some(path)
}
