// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Drive letter selection and path ownership checks

use std::sync::Arc;

use tracing::{info, warn};

use crate::driver::DriverAdapter;
use crate::settings::SettingsStore;
use crate::types::{MountPoint, SystemRole};

/// Default drive letter when the service runs on a server
pub const DEFAULT_DRIVE_LETTER_SERVER: char = 'S';
/// Default drive letter when the service runs on a client
pub const DEFAULT_DRIVE_LETTER_CLIENT: char = 'R';

/// Picks the mount point and answers "is this path on our drive"
pub struct MountResolver {
    store: Arc<dyn SettingsStore>,
    role: SystemRole,
}

impl MountResolver {
    pub fn new(store: Arc<dyn SettingsStore>, role: SystemRole) -> Self {
        Self { store, role }
    }

    pub fn role(&self) -> SystemRole {
        self.role
    }

    /// Role default, used when nothing valid is persisted
    pub fn default_mount_point(role: SystemRole) -> MountPoint {
        match role {
            SystemRole::Server => MountPoint::SERVER_DEFAULT,
            SystemRole::Client => MountPoint::CLIENT_DEFAULT,
        }
    }

    /// Resolve the mount point from the persisted preference.
    ///
    /// When no preference exists the role default is written back right
    /// away so it shows up in the settings file. A settings file that
    /// fails to load or holds an unusable letter is left untouched and the
    /// default is used for this run only.
    pub fn resolve(&self) -> MountPoint {
        let fallback = Self::default_mount_point(self.role);
        let mut settings = match self.store.load() {
            Ok(settings) => settings,
            Err(err) => {
                warn!(
                    target: "resmount::resolver",
                    %err,
                    default = %fallback,
                    "failed to load mount settings; using role default"
                );
                return fallback;
            }
        };

        match settings.drive_letter {
            Some(letter) => match MountPoint::try_from(letter) {
                Ok(mount_point) => mount_point,
                Err(err) => {
                    warn!(
                        target: "resmount::resolver",
                        %err,
                        default = %fallback,
                        "ignoring configured drive letter; using role default"
                    );
                    fallback
                }
            },
            None => {
                settings.drive_letter = Some(fallback.letter());
                if let Err(err) = self.store.save(&settings) {
                    warn!(
                        target: "resmount::resolver",
                        %err,
                        "failed to persist default drive letter"
                    );
                } else {
                    info!(
                        target: "resmount::resolver",
                        role = %self.role,
                        mount_point = %fallback,
                        "persisted default drive letter"
                    );
                }
                fallback
            }
        }
    }

    /// Drive letter of an absolute DOS path (`X:`, `X:\...`, `X:/...`),
    /// upper-cased. Relative, drive-relative (`X:foo`) and UNC paths have
    /// none.
    pub fn path_drive(path: &str) -> Option<char> {
        let mut chars = path.chars();
        let letter = chars.next()?;
        if !letter.is_ascii_alphabetic() || chars.next()? != ':' {
            return None;
        }
        match chars.next() {
            None | Some('\\') | Some('/') => Some(letter.to_ascii_uppercase()),
            Some(_) => None,
        }
    }

    /// Whether `path` lies on `mount_point` and the driver serves that drive
    pub fn is_mounted_path(
        path: &str,
        mount_point: MountPoint,
        driver: &dyn DriverAdapter,
    ) -> bool {
        match Self::path_drive(path) {
            Some(letter) => letter == mount_point.letter() && driver.owns_drive(letter),
            None => false,
        }
    }
}
