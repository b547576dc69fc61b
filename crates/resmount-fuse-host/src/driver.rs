// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! [`DriverAdapter`] implementations offered by this host

use std::sync::Arc;

use resmount_core::{DriverAdapter, DriverHandle, MountPoint};
use tracing::warn;

use crate::config::FuseHostConfig;

/// Driver for builds without FUSE support; every install fails
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableDriver;

impl DriverAdapter for UnavailableDriver {
    fn install(&self, mount_point: MountPoint) -> Option<DriverHandle> {
        warn!(
            target: "resmount::fuse",
            %mount_point,
            "FUSE support not compiled in; rebuild with --features fuse"
        );
        None
    }

    fn uninstall(&self) {}

    fn owns_drive(&self, _letter: char) -> bool {
        false
    }
}

/// Driver best suited to this build
pub fn build_driver(config: &FuseHostConfig) -> Arc<dyn DriverAdapter> {
    #[cfg(all(feature = "fuse", target_os = "linux"))]
    {
        Arc::new(FuseDriver::new(config.mount_base(), config.allow_other))
    }

    #[cfg(not(all(feature = "fuse", target_os = "linux")))]
    {
        let _ = config;
        Arc::new(UnavailableDriver)
    }
}

#[cfg(all(feature = "fuse", target_os = "linux"))]
pub use fuse_driver::FuseDriver;

#[cfg(all(feature = "fuse", target_os = "linux"))]
mod fuse_driver {
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use resmount_core::{DriverAdapter, DriverHandle, MountPoint, VOLUME_LABEL};
    use tracing::{info, warn};

    use crate::adapter::ResourceFs;
    use crate::paths::drive_dir;

    struct MountedVolume {
        mount_point: MountPoint,
        dir: PathBuf,
        // Dropping the session unmounts the volume.
        _session: fuser::BackgroundSession,
    }

    /// Mounts the volume with libfuse under `<mount_base>/<letter>`
    pub struct FuseDriver {
        mount_base: PathBuf,
        allow_other: bool,
        mounted: Mutex<Option<MountedVolume>>,
    }

    impl FuseDriver {
        pub fn new(mount_base: PathBuf, allow_other: bool) -> Self {
            Self {
                mount_base,
                allow_other,
                mounted: Mutex::new(None),
            }
        }

        fn mounted(&self) -> MutexGuard<'_, Option<MountedVolume>> {
            self.mounted.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn mount_options(&self) -> Vec<fuser::MountOption> {
            let mut options = vec![
                fuser::MountOption::FSName(VOLUME_LABEL.to_string()),
                fuser::MountOption::Subtype("resmount".to_string()),
                fuser::MountOption::RO,
                fuser::MountOption::NoExec,
                fuser::MountOption::NoSuid,
            ];
            if self.allow_other {
                options.push(fuser::MountOption::AllowOther);
            }
            options
        }
    }

    impl DriverAdapter for FuseDriver {
        fn install(&self, mount_point: MountPoint) -> Option<DriverHandle> {
            let mut mounted = self.mounted();
            if mounted.is_some() {
                warn!(target: "resmount::fuse", %mount_point, "a volume is already mounted");
                return None;
            }

            let dir = drive_dir(&self.mount_base, mount_point);
            if let Err(err) = std::fs::create_dir_all(&dir) {
                warn!(
                    target: "resmount::fuse",
                    dir = %dir.display(),
                    %err,
                    "cannot create mount directory"
                );
                return None;
            }

            let handle = DriverHandle::new(mount_point);
            let filesystem = ResourceFs::new(handle.callbacks());
            match fuser::spawn_mount2(filesystem, &dir, &self.mount_options()) {
                Ok(session) => {
                    info!(
                        target: "resmount::fuse",
                        %mount_point,
                        dir = %dir.display(),
                        "volume mounted"
                    );
                    *mounted = Some(MountedVolume {
                        mount_point,
                        dir,
                        _session: session,
                    });
                    Some(handle)
                }
                Err(err) => {
                    warn!(
                        target: "resmount::fuse",
                        dir = %dir.display(),
                        %err,
                        "FUSE mount failed"
                    );
                    None
                }
            }
        }

        fn uninstall(&self) {
            let volume = self.mounted().take();
            if let Some(volume) = volume {
                info!(
                    target: "resmount::fuse",
                    mount_point = %volume.mount_point,
                    dir = %volume.dir.display(),
                    "unmounting volume"
                );
                drop(volume);
            }
        }

        fn owns_drive(&self, letter: char) -> bool {
            self.mounted()
                .as_ref()
                .is_some_and(|volume| volume.mount_point.letter() == letter.to_ascii_uppercase())
        }
    }
}
