// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Mount controller: lifecycle and mutation API of the virtual volume
//!
//! Lock order is `transition` -> `lifecycle` -> tree. Driver callbacks only
//! ever take the tree lock, so a driver blocking on its callbacks during
//! uninstall cannot deadlock against the controller.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::driver::{lock_tree, DriverAdapter, DriverHandle};
use crate::namespace::{NamespaceTree, VirtualResource};
use crate::resolver::MountResolver;
use crate::types::{is_valid_entry_name, MountPoint, ResourceAccessor};

/// Observable lifecycle state of the service
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
}

enum Lifecycle {
    Stopped,
    Starting,
    Running(DriverHandle),
}

impl Lifecycle {
    fn state(&self) -> ServiceState {
        match self {
            Lifecycle::Stopped => ServiceState::Stopped,
            Lifecycle::Starting => ServiceState::Starting,
            Lifecycle::Running(_) => ServiceState::Running,
        }
    }
}

/// Exposes registered resources as a read-only mounted volume.
///
/// Every query and mutation reports "not mounted" and "unknown root" as
/// `None`, `false` or a no-op; none of them fail loudly, so callers may
/// invoke them speculatively whether or not a driver is present.
pub struct ResourceMountingService {
    driver: Arc<dyn DriverAdapter>,
    resolver: MountResolver,
    transition: Mutex<()>,
    lifecycle: RwLock<Lifecycle>,
}

impl ResourceMountingService {
    pub fn new(driver: Arc<dyn DriverAdapter>, resolver: MountResolver) -> Self {
        Self {
            driver,
            resolver,
            transition: Mutex::new(()),
            lifecycle: RwLock::new(Lifecycle::Stopped),
        }
    }

    /// Resolve the mount point and install the driver there.
    ///
    /// Returns whether the volume is mounted afterwards. A failed install is
    /// logged and leaves the service stopped; a later call may retry.
    pub fn startup(&self) -> bool {
        let _transition = self.transition.lock().unwrap_or_else(PoisonError::into_inner);
        {
            let mut lifecycle = self.write_lifecycle();
            if matches!(*lifecycle, Lifecycle::Running(_)) {
                return true;
            }
            *lifecycle = Lifecycle::Starting;
        }

        let mount_point = self.resolver.resolve();
        let installed = self.driver.install(mount_point);

        let mut lifecycle = self.write_lifecycle();
        match installed {
            Some(handle) => {
                info!(
                    target: "resmount::service",
                    mount_point = %handle.mount_point(),
                    role = %self.resolver.role(),
                    "virtual resource volume mounted"
                );
                *lifecycle = Lifecycle::Running(handle);
                true
            }
            None => {
                warn!(
                    target: "resmount::service",
                    mount_point = %mount_point,
                    "could not install filesystem driver; virtual resource mounting disabled"
                );
                *lifecycle = Lifecycle::Stopped;
                false
            }
        }
    }

    /// Unmount the volume and forget every root. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let _transition = self.transition.lock().unwrap_or_else(PoisonError::into_inner);
        let mut lifecycle = self.write_lifecycle();
        let Lifecycle::Running(handle) = std::mem::replace(&mut *lifecycle, Lifecycle::Stopped)
        else {
            return;
        };

        self.driver.uninstall();
        let discarded = std::mem::replace(
            &mut *lock_tree(handle.tree()),
            NamespaceTree::new(handle.mount_point()),
        );
        info!(
            target: "resmount::service",
            mount_point = %handle.mount_point(),
            roots = discarded.root_names().len(),
            resources = discarded.len(),
            "virtual resource volume unmounted"
        );
        drop(lifecycle);
        drop(discarded);
    }

    pub fn state(&self) -> ServiceState {
        self.read_lifecycle().state()
    }

    /// Mount point of the running volume
    pub fn mount_point(&self) -> Option<MountPoint> {
        match &*self.read_lifecycle() {
            Lifecycle::Running(handle) => Some(handle.mount_point()),
            _ => None,
        }
    }

    /// Drive root of the running volume, e.g. `R:\`
    pub fn root_path(&self) -> Option<String> {
        self.mount_point().map(|mp| mp.root_path())
    }

    /// Names of all registered roots; empty when not mounted
    pub fn root_directories(&self) -> Vec<String> {
        self.with_tree(|tree| tree.root_names()).unwrap_or_default()
    }

    /// Register an empty root and return its visible path. A root that
    /// already exists is replaced, releasing everything under it.
    pub fn create_root(&self, name: &str) -> Option<String> {
        if !is_valid_entry_name(name) {
            warn!(target: "resmount::service", root = name, "rejecting invalid root name");
            return None;
        }
        let path = self.with_tree(|tree| tree.create_root(name))?;
        debug!(target: "resmount::service", root = name, %path, "created root directory");
        Some(path)
    }

    /// Remove a root with everything under it
    pub fn dispose_root(&self, name: &str) {
        if self.with_tree(|tree| tree.dispose_root(name)) == Some(true) {
            debug!(target: "resmount::service", root = name, "disposed root directory");
        }
    }

    /// Mount `accessor` under `root`, keyed by its resource name. A sibling
    /// with the same name is replaced.
    pub fn add_resource(&self, root: &str, accessor: Arc<dyn ResourceAccessor>) -> Option<String> {
        let name = accessor.resource_name().to_string();
        if !is_valid_entry_name(&name) {
            warn!(
                target: "resmount::service",
                root,
                resource = %name,
                "rejecting resource with invalid name"
            );
            return None;
        }
        // Built before locking: capturing the size may touch the provider.
        let resource = VirtualResource::new(accessor);
        let path = self.with_tree(|tree| tree.add_resource(root, resource)).flatten()?;
        debug!(target: "resmount::service", root, resource = %name, %path, "mounted resource");
        Some(path)
    }

    /// Unmount the resource named like `accessor` from `root`, if present
    pub fn remove_resource(&self, root: &str, accessor: &dyn ResourceAccessor) {
        let name = accessor.resource_name();
        let removed = self.with_tree(|tree| tree.remove_resource(root, name)).flatten();
        if removed.is_some() {
            debug!(target: "resmount::service", root, resource = name, "unmounted resource");
        }
    }

    /// Accessors currently mounted under `root`
    pub fn list_resources(&self, root: &str) -> Option<Vec<Arc<dyn ResourceAccessor>>> {
        self.with_tree(|tree| tree.resources(root)).flatten()
    }

    /// Whether `path` points into the mounted volume
    pub fn is_virtual_resource(&self, path: &str) -> bool {
        match &*self.read_lifecycle() {
            Lifecycle::Running(handle) => {
                MountResolver::is_mounted_path(path, handle.mount_point(), self.driver.as_ref())
            }
            _ => false,
        }
    }

    /// Run `f` against the tree under the shared lock, if mounted. The
    /// closure's result is dropped by the caller after both locks are gone.
    fn with_tree<R>(&self, f: impl FnOnce(&mut NamespaceTree) -> R) -> Option<R> {
        let lifecycle = self.read_lifecycle();
        let Lifecycle::Running(handle) = &*lifecycle else {
            return None;
        };
        let mut tree = lock_tree(handle.tree());
        Some(f(&mut tree))
    }

    fn read_lifecycle(&self) -> RwLockReadGuard<'_, Lifecycle> {
        self.lifecycle.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lifecycle(&self) -> RwLockWriteGuard<'_, Lifecycle> {
        self.lifecycle.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ResourceMountingService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
