// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Contract between the mounting service and an OS filesystem driver
//!
//! A driver owns the OS side of the volume. On install it creates the
//! namespace tree and its lock, hands them to the service through a
//! [`DriverHandle`], and routes every OS callback through
//! [`VolumeCallbacks`]. Both sides therefore serialize on the same mutex.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::{MountError, MountResult};
use crate::namespace::{NamespaceTree, NodeKey, VolumePath};
use crate::types::{Attributes, DirEntry, MountPoint, ReadStream, ResourceAccessor};

/// Namespace tree together with the lock shared by driver and service
pub type SharedTree = Arc<Mutex<NamespaceTree>>;

/// Lock the shared tree. A panic on another thread must not take the
/// volume down with it, so a poisoned lock is recovered.
pub fn lock_tree(tree: &SharedTree) -> MutexGuard<'_, NamespaceTree> {
    tree.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a successful install hands back to the service
#[derive(Clone, Debug)]
pub struct DriverHandle {
    mount_point: MountPoint,
    tree: SharedTree,
}

impl DriverHandle {
    /// Create a fresh, empty volume for `mount_point`
    pub fn new(mount_point: MountPoint) -> Self {
        Self {
            mount_point,
            tree: Arc::new(Mutex::new(NamespaceTree::new(mount_point))),
        }
    }

    pub fn mount_point(&self) -> MountPoint {
        self.mount_point
    }

    pub fn tree(&self) -> &SharedTree {
        &self.tree
    }

    /// Callback router bound to this volume
    pub fn callbacks(&self) -> VolumeCallbacks {
        VolumeCallbacks {
            tree: Arc::clone(&self.tree),
        }
    }
}

/// OS-level filesystem virtualization driver
#[cfg_attr(test, mockall::automock)]
pub trait DriverAdapter: Send + Sync {
    /// Mount a new volume at `mount_point`; `None` when the driver is
    /// unavailable or the mount fails.
    fn install(&self, mount_point: MountPoint) -> Option<DriverHandle>;

    /// Unmount the current volume, if any
    fn uninstall(&self);

    /// Whether `letter` is a drive currently served by this driver
    fn owns_drive(&self, letter: char) -> bool;
}

/// Entry points a driver calls from its OS callback threads.
///
/// Listing and attribute lookups on mounted roots are answered from the
/// tree under the shared lock. Anything that has to touch an accessor
/// (opening streams, walking into directory resources) first clones the
/// accessor out of the tree and releases the lock.
#[derive(Clone)]
pub struct VolumeCallbacks {
    tree: SharedTree,
}

impl VolumeCallbacks {
    pub fn new(tree: SharedTree) -> Self {
        Self { tree }
    }

    /// Enumerate the children of `path`
    pub fn list(&self, path: &str) -> MountResult<Vec<DirEntry>> {
        let parsed = VolumePath::parse(path)?;
        if let VolumePath::Resource { key, rest } = parsed {
            let dir = descend(self.resolve_top(&key)?, &rest)?;
            if dir.is_file() {
                return Err(MountError::NotADirectory);
            }
            let entries = dir
                .children()?
                .iter()
                .map(|child| {
                    DirEntry::new(child.resource_name(), Attributes::for_accessor(child.as_ref()))
                })
                .collect();
            return Ok(entries);
        }
        lock_tree(&self.tree).list(&parsed)
    }

    /// Attributes of `path`
    pub fn attributes(&self, path: &str) -> MountResult<Attributes> {
        match VolumePath::parse(path)? {
            VolumePath::Volume => Ok(Attributes::directory()),
            VolumePath::Root(root) => {
                if lock_tree(&self.tree).has_root(&root) {
                    Ok(Attributes::directory())
                } else {
                    Err(MountError::NotFound)
                }
            }
            VolumePath::Resource { key, rest } if rest.is_empty() => lock_tree(&self.tree)
                .lookup(&key)
                .map(|resource| resource.attributes())
                .ok_or(MountError::NotFound),
            VolumePath::Resource { key, rest } => {
                let target = descend(self.resolve_top(&key)?, &rest)?;
                Ok(Attributes::for_accessor(target.as_ref()))
            }
        }
    }

    /// Open a read stream over the file at `path`
    pub fn open(&self, path: &str) -> MountResult<Box<dyn ReadStream>> {
        let (key, rest) = match VolumePath::parse(path)? {
            VolumePath::Resource { key, rest } => (key, rest),
            VolumePath::Volume | VolumePath::Root(_) => return Err(MountError::IsADirectory),
        };
        let target = descend(self.resolve_top(&key)?, &rest)?;
        if !target.is_file() {
            return Err(MountError::IsADirectory);
        }
        debug!(
            target: "resmount::driver",
            path,
            resource = target.resource_name(),
            "opening resource stream"
        );
        Ok(target.open_read()?)
    }

    /// Look up a mounted resource and clone its accessor out of the tree
    fn resolve_top(&self, key: &NodeKey) -> MountResult<Arc<dyn ResourceAccessor>> {
        let tree = lock_tree(&self.tree);
        let resource = tree.lookup(key).ok_or(MountError::NotFound)?;
        Ok(Arc::clone(resource.accessor()))
    }
}

/// Walk `rest` below a directory accessor. Runs without the tree lock.
fn descend(
    mut current: Arc<dyn ResourceAccessor>,
    rest: &[String],
) -> MountResult<Arc<dyn ResourceAccessor>> {
    for segment in rest {
        if current.is_file() {
            return Err(MountError::NotADirectory);
        }
        current = current
            .children()?
            .into_iter()
            .find(|child| child.resource_name() == segment.as_str())
            .ok_or(MountError::NotFound)?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::VirtualResource;
    use crate::testing::MemoryAccessor;
    use std::io::{self, Cursor, Read};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Weak;

    #[derive(Default)]
    struct LockLog {
        calls: AtomicUsize,
        held: AtomicUsize,
    }

    /// Accessor that checks whether the tree lock is free whenever it is
    /// asked to open a stream or enumerate children
    struct LockWitness {
        name: String,
        tree: Weak<Mutex<NamespaceTree>>,
        log: Arc<LockLog>,
        children: Option<Vec<Arc<dyn ResourceAccessor>>>,
    }

    impl LockWitness {
        fn file(
            name: &str,
            handle: &DriverHandle,
            log: &Arc<LockLog>,
        ) -> Arc<dyn ResourceAccessor> {
            Arc::new(Self {
                name: name.to_string(),
                tree: Arc::downgrade(handle.tree()),
                log: Arc::clone(log),
                children: None,
            })
        }

        fn directory(
            name: &str,
            handle: &DriverHandle,
            log: &Arc<LockLog>,
            children: Vec<Arc<dyn ResourceAccessor>>,
        ) -> Arc<dyn ResourceAccessor> {
            Arc::new(Self {
                name: name.to_string(),
                tree: Arc::downgrade(handle.tree()),
                log: Arc::clone(log),
                children: Some(children),
            })
        }

        fn record(&self) {
            self.log.calls.fetch_add(1, Ordering::SeqCst);
            let tree = self.tree.upgrade().unwrap();
            if tree.try_lock().is_err() {
                self.log.held.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    impl ResourceAccessor for LockWitness {
        fn resource_name(&self) -> &str {
            &self.name
        }

        fn is_file(&self) -> bool {
            self.children.is_none()
        }

        fn open_read(&self) -> io::Result<Box<dyn ReadStream>> {
            self.record();
            Ok(Box::new(Cursor::new(self.name.clone().into_bytes())))
        }

        fn children(&self) -> io::Result<Vec<Arc<dyn ResourceAccessor>>> {
            self.record();
            Ok(self.children.clone().unwrap_or_default())
        }
    }

    fn mounted() -> DriverHandle {
        let handle = DriverHandle::new(MountPoint::new('R').unwrap());
        {
            let mut tree = lock_tree(handle.tree());
            tree.create_root("lib");
            tree.add_resource(
                "lib",
                VirtualResource::new(MemoryAccessor::file("movie.mkv", b"frames").shared()),
            );
            let bonus = MemoryAccessor::directory(
                "bonus",
                vec![MemoryAccessor::file("02.flac", b"two").shared()],
            );
            let album = MemoryAccessor::directory(
                "album",
                vec![MemoryAccessor::file("01.flac", b"one").shared(), bonus.shared()],
            );
            tree.add_resource("lib", VirtualResource::new(album.shared()));
        }
        handle
    }

    #[test]
    fn list_volume_root_shows_roots() {
        let callbacks = mounted().callbacks();
        let entries = callbacks.list("\\").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "lib");
        assert!(entries[0].is_dir());
    }

    #[test]
    fn list_root_and_directory_resource() {
        let callbacks = mounted().callbacks();
        let names: Vec<_> = callbacks.list("/lib").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["album".to_string(), "movie.mkv".to_string()]);

        let album = callbacks.list("/lib/album").unwrap();
        assert_eq!(album.len(), 2);
        assert!(album.iter().any(|e| e.name == "bonus" && e.is_dir()));

        let bonus = callbacks.list("/lib/album/bonus").unwrap();
        assert_eq!(bonus[0].name, "02.flac");
    }

    #[test]
    fn list_file_is_not_a_directory() {
        let callbacks = mounted().callbacks();
        assert!(matches!(callbacks.list("/lib/movie.mkv"), Err(MountError::NotADirectory)));
        assert!(matches!(
            callbacks.list("/lib/album/01.flac"),
            Err(MountError::NotADirectory)
        ));
        assert!(matches!(callbacks.list("/nope"), Err(MountError::NotFound)));
    }

    #[test]
    fn attributes_are_read_only_with_lengths() {
        let callbacks = mounted().callbacks();
        assert!(callbacks.attributes("").unwrap().is_dir());
        assert!(callbacks.attributes("/lib").unwrap().is_dir());

        let movie = callbacks.attributes("\\lib\\movie.mkv").unwrap();
        assert!(!movie.is_dir());
        assert!(movie.read_only);
        assert_eq!(movie.len, 6);

        let nested = callbacks.attributes("/lib/album/bonus/02.flac").unwrap();
        assert_eq!(nested.len, 3);

        assert!(matches!(callbacks.attributes("/other"), Err(MountError::NotFound)));
        assert!(matches!(
            callbacks.attributes("/lib/album/missing"),
            Err(MountError::NotFound)
        ));
    }

    #[test]
    fn open_reads_through_accessor() {
        let callbacks = mounted().callbacks();
        let mut stream = callbacks.open("/lib/movie.mkv").unwrap();
        let mut buf = String::new();
        stream.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "frames");

        let mut nested = callbacks.open("/lib/album/01.flac").unwrap();
        let mut buf = String::new();
        nested.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "one");
    }

    #[test]
    fn open_directories_fails() {
        let callbacks = mounted().callbacks();
        assert!(matches!(callbacks.open("/lib"), Err(MountError::IsADirectory)));
        assert!(matches!(callbacks.open("/lib/album"), Err(MountError::IsADirectory)));
    }

    #[test]
    fn open_failure_surfaces_as_io_error() {
        let handle = mounted();
        lock_tree(handle.tree()).add_resource(
            "lib",
            VirtualResource::new(MemoryAccessor::file("broken", b"").failing_open().shared()),
        );
        assert!(matches!(handle.callbacks().open("/lib/broken"), Err(MountError::Io(_))));
    }

    #[test]
    fn open_stream_survives_removal() {
        let handle = mounted();
        let callbacks = handle.callbacks();
        let mut stream = callbacks.open("/lib/movie.mkv").unwrap();
        lock_tree(handle.tree()).dispose_root("lib");

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"frames");
        assert!(matches!(callbacks.open("/lib/movie.mkv"), Err(MountError::NotFound)));
    }

    #[test]
    fn accessor_io_runs_without_tree_lock() {
        let handle = DriverHandle::new(MountPoint::new('R').unwrap());
        let log = Arc::new(LockLog::default());
        {
            let mut tree = lock_tree(handle.tree());
            tree.create_root("lib");
            tree.add_resource("lib", VirtualResource::new(LockWitness::file("a", &handle, &log)));
            let nested = LockWitness::file("x", &handle, &log);
            let dir = LockWitness::directory("d", &handle, &log, vec![nested]);
            tree.add_resource("lib", VirtualResource::new(dir));
        }
        let calls_at_mount = log.calls.load(Ordering::SeqCst);
        let callbacks = handle.callbacks();

        let mut buf = String::new();
        callbacks.open("/lib/a").unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "a");

        let listed = callbacks.list("/lib/d").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "x");

        let mut buf = String::new();
        callbacks.open("/lib/d/x").unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "x");

        assert!(callbacks.attributes("/lib/d/x").is_ok());

        // open a; list d; open d/x walks d then opens x; attributes walks d
        assert_eq!(log.calls.load(Ordering::SeqCst) - calls_at_mount, 5);
        assert_eq!(log.held.load(Ordering::SeqCst), 0);
    }
}
