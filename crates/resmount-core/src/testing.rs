// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory accessors and a fake driver for tests
//!
//! These stand in for real resource providers and for the OS driver so the
//! namespace, resolver and service can be exercised without mounting
//! anything. Downstream crates use them in their own tests as well.

use std::io::{self, Cursor};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::driver::{DriverAdapter, DriverHandle, VolumeCallbacks};
use crate::types::{MountPoint, ReadStream, ResourceAccessor};

/// Resource backed by a byte buffer, or a directory of other accessors
#[derive(Clone, Debug)]
pub struct MemoryAccessor {
    name: String,
    data: Option<Arc<Vec<u8>>>,
    children: Vec<Arc<dyn ResourceAccessor>>,
    fail_open: bool,
}

impl MemoryAccessor {
    pub fn file(name: &str, data: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            data: Some(Arc::new(data.to_vec())),
            children: Vec::new(),
            fail_open: false,
        }
    }

    pub fn directory(name: &str, children: Vec<Arc<dyn ResourceAccessor>>) -> Self {
        Self {
            name: name.to_string(),
            data: None,
            children,
            fail_open: false,
        }
    }

    /// Make every `open_read` fail, as an unreachable share would
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn shared(self) -> Arc<dyn ResourceAccessor> {
        Arc::new(self)
    }
}

impl ResourceAccessor for MemoryAccessor {
    fn resource_name(&self) -> &str {
        &self.name
    }

    fn is_file(&self) -> bool {
        self.data.is_some()
    }

    fn size(&self) -> Option<u64> {
        self.data.as_ref().map(|data| data.len() as u64)
    }

    fn open_read(&self) -> io::Result<Box<dyn ReadStream>> {
        if self.fail_open {
            return Err(io::Error::new(io::ErrorKind::NotFound, "resource unavailable"));
        }
        match &self.data {
            Some(data) => Ok(Box::new(Cursor::new(data.as_ref().clone()))),
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "cannot open a directory resource",
            )),
        }
    }

    fn children(&self) -> io::Result<Vec<Arc<dyn ResourceAccessor>>> {
        Ok(self.children.clone())
    }
}

/// Driver that "mounts" by handing out an in-memory tree
#[derive(Debug, Default)]
pub struct FakeDriver {
    fail_install: AtomicBool,
    installs: AtomicUsize,
    uninstalls: AtomicUsize,
    current: Mutex<Option<DriverHandle>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver whose install always fails, as when the OS component is
    /// missing
    pub fn unavailable() -> Self {
        let driver = Self::default();
        driver.set_fail_install(true);
        driver
    }

    pub fn set_fail_install(&self, fail: bool) {
        self.fail_install.store(fail, Ordering::SeqCst);
    }

    pub fn install_count(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    pub fn uninstall_count(&self) -> usize {
        self.uninstalls.load(Ordering::SeqCst)
    }

    /// Callback router of the installed volume, as the OS side would see it
    pub fn callbacks(&self) -> Option<VolumeCallbacks> {
        self.slot().as_ref().map(DriverHandle::callbacks)
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<DriverHandle>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DriverAdapter for FakeDriver {
    fn install(&self, mount_point: MountPoint) -> Option<DriverHandle> {
        if self.fail_install.load(Ordering::SeqCst) {
            return None;
        }
        self.installs.fetch_add(1, Ordering::SeqCst);
        let handle = DriverHandle::new(mount_point);
        *self.slot() = Some(handle.clone());
        Some(handle)
    }

    fn uninstall(&self) {
        if self.slot().take().is_some() {
            self.uninstalls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn owns_drive(&self, letter: char) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|handle| handle.mount_point().letter() == letter.to_ascii_uppercase())
    }
}
