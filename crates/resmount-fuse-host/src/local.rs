// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Resource accessor over the local filesystem

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use resmount_core::{ReadStream, ResourceAccessor};

/// A local file or directory exposed as a resource
#[derive(Clone, Debug)]
pub struct LocalFsAccessor {
    path: PathBuf,
    name: String,
    is_file: bool,
    len: u64,
}

impl LocalFsAccessor {
    /// Kind and length are read once; later changes on disk show up only
    /// through `open_read` and `children`.
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let metadata = fs::metadata(&path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} has no file name", path.display()),
                )
            })?;
        Ok(Self {
            name,
            is_file: metadata.is_file(),
            len: metadata.len(),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accessors for the entries of directory `dir`
    pub fn entries_of(dir: &Path) -> io::Result<Vec<Arc<dyn ResourceAccessor>>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let accessor: Arc<dyn ResourceAccessor> = Arc::new(Self::new(entry?.path())?);
            entries.push(accessor);
        }
        entries.sort_by(|a, b| a.resource_name().cmp(b.resource_name()));
        Ok(entries)
    }
}

impl ResourceAccessor for LocalFsAccessor {
    fn resource_name(&self) -> &str {
        &self.name
    }

    fn is_file(&self) -> bool {
        self.is_file
    }

    fn size(&self) -> Option<u64> {
        self.is_file.then_some(self.len)
    }

    fn open_read(&self) -> io::Result<Box<dyn ReadStream>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn children(&self) -> io::Result<Vec<Arc<dyn ResourceAccessor>>> {
        if self.is_file {
            return Ok(Vec::new());
        }
        Self::entries_of(&self.path)
    }
}
