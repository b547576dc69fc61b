// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! FUSE filesystem over the mounted namespace
//!
//! Maps FUSE operations to [`VolumeCallbacks`]. Inodes are handed out per
//! virtual path on first lookup; open streams live in a handle table so
//! reads never touch the namespace lock.

#[cfg(not(all(feature = "fuse", target_os = "linux")))]
compile_error!("This module requires the 'fuse' feature on Linux");

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use fuser::{
    FileAttr, FileType, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen,
    Request, FUSE_ROOT_ID,
};
use libc::{c_int, EBADF, EIO, ENAMETOOLONG, ENOENT, O_ACCMODE, O_RDONLY};
use resmount_core::{Attributes, DirEntry, MountError, ReadStream, VolumeCallbacks};
use tracing::{debug, info, warn};

use crate::errno::errno;

const NAME_MAX: usize = 255;
const BLOCK_SIZE: u32 = 512;
/// Set on inode numbers reported for entries the kernel has not looked up
const UNTRACKED_INODE_BIT: u64 = 1 << 63;

pub struct ResourceFs {
    callbacks: VolumeCallbacks,
    /// Entries change whenever roots are added or removed, so cache briefly
    ttl: Duration,
    inodes: HashMap<u64, String>,
    paths: HashMap<String, u64>,
    next_inode: u64,
    handles: HashMap<u64, Box<dyn ReadStream>>,
    next_fh: u64,
    uid: u32,
    gid: u32,
}

impl ResourceFs {
    pub fn new(callbacks: VolumeCallbacks) -> Self {
        let mut inodes = HashMap::new();
        let mut paths = HashMap::new();
        inodes.insert(FUSE_ROOT_ID, "/".to_string());
        paths.insert("/".to_string(), FUSE_ROOT_ID);

        // SAFETY: getuid/getgid cannot fail and touch no memory.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };

        Self {
            callbacks,
            ttl: Duration::from_secs(1),
            inodes,
            paths,
            next_inode: FUSE_ROOT_ID + 1,
            handles: HashMap::new(),
            next_fh: 1,
            uid,
            gid,
        }
    }

    fn inode_to_path(&self, ino: u64) -> Option<&str> {
        self.inodes.get(&ino).map(String::as_str)
    }

    fn get_or_alloc_inode(&mut self, path: &str) -> u64 {
        if let Some(&inode) = self.paths.get(path) {
            return inode;
        }
        let inode = self.next_inode;
        self.next_inode += 1;
        self.paths.insert(path.to_string(), inode);
        self.inodes.insert(inode, path.to_string());
        inode
    }

    /// Inode number to report for `path` in a directory listing.
    ///
    /// Plain readdir does not raise the kernel lookup count, so no `forget`
    /// would ever release an inode allocated here. Paths not yet looked up
    /// get a stable number derived from the path instead.
    fn listing_inode(&self, path: &str) -> u64 {
        if let Some(&inode) = self.paths.get(path) {
            return inode;
        }
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        hasher.finish() | UNTRACKED_INODE_BIT
    }

    /// `.`, `..` and `entries` of the directory `ino` at `path`
    fn listing(
        &self,
        ino: u64,
        path: &str,
        entries: Vec<DirEntry>,
    ) -> Vec<(u64, FileType, String)> {
        let mut listing = vec![
            (ino, FileType::Directory, ".".to_string()),
            (ino, FileType::Directory, "..".to_string()),
        ];
        for entry in entries {
            let entry_ino = self.listing_inode(&child_path(path, &entry.name));
            let kind = if entry.is_dir() {
                FileType::Directory
            } else {
                FileType::RegularFile
            };
            listing.push((entry_ino, kind, entry.name));
        }
        listing
    }

    fn forget_inode(&mut self, ino: u64) {
        if ino == FUSE_ROOT_ID {
            return;
        }
        if let Some(path) = self.inodes.remove(&ino) {
            self.paths.remove(&path);
        }
    }

    fn attr_to_fuse(&self, attr: &Attributes, ino: u64) -> FileAttr {
        let (kind, perm, nlink) = if attr.is_dir() {
            (FileType::Directory, 0o555, 2)
        } else {
            (FileType::RegularFile, 0o444, 1)
        };
        FileAttr {
            ino,
            size: attr.len,
            blocks: attr.len.div_ceil(BLOCK_SIZE as u64),
            atime: attr.times.accessed,
            mtime: attr.times.modified,
            ctime: attr.times.modified,
            crtime: attr.times.created,
            kind,
            perm,
            nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }
}

/// Virtual path of `name` inside `parent`
fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Fill `buf` from `stream`, stopping early only at end of stream
fn read_full(stream: &mut dyn ReadStream, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

impl fuser::Filesystem for ResourceFs {
    fn init(&mut self, _req: &Request, _config: &mut fuser::KernelConfig) -> Result<(), c_int> {
        info!(target: "resmount::fuse", "resource filesystem initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        info!(
            target: "resmount::fuse",
            open_handles = self.handles.len(),
            "resource filesystem destroyed"
        );
        self.handles.clear();
    }

    fn forget(&mut self, _req: &Request, ino: u64, _nlookup: u64) {
        self.forget_inode(ino);
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            reply.error(ENOENT);
            return;
        };
        if name.len() > NAME_MAX {
            reply.error(ENAMETOOLONG);
            return;
        }
        let Some(parent_path) = self.inode_to_path(parent) else {
            reply.error(ENOENT);
            return;
        };

        let path = child_path(parent_path, name);
        match self.callbacks.attributes(&path) {
            Ok(attr) => {
                let ino = self.get_or_alloc_inode(&path);
                let fuse_attr = self.attr_to_fuse(&attr, ino);
                reply.entry(&self.ttl, &fuse_attr, 0);
            }
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let Some(path) = self.inode_to_path(ino) else {
            reply.error(ENOENT);
            return;
        };
        match self.callbacks.attributes(path) {
            Ok(attr) => reply.attr(&self.ttl, &self.attr_to_fuse(&attr, ino)),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, flags: i32, reply: ReplyOpen) {
        if flags & O_ACCMODE != O_RDONLY {
            reply.error(errno(&MountError::ReadOnly));
            return;
        }
        let Some(path) = self.inode_to_path(ino).map(str::to_string) else {
            reply.error(ENOENT);
            return;
        };

        match self.callbacks.open(&path) {
            Ok(stream) => {
                let fh = self.next_fh;
                self.next_fh += 1;
                self.handles.insert(fh, stream);
                // Lengths may be unknown, so bypass the page cache and let
                // reads run until the stream ends.
                reply.opened(fh, fuser::consts::FOPEN_DIRECT_IO);
            }
            Err(err) => {
                debug!(target: "resmount::fuse", %path, %err, "open failed");
                reply.error(errno(&err));
            }
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(stream) = self.handles.get_mut(&fh) else {
            reply.error(EBADF);
            return;
        };

        let mut buf = vec![0u8; size as usize];
        let result = stream
            .seek(SeekFrom::Start(offset.max(0) as u64))
            .and_then(|_| read_full(stream.as_mut(), &mut buf));
        match result {
            Ok(bytes_read) => {
                buf.truncate(bytes_read);
                reply.data(&buf);
            }
            Err(err) => {
                warn!(target: "resmount::fuse", ino, fh, %err, "resource read failed");
                reply.error(err.raw_os_error().unwrap_or(EIO));
            }
        }
    }

    fn release(
        &mut self,
        _req: &Request,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        self.handles.remove(&fh);
        reply.ok();
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.inode_to_path(ino).map(str::to_string) else {
            reply.error(ENOENT);
            return;
        };

        let entries = match self.callbacks.list(&path) {
            Ok(entries) => entries,
            Err(err) => {
                reply.error(errno(&err));
                return;
            }
        };

        let listing = self.listing(ino, &path, entries);
        for (i, (entry_ino, kind, name)) in listing.iter().enumerate().skip(offset as usize) {
            if reply.add(*entry_ino, (i + 1) as i64, *kind, name) {
                break;
            }
        }
        reply.ok();
    }
}
