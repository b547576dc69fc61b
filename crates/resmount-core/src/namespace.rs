// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory namespace of mounted resources
//!
//! The tree is an arena: root directories are a set of names and every
//! mounted resource lives in one map keyed by `(root name, child name)`.
//! Nothing points back to a parent, so there is no ownership cycle to manage
//! and a whole root can be dropped with a single pass over the arena.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{MountError, MountResult};
use crate::types::{Attributes, DirEntry, MountPoint, ResourceAccessor, ResourceKind};

/// A mounted file or directory
#[derive(Clone)]
pub struct VirtualResource {
    name: String,
    kind: ResourceKind,
    len: u64,
    accessor: Arc<dyn ResourceAccessor>,
}

impl VirtualResource {
    /// Wrap an accessor. Kind and length are captured once so that attribute
    /// callbacks never reach into the accessor while the tree is locked.
    pub fn new(accessor: Arc<dyn ResourceAccessor>) -> Self {
        let kind = ResourceKind::of(accessor.as_ref());
        let len = match kind {
            ResourceKind::File => accessor.size().unwrap_or(0),
            ResourceKind::Directory => 0,
        };
        Self {
            name: accessor.resource_name().to_string(),
            kind,
            len,
            accessor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn accessor(&self) -> &Arc<dyn ResourceAccessor> {
        &self.accessor
    }

    pub fn attributes(&self) -> Attributes {
        match self.kind {
            ResourceKind::File => Attributes::file(self.len),
            ResourceKind::Directory => Attributes::directory(),
        }
    }
}

impl std::fmt::Debug for VirtualResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualResource")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("len", &self.len)
            .finish()
    }
}

/// Arena key of a mounted resource
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey {
    pub root: String,
    pub name: String,
}

impl NodeKey {
    pub fn new(root: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }

    /// Smallest key under `root`; the empty name sorts before any real one.
    fn first_in(root: &str) -> Self {
        Self::new(root, String::new())
    }
}

/// A path on the volume, split into its meaningful parts
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VolumePath {
    /// The drive root itself
    Volume,
    /// A root directory
    Root(String),
    /// A mounted resource, plus any components below it when it is a
    /// directory resource
    Resource {
        key: NodeKey,
        rest: Vec<String>,
    },
}

impl VolumePath {
    /// Parse a path relative to the volume root. Both separators are
    /// accepted and empty components are ignored, so `\lib\a.mkv`,
    /// `/lib/a.mkv` and `lib/a.mkv` are equivalent.
    pub fn parse(path: &str) -> MountResult<Self> {
        let mut segments = Vec::new();
        for segment in path.split(|c| c == '\\' || c == '/') {
            match segment {
                "" => continue,
                "." | ".." => return Err(MountError::InvalidPath(path.to_string())),
                s => segments.push(s.to_string()),
            }
        }

        let mut iter = segments.into_iter();
        let Some(root) = iter.next() else {
            return Ok(VolumePath::Volume);
        };
        let Some(name) = iter.next() else {
            return Ok(VolumePath::Root(root));
        };
        Ok(VolumePath::Resource {
            key: NodeKey::new(root, name),
            rest: iter.collect(),
        })
    }
}

/// Mounted roots and resources of one volume
#[derive(Debug)]
pub struct NamespaceTree {
    mount_point: MountPoint,
    roots: BTreeSet<String>,
    nodes: BTreeMap<NodeKey, VirtualResource>,
}

impl NamespaceTree {
    pub fn new(mount_point: MountPoint) -> Self {
        Self {
            mount_point,
            roots: BTreeSet::new(),
            nodes: BTreeMap::new(),
        }
    }

    pub fn mount_point(&self) -> MountPoint {
        self.mount_point
    }

    /// Register an empty root. An existing root of the same name is replaced
    /// and everything mounted under it is released.
    pub fn create_root(&mut self, name: &str) -> String {
        if !self.roots.insert(name.to_string()) {
            self.nodes.retain(|key, _| key.root != name);
        }
        self.mount_point.join(&[name])
    }

    /// Drop a root and all its resources; `false` if it was unknown.
    pub fn dispose_root(&mut self, name: &str) -> bool {
        if !self.roots.remove(name) {
            return false;
        }
        self.nodes.retain(|key, _| key.root != name);
        true
    }

    pub fn has_root(&self, name: &str) -> bool {
        self.roots.contains(name)
    }

    pub fn root_names(&self) -> Vec<String> {
        self.roots.iter().cloned().collect()
    }

    /// Mount `resource` under `root`, replacing a sibling with the same
    /// name. Returns the externally visible path, or `None` when the root is
    /// unknown.
    pub fn add_resource(&mut self, root: &str, resource: VirtualResource) -> Option<String> {
        if !self.roots.contains(root) {
            return None;
        }
        let path = self.mount_point.join(&[root, resource.name()]);
        self.nodes.insert(NodeKey::new(root, resource.name()), resource);
        Some(path)
    }

    /// Detach the resource called `name` under `root`, handing it back so
    /// the caller decides when to release it.
    pub fn remove_resource(&mut self, root: &str, name: &str) -> Option<VirtualResource> {
        self.nodes.remove(&NodeKey::new(root, name))
    }

    pub fn lookup(&self, key: &NodeKey) -> Option<&VirtualResource> {
        self.nodes.get(key)
    }

    /// Resources mounted under `root`, in name order
    pub fn children<'a>(&'a self, root: &'a str) -> impl Iterator<Item = &'a VirtualResource> + 'a {
        self.nodes
            .range(NodeKey::first_in(root)..)
            .take_while(move |(key, _)| key.root == root)
            .map(|(_, resource)| resource)
    }

    /// Accessors mounted under `root`, or `None` for an unknown root
    pub fn resources(&self, root: &str) -> Option<Vec<Arc<dyn ResourceAccessor>>> {
        if !self.roots.contains(root) {
            return None;
        }
        Some(self.children(root).map(|r| Arc::clone(r.accessor())).collect())
    }

    /// Directory listing of the volume root or of a root directory
    pub fn list(&self, path: &VolumePath) -> MountResult<Vec<DirEntry>> {
        match path {
            VolumePath::Volume => Ok(self
                .roots
                .iter()
                .map(|name| DirEntry::new(name.clone(), Attributes::directory()))
                .collect()),
            VolumePath::Root(root) => {
                if !self.roots.contains(root) {
                    return Err(MountError::NotFound);
                }
                Ok(self
                    .children(root)
                    .map(|r| DirEntry::new(r.name(), r.attributes()))
                    .collect())
            }
            VolumePath::Resource { .. } => Err(MountError::InvalidPath(format!("{:?}", path))),
        }
    }

    /// Total number of mounted resources across all roots
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.nodes.is_empty()
    }

    /// Forget every root and resource
    pub fn clear(&mut self) {
        self.roots.clear();
        self.nodes.clear();
    }
}
