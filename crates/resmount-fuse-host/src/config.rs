// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Host configuration file (JSON)

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use resmount_core::SystemRole;
use resmount_logging::LoggingConfig;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FuseHostConfig {
    /// Directory under which each drive letter is mounted
    pub mount_base: Option<PathBuf>,
    /// Let other users see the volume (needs `user_allow_other` in fuse.conf)
    pub allow_other: bool,
    /// Deployment role, selects the default drive letter
    pub role: SystemRole,
    /// Settings file holding the chosen drive letter
    pub settings: Option<PathBuf>,
    /// Root name -> local directory whose entries are exposed under it
    pub roots: BTreeMap<String, PathBuf>,
    pub logging: LoggingConfig,
}

impl FuseHostConfig {
    pub fn mount_base(&self) -> PathBuf {
        self.mount_base.clone().unwrap_or_else(default_mount_base)
    }
}

/// `$XDG_RUNTIME_DIR/resmount`, or the temp dir when there is none
pub fn default_mount_base() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("resmount")
}

pub fn load_config(config_path: Option<&Path>) -> Result<FuseHostConfig> {
    match config_path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing config file {}", path.display()))
        }
        None => Ok(FuseHostConfig::default()),
    }
}
