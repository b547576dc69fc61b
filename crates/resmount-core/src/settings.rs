// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Persisted mount settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::SettingsError;

/// Environment variable overriding the settings file location
pub const SETTINGS_PATH_ENV: &str = "RESMOUNT_SETTINGS";

/// Stored configuration of the mounting service
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceMountingSettings {
    /// Drive letter to mount at. Written with the role default on first
    /// start so operators can find and change it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_letter: Option<char>,
}

/// Backing store for [`ResourceMountingSettings`]
#[cfg_attr(test, mockall::automock)]
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<ResourceMountingSettings, SettingsError>;
    fn save(&self, settings: &ResourceMountingSettings) -> Result<(), SettingsError>;
}

/// Settings kept in a TOML file
#[derive(Clone, Debug)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$RESMOUNT_SETTINGS`, or `<config dir>/resmount/settings.toml`
    pub fn at_default_location() -> Self {
        Self::new(default_settings_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for TomlSettingsStore {
    /// A missing file yields default settings
    fn load(&self) -> Result<ResourceMountingSettings, SettingsError> {
        if !self.path.exists() {
            return Ok(ResourceMountingSettings::default());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| SettingsError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    fn save(&self, settings: &ResourceMountingSettings) -> Result<(), SettingsError> {
        let write_err = |source: std::io::Error| SettingsError::Write {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = toml::to_string_pretty(settings)?;
        std::fs::write(&self.path, content).map_err(write_err)
    }
}

/// Settings held in memory; counts saves so callers can observe persistence
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<ResourceMountingSettings>,
    saves: AtomicUsize,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_drive_letter(letter: char) -> Self {
        Self {
            settings: Mutex::new(ResourceMountingSettings {
                drive_letter: Some(letter),
            }),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> ResourceMountingSettings {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<ResourceMountingSettings, SettingsError> {
        Ok(self.current())
    }

    fn save(&self, settings: &ResourceMountingSettings) -> Result<(), SettingsError> {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn default_settings_path() -> PathBuf {
    if let Ok(path) = std::env::var(SETTINGS_PATH_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("resmount")
        .join("settings.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let store = TomlSettingsStore::new(dir.path().join("settings.toml"));
        assert_eq!(store.load().unwrap(), ResourceMountingSettings::default());
    }

    #[test]
    fn save_creates_parent_dirs_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let store = TomlSettingsStore::new(&path);

        store
            .save(&ResourceMountingSettings {
                drive_letter: Some('S'),
            })
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("drive-letter = \"S\""));
        assert_eq!(store.load().unwrap().drive_letter, Some('S'));
    }

    #[test]
    fn operator_edits_are_picked_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "drive-letter = \"M\"\n").unwrap();

        let store = TomlSettingsStore::new(&path);
        assert_eq!(store.load().unwrap().drive_letter, Some('M'));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "drive-letter = \"too long\"\n").unwrap();

        let store = TomlSettingsStore::new(&path);
        assert!(matches!(store.load(), Err(SettingsError::Parse(_))));
    }

    #[test]
    fn memory_store_counts_saves() {
        let store = MemorySettingsStore::new();
        assert_eq!(store.load().unwrap().drive_letter, None);
        store
            .save(&ResourceMountingSettings {
                drive_letter: Some('R'),
            })
            .unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.current().drive_letter, Some('R'));
    }
}
