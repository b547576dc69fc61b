// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the resource mounting core

use std::io;

/// Errors surfaced to driver callbacks.
///
/// The public mutation API of [`crate::ResourceMountingService`] never
/// returns these; it reports "not mounted" and "unknown root" as `None` or
/// no-ops. Only the filesystem callback path needs a failure taxonomy that a
/// driver can translate into OS status codes.
#[derive(thiserror::Error, Debug)]
pub enum MountError {
    #[error("not found")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("read-only volume")]
    ReadOnly,
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("driver error: {0}")]
    Driver(String),
}

pub type MountResult<T> = Result<T, MountError>;

/// Errors raised while loading or persisting mount settings
#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("reading settings file {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("writing settings file {path}: {source}")]
    Write { path: String, source: io::Error },
    #[error("parsing settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serializing settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid drive letter {0:?}")]
    InvalidDriveLetter(char),
}
