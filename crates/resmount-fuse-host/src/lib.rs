// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! FUSE host for the resource mounting service
//!
//! Each drive letter becomes a directory under a mount base
//! (`<mount_base>/R`), mounted read-only through libfuse. Builds without
//! the `fuse` feature get [`UnavailableDriver`], which makes the service
//! run in its disabled mode.

#[cfg(all(feature = "fuse", target_os = "linux"))]
mod adapter;
pub mod config;
pub mod driver;
pub mod errno;
pub mod local;
pub mod paths;

pub use config::{load_config, FuseHostConfig};
#[cfg(all(feature = "fuse", target_os = "linux"))]
pub use driver::FuseDriver;
pub use driver::{build_driver, UnavailableDriver};
pub use errno::errno;
pub use local::LocalFsAccessor;
pub use paths::host_path;
