// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Resource mounting FUSE host
//!
//! Mounts local directories as roots of the virtual volume and keeps it
//! mounted until Ctrl-C.

use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use anyhow::{Context, Result};
use clap::Parser;
use resmount_core::{MountResolver, ResourceMountingService, SystemRole, TomlSettingsStore};
use resmount_fuse_host::{build_driver, host_path, load_config, LocalFsAccessor};
use resmount_logging::CliLoggingArgs;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "resmount-fuse-host", about = "Expose resources as a read-only mounted volume")]
struct Args {
    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory under which drive letters are mounted
    #[arg(long)]
    mount_base: Option<PathBuf>,

    /// Deployment role; selects the default drive letter
    #[arg(long)]
    role: Option<SystemRole>,

    /// Settings file holding the drive letter (default: platform config dir)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Allow other users to access the filesystem
    #[arg(long)]
    allow_other: bool,

    /// Expose a local directory as a root, as NAME=DIR; repeatable
    #[arg(long = "expose", value_name = "NAME=DIR", value_parser = parse_exposure)]
    expose: Vec<(String, PathBuf)>,

    #[command(flatten)]
    logging: CliLoggingArgs,
}

fn parse_exposure(value: &str) -> Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((name, dir)) if !name.is_empty() && !dir.is_empty() => {
            Ok((name.to_string(), PathBuf::from(dir)))
        }
        _ => Err(format!("expected NAME=DIR, got '{value}'")),
    }
}

/// Register every entry of `dir` under root `name`
fn expose(service: &ResourceMountingService, name: &str, dir: &Path) -> Result<usize> {
    let root_path = service
        .create_root(name)
        .with_context(|| format!("cannot create root '{name}'"))?;
    let entries = LocalFsAccessor::entries_of(dir)
        .with_context(|| format!("listing {}", dir.display()))?;

    let mut mounted = 0;
    for accessor in entries {
        if service.add_resource(name, accessor).is_some() {
            mounted += 1;
        }
    }
    info!(root = name, path = %root_path, source = %dir.display(), mounted, "exposed directory");
    Ok(mounted)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    args.logging
        .with_config_defaults(&config.logging)
        .init("resmount-fuse-host")?;

    if let Some(mount_base) = args.mount_base {
        config.mount_base = Some(mount_base);
    }
    if let Some(role) = args.role {
        config.role = role;
    }
    if let Some(settings) = args.settings {
        config.settings = Some(settings);
    }
    config.allow_other |= args.allow_other;
    config.roots.extend(args.expose);

    info!("Starting resource mounting FUSE host");
    info!("Configuration loaded: {:?}", config);

    let store = match &config.settings {
        Some(path) => TomlSettingsStore::new(path),
        None => TomlSettingsStore::at_default_location(),
    };
    info!("Drive letter settings: {}", store.path().display());

    let resolver = MountResolver::new(Arc::new(store), config.role);
    let service = ResourceMountingService::new(build_driver(&config), resolver);

    if !service.startup() {
        warn!("Volume not mounted; running without virtual resource access");
        return Ok(());
    }

    let mount_base = config.mount_base();
    for (name, dir) in &config.roots {
        if let Err(err) = expose(&service, name, dir) {
            warn!(root = %name, "{err:#}");
        }
    }
    if let Some(root) = service.root_path() {
        if let Some(host) = host_path(&mount_base, &root) {
            info!("Volume {} available at {}", root, host.display());
        }
    }

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("installing Ctrl-C handler")?;
    info!("Mounted; press Ctrl-C to unmount");
    let _ = stop_rx.recv();

    service.shutdown();
    info!("Resource mounting FUSE host stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use resmount_core::testing::FakeDriver;
    use resmount_core::MemorySettingsStore;
    use tempfile::TempDir;

    #[test]
    fn test_parse_exposure() {
        assert_eq!(
            parse_exposure("library=/srv/media").unwrap(),
            ("library".to_string(), PathBuf::from("/srv/media"))
        );
        assert!(parse_exposure("library").is_err());
        assert!(parse_exposure("=/srv").is_err());
    }

    #[test]
    fn test_args_parse_repeatable_exposures() {
        let args = Args::parse_from([
            "resmount-fuse-host",
            "--role",
            "server",
            "--expose",
            "a=/tmp/a",
            "--expose",
            "b=/tmp/b",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.role, Some(SystemRole::Server));
        assert_eq!(args.expose.len(), 2);
        assert!(args.logging.log_level.is_some());
    }

    #[test]
    fn test_expose_mounts_directory_entries() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.mkv"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("album")).unwrap();

        let resolver = MountResolver::new(Arc::new(MemorySettingsStore::new()), SystemRole::Client);
        let service = ResourceMountingService::new(Arc::new(FakeDriver::new()), resolver);
        assert!(service.startup());

        let dir_path = dir.path().to_path_buf();
        assert_eq!(expose(&service, "library", &dir_path).unwrap(), 2);
        assert!(service.is_virtual_resource("R:\\library\\a.mkv"));
        assert_eq!(service.list_resources("library").unwrap().len(), 2);
    }
}
