// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use libc::{c_int, EINVAL, EIO, EISDIR, ENOENT, ENOTDIR, EROFS};
use resmount_core::MountError;

/// errno reported to the kernel for a callback failure
pub fn errno(err: &MountError) -> c_int {
    match err {
        MountError::NotFound => ENOENT,
        MountError::NotADirectory => ENOTDIR,
        MountError::IsADirectory => EISDIR,
        MountError::ReadOnly => EROFS,
        MountError::InvalidPath(_) => EINVAL,
        MountError::Io(io) => io.raw_os_error().unwrap_or(EIO),
        MountError::Driver(_) => EIO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn maps_taxonomy_to_errno() {
        assert_eq!(errno(&MountError::NotFound), ENOENT);
        assert_eq!(errno(&MountError::NotADirectory), ENOTDIR);
        assert_eq!(errno(&MountError::IsADirectory), EISDIR);
        assert_eq!(errno(&MountError::ReadOnly), EROFS);
        assert_eq!(errno(&MountError::InvalidPath("..".into())), EINVAL);
    }

    #[test]
    fn io_errors_keep_os_code() {
        let denied = MountError::Io(io::Error::from_raw_os_error(libc::EACCES));
        assert_eq!(errno(&denied), libc::EACCES);

        let opaque = MountError::Io(io::Error::new(io::ErrorKind::Other, "share offline"));
        assert_eq!(errno(&opaque), EIO);
    }
}
