// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

#[cfg(target_os = "linux")]
mod linux_tests {
    use std::process::Command;

    #[test]
    fn fuse_host_binary_help_runs() {
        // Running with --help must not attempt a mount
        let output = Command::new(env!("CARGO_BIN_EXE_resmount-fuse-host"))
            .arg("--help")
            .output()
            .expect("able to execute resmount-fuse-host");

        assert!(output.status.success(), "--help should succeed");
        let help = String::from_utf8_lossy(&output.stdout);
        assert!(help.contains("--expose"));
        assert!(help.contains("--log-level"));
    }

    #[test]
    fn fuse_host_rejects_malformed_exposure() {
        let status = Command::new(env!("CARGO_BIN_EXE_resmount-fuse-host"))
            .args(["--expose", "no-separator"])
            .status()
            .expect("able to execute resmount-fuse-host");

        assert!(!status.success());
    }
}
