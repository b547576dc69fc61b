// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Logging configuration types

use serde::{Deserialize, Serialize};

use crate::{CliLogLevel, LogFormat};

/// `[logging]` section of a host config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    /// Logging verbosity level
    #[serde(rename = "log-level", default)]
    pub level: Option<CliLogLevel>,
    /// Output format
    #[serde(rename = "log-format", default)]
    pub format: Option<LogFormat>,
    /// Directory for log files; enables file logging
    #[serde(rename = "log-dir", default)]
    pub dir: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kebab_case_keys() {
        let config: LoggingConfig =
            serde_json::from_str(r#"{"log-level": "debug", "log-format": "json"}"#).unwrap();
        assert_eq!(config.level, Some(CliLogLevel::Debug));
        assert_eq!(config.format, Some(LogFormat::Json));
        assert_eq!(config.dir, None);
    }
}
