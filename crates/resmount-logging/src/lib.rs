// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Logging setup shared by the resource mounting binaries
//!
//! Library crates only emit `tracing` events; binaries pick console or file
//! output and the format through [`CliLoggingArgs`], optionally seeded from
//! a config file section ([`LoggingConfig`]).

pub mod logging_config;

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use logging_config::LoggingConfig;

// Re-export clap for convenience when using CliLoggingArgs
pub use clap;

// Re-export Level for convenience
pub use tracing::Level;

/// Output format for log messages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable plaintext format
    #[default]
    Plaintext,
    /// Structured JSON format
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Plaintext => write!(f, "plaintext"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plaintext" => Ok(LogFormat::Plaintext),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!(
                "Invalid log format: {}. Use 'plaintext' or 'json'",
                s
            )),
        }
    }
}

/// CLI log level enum for clap integration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CliLogLevel {
    /// Only error conditions
    Error,
    /// Errors and warnings
    Warn,
    /// Errors, warnings, and informational messages
    #[default]
    Info,
    /// All above plus debug information
    Debug,
    /// All above plus detailed tracing
    Trace,
}

impl From<CliLogLevel> for Level {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliLogLevel::Error => write!(f, "error"),
            CliLogLevel::Warn => write!(f, "warn"),
            CliLogLevel::Info => write!(f, "info"),
            CliLogLevel::Debug => write!(f, "debug"),
            CliLogLevel::Trace => write!(f, "trace"),
        }
    }
}

/// Logging arguments for `#[command(flatten)]` in binary argument structs.
///
/// Logs go to the console unless `--log-file` or `--log-dir` is given.
#[derive(Clone, Debug, Default, clap::Args, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CliLoggingArgs {
    /// Log verbosity level
    #[arg(long, value_enum, help = "Log verbosity level (default: info)")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<CliLogLevel>,

    /// Log output format
    #[arg(long, value_enum, help = "Log output format (default: plaintext)")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<LogFormat>,

    /// Directory for log files
    #[arg(long, help = "Directory for log files (default: platform specific)")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Log filename
    #[arg(long, help = "Log filename")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

impl CliLoggingArgs {
    /// Fill options not given on the command line from a config section.
    /// Command line values win.
    pub fn with_config_defaults(mut self, config: &LoggingConfig) -> Self {
        self.log_level = self.log_level.or(config.level);
        self.log_format = self.log_format.or(config.format);
        if self.log_dir.is_none() {
            self.log_dir = config.dir.clone();
        }
        self
    }

    /// Initialize the global subscriber for `component`
    pub fn init(self, component: &str) -> anyhow::Result<()> {
        let level = self.log_level.unwrap_or_default().into();
        let format = self.log_format.unwrap_or_default();

        if self.logs_to_file() {
            let log_path = self.resolve_log_path(component);
            init_to_file(component, level, format, &log_path)
        } else {
            init(component, level, format)
        }
    }

    pub fn logs_to_file(&self) -> bool {
        self.log_file.is_some() || self.log_dir.is_some()
    }

    /// Resolve the log file path:
    /// 1. an absolute `log_file` is used as is
    /// 2. a relative `log_file` is placed under `log_dir` when given
    /// 3. `log_dir` alone gets `<component>.log`
    /// 4. otherwise the platform standard location
    pub fn resolve_log_path(&self, component: &str) -> PathBuf {
        match (&self.log_file, &self.log_dir) {
            (Some(file), _) if Path::new(file).is_absolute() => PathBuf::from(file),
            (Some(file), Some(dir)) => Path::new(dir).join(file),
            (Some(file), None) => PathBuf::from(file),
            (None, Some(dir)) => Path::new(dir).join(format!("{}.log", component)),
            (None, None) => get_standard_log_path_for_component(component),
        }
    }
}

/// Standard log file path for a component:
/// - Windows: %APPDATA%\resmount\<component>.log
/// - macOS: ~/Library/Logs/resmount/<component>.log
/// - Linux: ~/.local/share/resmount/<component>.log
pub fn get_standard_log_path_for_component(component: &str) -> PathBuf {
    let filename = format!("{}.log", component);

    #[cfg(target_os = "macos")]
    let base = dirs::home_dir()
        .map(|home| home.join("Library").join("Logs"))
        .unwrap_or_else(std::env::temp_dir);

    #[cfg(not(target_os = "macos"))]
    let base = dirs::data_dir().or_else(dirs::home_dir).unwrap_or_else(std::env::temp_dir);

    base.join("resmount").join(filename)
}

/// Initialize console logging
pub fn init(component: &str, default_level: Level, format: LogFormat) -> anyhow::Result<()> {
    init_with_writer(component, default_level, format, io::stdout)
}

/// Initialize logging to `log_path`, creating parent directories
pub fn init_to_file(
    component: &str,
    default_level: Level,
    format: LogFormat,
    log_path: &Path,
) -> anyhow::Result<()> {
    use std::fs;

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let log_file = fs::OpenOptions::new().create(true).append(true).open(log_path)?;

    init_with_writer(component, default_level, format, log_file)
}

/// Initialize logging with a custom writer. `RUST_LOG` overrides the
/// default level when set.
pub fn init_with_writer<W>(
    component: &str,
    default_level: Level,
    format: LogFormat,
    writer: W,
) -> anyhow::Result<()>
where
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(component, default_level)));

    match format {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).json();
            #[cfg(debug_assertions)]
            let layer = layer.with_file(true).with_line_number(true);

            tracing_subscriber::registry().with(filter).with(layer).try_init()?;
        }
        LogFormat::Plaintext => {
            let layer = tracing_subscriber::fmt::layer().with_writer(writer);
            #[cfg(debug_assertions)]
            let layer = layer.with_file(true).with_line_number(true);

            tracing_subscriber::registry().with(filter).with(layer).try_init()?;
        }
    }

    Ok(())
}

/// Filter directives enabling `default_level` globally and for the
/// component's own target. Targets use underscores even when the binary
/// name has dashes.
fn default_directives(component: &str, default_level: Level) -> String {
    format!(
        "{},{}={}",
        default_level,
        component.replace('-', "_"),
        default_level
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("plaintext".parse::<LogFormat>().unwrap(), LogFormat::Plaintext);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_cli_log_level_conversion() {
        assert_eq!(Level::from(CliLogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(CliLogLevel::Warn), Level::WARN);
        assert_eq!(Level::from(CliLogLevel::Info), Level::INFO);
        assert_eq!(Level::from(CliLogLevel::Debug), Level::DEBUG);
        assert_eq!(Level::from(CliLogLevel::Trace), Level::TRACE);
        assert_eq!(CliLogLevel::default(), CliLogLevel::Info);
        assert_eq!(CliLogLevel::Debug.to_string(), "debug");
    }

    #[test]
    fn test_console_unless_file_options() {
        assert!(!CliLoggingArgs::default().logs_to_file());
        let args = CliLoggingArgs {
            log_dir: Some("/var/log".into()),
            ..Default::default()
        };
        assert!(args.logs_to_file());
    }

    #[test]
    fn test_resolve_log_path() {
        let dir_only = CliLoggingArgs {
            log_dir: Some("/var/log/resmount".into()),
            ..Default::default()
        };
        assert_eq!(
            dir_only.resolve_log_path("resmount-fuse-host"),
            PathBuf::from("/var/log/resmount/resmount-fuse-host.log")
        );

        let relative = CliLoggingArgs {
            log_dir: Some("/var/log".into()),
            log_file: Some("host.log".into()),
            ..Default::default()
        };
        assert_eq!(relative.resolve_log_path("x"), PathBuf::from("/var/log/host.log"));

        let absolute = CliLoggingArgs {
            log_dir: Some("/var/log".into()),
            log_file: Some("/tmp/host.log".into()),
            ..Default::default()
        };
        assert_eq!(absolute.resolve_log_path("x"), PathBuf::from("/tmp/host.log"));
    }

    #[test]
    fn test_standard_log_path_for_component() {
        let path = get_standard_log_path_for_component("resmount-fuse-host");
        assert!(path.ends_with("resmount/resmount-fuse-host.log"));
    }

    #[test]
    fn test_config_fills_unset_options_only() {
        let config = LoggingConfig {
            level: Some(CliLogLevel::Debug),
            format: Some(LogFormat::Json),
            dir: Some("/srv/logs".into()),
        };
        let args = CliLoggingArgs {
            log_level: Some(CliLogLevel::Warn),
            ..Default::default()
        }
        .with_config_defaults(&config);

        assert_eq!(args.log_level, Some(CliLogLevel::Warn));
        assert_eq!(args.log_format, Some(LogFormat::Json));
        assert_eq!(args.log_dir.as_deref(), Some("/srv/logs"));
    }

    #[test]
    fn test_default_directives_use_target_names() {
        assert_eq!(
            default_directives("resmount-fuse-host", Level::DEBUG),
            "DEBUG,resmount_fuse_host=DEBUG"
        );
    }
}
