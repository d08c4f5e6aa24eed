//! CLI argument definitions for logpilot-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use logpilot_core::config::LogpilotConfig;

/// logpilot sidecar daemon.
///
/// Watches container lifecycle events, renders per-container fluentd
/// configuration from container labels, and supervises the fluentd process.
#[derive(Parser, Debug, Default)]
#[command(name = "logpilot-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logpilot.toml configuration file.
    ///
    /// Without it, built-in defaults plus `LOGPILOT_*` environment overrides are used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host root directory prefixed to every resolved log directory.
    ///
    /// Takes precedence over `pilot.host_root`.
    #[arg(long)]
    pub base: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut LogpilotConfig) {
        if let Some(base) = &self.base {
            config.pilot.host_root.clone_from(base);
        }
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
    }
}
