use crate::config::{CONFIG_ENV, ManagerSettings};
use clap::{Parser, Subcommand};

use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "sentinel-manager")]
#[command(version)]
#[command(about = "Manage pods, directives and health checks across Redis Sentinels", long_about = None)]
pub struct Cli {
    /// Host of the sentinel to operate on (default: localhost)
    #[arg(long)]
    pub address: Option<String>,

    /// Port of the sentinel to operate on (default: 26379)
    #[arg(long)]
    pub port: Option<u16>,

    /// Also operate on every known sentinel of each pod
    #[arg(long)]
    pub walkpod: bool,

    /// sentinel.conf describing the deployment
    #[arg(long, env = "SENTINEL_MANAGER_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level (debug, verbose, notice, warning, nothing)
    #[arg(long)]
    pub loglevel: Option<String>,

    /// TCP connect timeout in milliseconds (default: 2000)
    #[arg(long, value_name = "MS")]
    pub connect_timeout: Option<u64>,

    /// Per-command timeout in milliseconds (default: 5000)
    #[arg(long, value_name = "MS")]
    pub command_timeout: Option<u64>,

    /// Upper bound on one node visit in milliseconds
    /// (default: connect timeout + command timeout)
    #[arg(long, value_name = "MS")]
    pub node_timeout: Option<u64>,

    /// Sentinels contacted at once during a walk (default: 1)
    #[arg(long)]
    pub concurrency: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start monitoring a pod and configure its password and scripts
    Addpod {
        #[arg(long)]
        name: String,
        /// Master IP address
        #[arg(long)]
        address: String,
        /// Master port
        #[arg(long)]
        port: u16,
        /// Password sentinels use to talk to the pod
        #[arg(long)]
        password: String,
        #[arg(long)]
        quorum: u32,
        #[arg(long)]
        reconfigure_script: Option<String>,
        #[arg(long)]
        notification_script: Option<String>,
    },
    /// Set a directive on every pod the sentinel monitors
    Set { directive: String, value: String },
    /// Set a directive on one pod across all of its sentinels
    Setpod {
        #[arg(long)]
        name: String,
        directive: String,
        value: String,
    },
    /// Reset every configured pod on all of its sentinels
    Reset,
    /// Reset one pod on all of its sentinels
    Resetpod {
        #[arg(long)]
        name: String,
    },
    /// Stop monitoring a pod, optionally archiving its record first
    Removepod {
        #[arg(long)]
        name: String,
        #[arg(long)]
        archive: bool,
        #[arg(long, value_name = "DIR")]
        archive_dir: Option<PathBuf>,
    },
    /// Check the pod's password against its master and replicas
    Checkauth {
        #[arg(long)]
        name: String,
    },
    /// Check that every known sentinel agrees on the pod
    Validate {
        #[arg(long)]
        name: String,
    },
    /// List pods the sentinel monitors
    Pods,
}

impl Command {
    /// Commands that work from the pods in sentinel.conf
    pub fn needs_config(&self) -> bool {
        matches!(
            self,
            Self::Setpod { .. }
                | Self::Reset
                | Self::Resetpod { .. }
                | Self::Checkauth { .. }
                | Self::Validate { .. }
        )
    }
}

impl Cli {
    /// Apply command-line overrides on top of the defaults
    pub fn settings(&self) -> Result<ManagerSettings, String> {
        let mut settings = ManagerSettings::default();

        if let Some(address) = &self.address {
            settings.sentinel_host = address.clone();
        }
        if let Some(port) = self.port {
            settings.sentinel_port = port;
        }
        settings.walk_pods = self.walkpod;
        settings.sentinel_config_file = self.config.clone();
        if let Some(level) = &self.loglevel {
            settings.loglevel = level.clone();
        }

        if let Some(ms) = self.connect_timeout {
            settings.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.command_timeout {
            settings.command_timeout = Duration::from_millis(ms);
        }
        settings.node_timeout = match self.node_timeout {
            Some(ms) => Duration::from_millis(ms),
            None => settings.connect_timeout + settings.command_timeout,
        };
        if let Some(n) = self.concurrency {
            settings.concurrency = n;
        }

        if let Command::Removepod {
            archive_dir: Some(dir),
            ..
        } = &self.command
        {
            settings.archive_dir = dir.clone();
        }

        if self.walkpod && self.config.is_none() {
            return Err(format!(
                "--walkpod needs a sentinel config (--config or {})",
                CONFIG_ENV
            ));
        }
        if self.command.needs_config() && self.config.is_none() {
            return Err(format!(
                "this command needs a sentinel config (--config or {})",
                CONFIG_ENV
            ));
        }

        settings.validate()?;
        Ok(settings)
    }
}
