//! Process configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::sentinel::link::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT};

/// Environment variable naming the sentinel.conf to load
pub const CONFIG_ENV: &str = "SENTINEL_MANAGER_CONFIG";

/// Settings that apply to one invocation of the manager
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// sentinel.conf describing the deployment
    pub sentinel_config_file: Option<PathBuf>,
    /// Host of the sentinel to operate on
    pub sentinel_host: String,
    /// Port of the sentinel to operate on (default: 26379)
    pub sentinel_port: u16,
    /// Also operate on every known sentinel of each pod
    pub walk_pods: bool,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Timeout for a single command on a connected node
    pub command_timeout: Duration,
    /// Upper bound on one node visit (dial plus all commands)
    pub node_timeout: Duration,
    /// Nodes contacted at once during a walk (1 = sequential)
    pub concurrency: usize,
    /// Directory archive files are written to
    pub archive_dir: PathBuf,
    /// Log level (debug, verbose, notice, warning, nothing)
    pub loglevel: String,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            sentinel_config_file: None,
            sentinel_host: "localhost".to_string(),
            sentinel_port: 26379,
            walk_pods: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            node_timeout: DEFAULT_CONNECT_TIMEOUT + DEFAULT_COMMAND_TIMEOUT,
            concurrency: 1,
            archive_dir: PathBuf::from("."),
            loglevel: "notice".to_string(),
        }
    }
}

impl ManagerSettings {
    /// `host:port` of the sentinel to operate on
    pub fn target(&self) -> String {
        format!("{}:{}", self.sentinel_host, self.sentinel_port)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be at least 1".to_string());
        }
        if self.connect_timeout.is_zero() || self.command_timeout.is_zero() {
            return Err("timeouts must be non-zero".to_string());
        }
        if self.node_timeout < self.connect_timeout {
            return Err("node timeout must not be shorter than the connect timeout".to_string());
        }
        Ok(())
    }
}
