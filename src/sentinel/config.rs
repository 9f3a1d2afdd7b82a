//! Pod Model
//!
//! Pods (monitored master/replica sets) and the sentinel deployment that
//! watches them, as read from configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// One monitored pod
#[derive(Debug, Clone, PartialEq)]
pub struct PodConfig {
    /// Pod name, unique within a deployment
    pub name: String,
    /// Master IP address or hostname
    pub master_ip: String,
    /// Master port
    pub master_port: u16,
    /// Password used for the master and its replicas
    pub auth_pass: Option<String>,
    /// Quorum for ODOWN detection
    pub quorum: u32,
    /// Replica addresses (`host:port`) known from configuration
    pub known_replicas: Vec<String>,
    /// Sentinel addresses (`host:port`) known from configuration
    pub known_sentinels: Vec<String>,
    pub client_reconfig_script: Option<PathBuf>,
    pub notification_script: Option<PathBuf>,
}

impl Default for PodConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            master_ip: String::new(),
            master_port: 6379,
            auth_pass: None,
            quorum: 2,
            known_replicas: Vec::new(),
            known_sentinels: Vec::new(),
            client_reconfig_script: None,
            notification_script: None,
        }
    }
}

impl PodConfig {
    /// Create a new pod config with required fields
    pub fn new(name: impl Into<String>, ip: impl Into<String>, port: u16, quorum: u32) -> Self {
        Self {
            name: name.into(),
            master_ip: ip.into(),
            master_port: port,
            quorum,
            ..Default::default()
        }
    }

    /// Master address as `host:port`
    pub fn master_addr(&self) -> String {
        format!("{}:{}", self.master_ip, self.master_port)
    }

    /// Known sentinels, in configuration order. Empty is an error.
    pub fn sentinels(&self) -> Result<&[String]> {
        if self.known_sentinels.is_empty() {
            return Err(Error::NoSentinels(self.name.clone()));
        }
        Ok(&self.known_sentinels)
    }

    pub(crate) fn add_replica(&mut self, addr: String) {
        if !self.known_replicas.contains(&addr) {
            self.known_replicas.push(addr);
        }
    }

    pub(crate) fn add_sentinel(&mut self, addr: String) {
        if !self.known_sentinels.contains(&addr) {
            self.known_sentinels.push(addr);
        }
    }
}

/// All pods of one sentinel deployment
#[derive(Debug, Clone, Default)]
pub struct SentinelConfig {
    /// Password for authenticating with other Sentinels
    pub sentinel_pass: Option<String>,
    /// Monitored pods by name
    pub pods: BTreeMap<String, PodConfig>,
}

impl SentinelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a pod
    pub fn add_pod(&mut self, pod: PodConfig) {
        self.pods.insert(pod.name.clone(), pod);
    }

    pub fn get_pod(&self, name: &str) -> Result<&PodConfig> {
        self.pods
            .get(name)
            .ok_or_else(|| Error::UnknownPod(name.to_string()))
    }

    pub(crate) fn get_pod_mut(&mut self, name: &str) -> Option<&mut PodConfig> {
        self.pods.get_mut(name)
    }

    /// Pods ordered by name
    pub fn pods(&self) -> impl Iterator<Item = &PodConfig> {
        self.pods.values()
    }
}
