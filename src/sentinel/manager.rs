//! Manager context
//!
//! Everything one invocation needs: the deployment's pods, a way to reach
//! nodes, and the walk settings. Built once at startup and passed by
//! reference into every operation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::config::{PodConfig, SentinelConfig};
use super::link::{Connector, MasterInfo, SentinelLink};
use super::walker::QuorumWalker;
use crate::config::ManagerSettings;
use crate::error::{Error, Result};

pub struct Manager {
    config: SentinelConfig,
    connector: Arc<dyn Connector>,
    node_timeout: Duration,
    concurrency: usize,
    walk_pods: bool,
    archive_dir: PathBuf,
}

impl Manager {
    pub fn new(
        config: SentinelConfig,
        connector: Arc<dyn Connector>,
        settings: &ManagerSettings,
    ) -> Self {
        Self {
            config,
            connector,
            node_timeout: settings.node_timeout,
            concurrency: settings.concurrency,
            walk_pods: settings.walk_pods,
            archive_dir: settings.archive_dir.clone(),
        }
    }

    pub fn config(&self) -> &SentinelConfig {
        &self.config
    }

    pub fn pod(&self, name: &str) -> Result<&PodConfig> {
        self.config.get_pod(name)
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Pods the target sentinel monitors
    pub async fn list_pods(&self, target: &str) -> Result<Vec<MasterInfo>> {
        let mut link = self.dial_target(target).await?;
        link.sentinel_masters().await
    }

    pub(crate) fn walker(&self) -> QuorumWalker<'_> {
        QuorumWalker::new(self.connector.as_ref(), self.node_timeout, self.concurrency)
    }

    /// Password presented to sentinels
    pub(crate) fn sentinel_password(&self) -> Option<&str> {
        self.config.sentinel_pass.as_deref()
    }

    /// Open a link to the sentinel an operation targets
    pub(crate) async fn dial_target(&self, target: &str) -> Result<Box<dyn SentinelLink>> {
        match tokio::time::timeout(
            self.node_timeout,
            self.connector.dial(target, self.sentinel_password()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                addr: target.to_string(),
                after: self.node_timeout,
            }),
        }
    }

    /// Sentinels a per-pod operation should reach: the target alone, or every
    /// configured sentinel of the pod when pod walking is enabled.
    pub(crate) fn sentinels_for(&self, pod: &str, target: &str) -> Vec<String> {
        if self.walk_pods {
            match self.config.get_pod(pod).and_then(|p| p.sentinels()) {
                Ok(sentinels) => return sentinels.to_vec(),
                Err(e) => log::warn!("{}; using {} only", e, target),
            }
        }
        vec![target.to_string()]
    }
}
