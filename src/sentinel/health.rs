//! Health Validator
//!
//! Read-only checks against a live pod:
//! - auth/reachability of the master and every reachable replica
//! - agreement of every known sentinel about the pod's identity
//!
//! Reports are built fresh on every call. Topology can change between calls.

use std::collections::BTreeMap;

use super::config::PodConfig;
use super::link::MasterInfo;
use super::manager::Manager;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Master,
    Replica,
}

/// Health of one node that took part in the check
#[derive(Debug)]
pub struct NodeHealth {
    pub address: String,
    pub role: NodeRole,
    pub error: Option<Error>,
}

impl NodeHealth {
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of [`Manager::check_auth`]
#[derive(Debug)]
pub struct HealthReport {
    pub pod: String,
    /// Master first, then every replica that answered, in configuration order
    pub nodes: Vec<NodeHealth>,
}

impl HealthReport {
    pub fn master(&self) -> Option<&NodeHealth> {
        self.nodes.iter().find(|n| n.role == NodeRole::Master)
    }

    pub fn replicas(&self) -> impl Iterator<Item = &NodeHealth> {
        self.nodes.iter().filter(|n| n.role == NodeRole::Replica)
    }

    pub fn is_valid(&self) -> bool {
        self.nodes.iter().all(NodeHealth::ok)
    }

    /// Node address -> passed
    pub fn as_map(&self) -> BTreeMap<String, bool> {
        self.nodes
            .iter()
            .map(|n| (n.address.clone(), n.ok()))
            .collect()
    }

    pub fn ensure(self) -> Result<Self> {
        let failed = self.nodes.iter().filter(|n| !n.ok()).count();
        if failed == 0 {
            Ok(self)
        } else {
            Err(Error::Unhealthy {
                pod: self.pod,
                failed,
            })
        }
    }
}

/// Outcome of [`Manager::validate_sentinels`]
#[derive(Debug)]
pub struct SentinelAgreement {
    pub pod: String,
    /// Configured sentinel count
    pub total: usize,
    /// Sentinels that returned this pod's master record
    pub confirmed: Vec<String>,
    /// Sentinels that answered with a different pod
    pub anomalies: Vec<String>,
    /// Every sentinel that did not confirm, with the reason
    pub failures: Vec<(String, Error)>,
}

impl SentinelAgreement {
    pub fn is_valid(&self) -> bool {
        self.confirmed.len() == self.total
    }

    pub fn ensure(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(Error::SentinelDisagreement {
                confirmed: self.confirmed.len(),
                total: self.total,
            })
        }
    }
}

impl Manager {
    /// Connect to the master with the pod's credentials and PING it, then
    /// PING every replica that can be reached.
    pub async fn check_auth(&self, pod: &str) -> Result<HealthReport> {
        let pod = self.pod(pod)?;
        Ok(self.check_pod_auth(pod).await)
    }

    pub async fn check_pod_auth(&self, pod: &PodConfig) -> HealthReport {
        let mut targets = Vec::with_capacity(pod.known_replicas.len() + 1);
        targets.push(pod.master_addr());
        targets.extend(pod.known_replicas.iter().cloned());

        let report = self
            .walker()
            .walk(&targets, pod.auth_pass.as_deref(), |mut link| async move {
                link.ping().await
            })
            .await;

        let mut nodes = Vec::with_capacity(report.outcomes.len());
        for (i, outcome) in report.outcomes.into_iter().enumerate() {
            let error = outcome.result.err();
            if i == 0 {
                match &error {
                    Some(e @ Error::Authentication { .. }) => {
                        log::error!("pod '{}' master rejected credentials: {}", pod.name, e)
                    }
                    Some(e) => log::error!("pod '{}' master unusable: {}", pod.name, e),
                    None => {}
                }
                nodes.push(NodeHealth {
                    address: outcome.address,
                    role: NodeRole::Master,
                    error,
                });
                continue;
            }

            // Replicas we could not even dial are not part of the live set
            if !outcome.connected && matches!(&error, Some(e) if e.is_connectivity()) {
                log::debug!(
                    "pod '{}' replica {} unreachable, skipping",
                    pod.name,
                    outcome.address
                );
                continue;
            }
            nodes.push(NodeHealth {
                address: outcome.address,
                role: NodeRole::Replica,
                error,
            });
        }

        HealthReport {
            pod: pod.name.clone(),
            nodes,
        }
    }

    /// Ask every known sentinel for the pod's master record and count the
    /// ones that answer with this exact pod.
    pub async fn validate_sentinels(&self, pod: &str) -> Result<SentinelAgreement> {
        let pod = self.pod(pod)?;
        let sentinels = pod.sentinels()?;
        let name = pod.name.as_str();

        let report = self
            .walker()
            .walk(sentinels, self.sentinel_password(), |mut link| async move {
                let master: MasterInfo = link.sentinel_master(name).await?;
                if master.name != name {
                    return Err(Error::Consistency {
                        addr: link.address().to_string(),
                        expected: name.to_string(),
                        actual: master.name,
                    });
                }
                Ok(master)
            })
            .await;

        let mut agreement = SentinelAgreement {
            pod: name.to_string(),
            total: report.attempted(),
            confirmed: Vec::new(),
            anomalies: Vec::new(),
            failures: Vec::new(),
        };

        for outcome in report.outcomes {
            match outcome.result {
                Ok(_) => agreement.confirmed.push(outcome.address),
                Err(e) => {
                    if let Error::Consistency { .. } = &e {
                        log::warn!("anomalous sentinel {}: {}", outcome.address, e);
                        agreement.anomalies.push(outcome.address.clone());
                    }
                    agreement.failures.push((outcome.address, e));
                }
            }
        }

        if !agreement.is_valid() {
            log::warn!(
                "pod '{}': {} of {} sentinels confirmed",
                name,
                agreement.confirmed.len(),
                agreement.total
            );
        }

        Ok(agreement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerSettings;
    use crate::sentinel::config::SentinelConfig;
    use crate::sentinel::testing::{FakeConnector, FakeNode};
    use std::sync::Arc;

    fn pod_with_replicas(replicas: &[&str]) -> PodConfig {
        let mut pod = PodConfig::new("cache1", "10.0.0.5", 6379, 2);
        pod.auth_pass = Some("s3cret".into());
        pod.known_replicas = replicas.iter().map(|s| s.to_string()).collect();
        pod.known_sentinels = vec!["a:26379".into(), "b:26379".into(), "c:26379".into()];
        pod
    }

    fn manager(pod: PodConfig, connector: Arc<FakeConnector>) -> Manager {
        let mut config = SentinelConfig::new();
        config.add_pod(pod);
        Manager::new(config, connector, &ManagerSettings::default())
    }

    #[tokio::test]
    async fn test_unreachable_replicas_excluded_from_live_set() {
        let connector = Arc::new(
            FakeConnector::new()
                .node("10.0.0.5:6379", FakeNode::redis().password("s3cret"))
                .node("10.0.0.7:6379", FakeNode::redis().password("s3cret")),
        );
        let pod = pod_with_replicas(&["10.0.0.6:6379", "10.0.0.7:6379", "10.0.0.8:6379"]);
        let manager = manager(pod, connector.clone());

        let report = manager.check_auth("cache1").await.unwrap();

        assert!(report.is_valid());
        assert_eq!(report.nodes.len(), 2);
        assert!(report.master().unwrap().ok());
        let live: Vec<_> = report.replicas().map(|n| n.address.as_str()).collect();
        assert_eq!(live, ["10.0.0.7:6379"]);
        assert_eq!(connector.count("PING"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replica_hanging_after_connect_invalidates() {
        let connector = Arc::new(
            FakeConnector::new()
                .node("10.0.0.5:6379", FakeNode::redis().password("s3cret"))
                .node("10.0.0.6:6379", FakeNode::redis().password("s3cret").hang()),
        );
        let manager = manager(pod_with_replicas(&["10.0.0.6:6379"]), connector.clone());

        let report = manager.check_auth("cache1").await.unwrap();

        assert!(!report.is_valid());
        assert_eq!(report.nodes.len(), 2);
        let replica = report.replicas().next().unwrap();
        assert_eq!(replica.address, "10.0.0.6:6379");
        assert!(matches!(replica.error, Some(Error::Timeout { .. })));
        assert_eq!(connector.count("PING"), 2);
    }

    #[tokio::test]
    async fn test_master_auth_failure_is_distinct() {
        let connector = Arc::new(
            FakeConnector::new().node("10.0.0.5:6379", FakeNode::redis().password("other")),
        );
        let manager = manager(pod_with_replicas(&[]), connector);

        let report = manager.check_auth("cache1").await.unwrap();

        assert!(!report.is_valid());
        let master = report.master().unwrap();
        assert!(matches!(master.error, Some(Error::Authentication { .. })));
        assert_eq!(report.as_map().get("10.0.0.5:6379"), Some(&false));
        assert!(matches!(
            report.ensure(),
            Err(Error::Unhealthy { failed: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_master_down_is_connectivity_and_invalid() {
        let connector = Arc::new(FakeConnector::new());
        let manager = manager(pod_with_replicas(&[]), connector);

        let report = manager.check_auth("cache1").await.unwrap();

        assert!(!report.is_valid());
        assert!(matches!(
            report.master().unwrap().error,
            Some(Error::Connectivity { .. })
        ));
    }

    #[tokio::test]
    async fn test_reachable_replica_failing_ping_invalidates() {
        let connector = Arc::new(
            FakeConnector::new()
                .node("10.0.0.5:6379", FakeNode::redis())
                .node("10.0.0.6:6379", FakeNode::redis().reject("PING")),
        );
        let manager = manager(pod_with_replicas(&["10.0.0.6:6379"]), connector);

        let report = manager.check_auth("cache1").await.unwrap();

        assert!(!report.is_valid());
        assert_eq!(report.as_map().get("10.0.0.6:6379"), Some(&false));
    }

    #[tokio::test]
    async fn test_stale_sentinel_counts_as_anomaly() {
        let connector = Arc::new(
            FakeConnector::new()
                .node("a:26379", FakeNode::sentinel().master("cache1"))
                .node("b:26379", FakeNode::sentinel().master("cache1"))
                .node("c:26379", FakeNode::sentinel().reports_as("cache2")),
        );
        let manager = manager(pod_with_replicas(&[]), connector);

        let agreement = manager.validate_sentinels("cache1").await.unwrap();

        assert_eq!(agreement.confirmed, ["a:26379", "b:26379"]);
        assert_eq!(agreement.anomalies, ["c:26379"]);
        assert!(!agreement.is_valid());
        let err = agreement.ensure().unwrap_err();
        assert_eq!(err.to_string(), "2 of 3 sentinels confirmed");
    }

    #[tokio::test]
    async fn test_all_sentinels_agree() {
        let connector = Arc::new(
            FakeConnector::new()
                .node("a:26379", FakeNode::sentinel().master("cache1"))
                .node("b:26379", FakeNode::sentinel().master("cache1"))
                .node("c:26379", FakeNode::sentinel().master("cache1")),
        );
        let manager = manager(pod_with_replicas(&[]), connector);

        let agreement = manager.validate_sentinels("cache1").await.unwrap();
        assert!(agreement.is_valid());
        assert!(agreement.failures.is_empty());
        assert!(agreement.ensure().is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_and_unknown_pod_sentinels_fail_agreement() {
        let connector = Arc::new(
            FakeConnector::new()
                .node("a:26379", FakeNode::sentinel().master("cache1"))
                .node("c:26379", FakeNode::sentinel()),
        );
        let manager = manager(pod_with_replicas(&[]), connector);

        let agreement = manager.validate_sentinels("cache1").await.unwrap();

        assert_eq!(agreement.confirmed.len(), 1);
        assert!(agreement.confirmed.len() < agreement.total);
        assert!(agreement.anomalies.is_empty());
        assert!(matches!(agreement.failures[0].1, Error::Connectivity { .. }));
        assert!(matches!(agreement.failures[1].1, Error::NoSuchMaster(_)));
    }

    #[tokio::test]
    async fn test_validate_requires_known_sentinels() {
        let mut pod = pod_with_replicas(&[]);
        pod.known_sentinels.clear();
        let manager = manager(pod, Arc::new(FakeConnector::new()));

        assert!(matches!(
            manager.validate_sentinels("cache1").await,
            Err(Error::NoSentinels(_))
        ));
        assert!(matches!(
            manager.validate_sentinels("nope").await,
            Err(Error::UnknownPod(_))
        ));
    }
}
