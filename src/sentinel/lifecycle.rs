//! Pod Lifecycle Operations
//!
//! unmonitored -> monitored (MONITOR) -> configured (auth-pass, scripts) -> removed
//!
//! Nothing here is persisted locally; every operation works from what the
//! live sentinels report at the time it runs.

use std::path::PathBuf;

use super::archive;
use super::config::PodConfig;
use super::link::MasterInfo;
use super::manager::Manager;
use super::walker::WalkReport;
use crate::error::{Error, Result};

/// Parameters for adding a pod to a sentinel
#[derive(Debug, Clone)]
pub struct AddPod {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub quorum: u32,
    pub password: String,
    pub reconfig_script: Option<String>,
    pub notification_script: Option<String>,
}

#[derive(Debug)]
pub struct AddPodReport {
    pub name: String,
    /// Optional directives the sentinel refused; the pod stays monitored
    pub directive_failures: Vec<(&'static str, Error)>,
}

impl AddPodReport {
    pub fn is_complete(&self) -> bool {
        self.directive_failures.is_empty()
    }
}

#[derive(Debug)]
pub struct RemovePodReport {
    pub name: String,
    /// Record fetched before removal, if the sentinel knew the pod
    pub master: Option<MasterInfo>,
    pub archive: Option<PathBuf>,
    /// False when the sentinel did not have the pod
    pub removed: bool,
}

/// Per-pod result of a bulk operation
#[derive(Debug)]
pub struct PodOutcome<T> {
    pub pod: String,
    pub result: Result<T>,
}

/// Results of an operation applied pod by pod; one pod failing never stops
/// the others.
#[derive(Debug)]
pub struct BulkReport<T> {
    pub pods: Vec<PodOutcome<T>>,
}

impl<T> BulkReport<T> {
    pub fn total(&self) -> usize {
        self.pods.len()
    }

    pub fn succeeded(&self) -> usize {
        self.pods.iter().filter(|p| p.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.pods.iter().filter_map(|p| match &p.result {
            Err(e) => Some((p.pod.as_str(), e)),
            Ok(_) => None,
        })
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded() == self.total()
    }

    /// e.g. `2/3 pods`
    pub fn summary(&self) -> String {
        format!("{}/{} pods", self.succeeded(), self.total())
    }
}

/// Keep a partially successful walk, but fail when no sentinel accepted it
fn at_least_one<T>(report: WalkReport<T>) -> Result<WalkReport<T>> {
    if report.successes() > 0 {
        return Ok(report);
    }
    match report.outcomes.into_iter().find_map(|o| o.result.err()) {
        Some(e) => Err(e),
        None => Err(Error::Config("no sentinels to operate on".to_string())),
    }
}

impl Manager {
    /// SENTINEL MONITOR the pod on `target`, then configure it. A failed
    /// MONITOR or auth-pass aborts; the optional script directives are each
    /// attempted and their failures collected.
    pub async fn add_pod(&self, target: &str, pod: &AddPod) -> Result<AddPodReport> {
        let mut link = self.dial_target(target).await?;

        link.sentinel_monitor(&pod.name, &pod.host, pod.port, pod.quorum)
            .await
            .inspect_err(|e| log::error!("on AddPod {}: {}", pod.name, e))?;
        log::info!(
            "monitoring pod '{}' at {}:{} (quorum={}) on {}",
            pod.name,
            pod.host,
            pod.port,
            pod.quorum,
            target
        );

        link.sentinel_set(&pod.name, "auth-pass", &pod.password)
            .await
            .inspect_err(|e| log::error!("pod '{}' rejected auth-pass: {}", pod.name, e))?;

        let mut report = AddPodReport {
            name: pod.name.clone(),
            directive_failures: Vec::new(),
        };

        let optional = [
            ("client-reconfig-script", pod.reconfig_script.as_deref()),
            ("notification-script", pod.notification_script.as_deref()),
        ];
        for (directive, value) in optional {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            if let Err(e) = link.sentinel_set(&pod.name, directive, value).await {
                log::error!("setting {} on '{}': {}", directive, pod.name, e);
                report.directive_failures.push((directive, e));
            }
        }

        Ok(report)
    }

    /// Fetch the pod's record, archive it when asked, then SENTINEL REMOVE it.
    /// If the archive cannot be written the pod is left in place.
    pub async fn remove_pod(
        &self,
        target: &str,
        name: &str,
        archive: bool,
    ) -> Result<RemovePodReport> {
        let mut link = self.dial_target(target).await?;

        let master = match link.sentinel_master(name).await {
            Ok(info) => Some(info),
            Err(Error::NoSuchMaster(_)) => None,
            Err(e) => return Err(e),
        };

        let archive = match (&master, archive) {
            (Some(info), true) => Some(archive::write_archive(self.archive_dir(), info)?),
            (None, true) => {
                log::warn!("pod '{}' is not on {}, nothing to archive", name, target);
                None
            }
            (_, false) => None,
        };

        let removed = link.sentinel_remove(name).await?;
        if removed {
            log::info!("pod '{}' was removed from {}", name, target);
        } else {
            log::info!("pod '{}' not on {}", name, target);
        }

        Ok(RemovePodReport {
            name: name.to_string(),
            master,
            archive,
            removed,
        })
    }

    /// Set `directive` on every pod `target` monitors. Each pod's directive is
    /// walked across its sentinels; a pod succeeds when at least one accepted.
    pub async fn set_directive_on_all_pods(
        &self,
        target: &str,
        directive: &str,
        value: &str,
    ) -> Result<BulkReport<WalkReport<()>>> {
        let pods = {
            let mut link = self.dial_target(target).await?;
            link.sentinel_masters().await?
        };

        log::info!("Setting {}={} on all pods...", directive, value);
        let mut report = BulkReport {
            pods: Vec::with_capacity(pods.len()),
        };

        for info in pods {
            log::info!("Operating on {}", info.name);
            let sentinels = self.sentinels_for(&info.name, target);
            let name = info.name.as_str();

            let walk = self
                .walker()
                .walk(&sentinels, self.sentinel_password(), |mut link| async move {
                    link.sentinel_set(name, directive, value).await
                })
                .await;

            let result = at_least_one(walk);
            if let Err(e) = &result {
                log::error!(
                    "Unable to set {} to {} on pod '{}': {}",
                    directive,
                    value,
                    name,
                    e
                );
            }
            report.pods.push(PodOutcome {
                pod: info.name,
                result,
            });
        }

        log::info!("{} {} updated", report.summary(), directive);
        Ok(report)
    }

    /// Set `directive` on one configured pod across all of its known
    /// sentinels. Sentinels that could not be reached need manual follow-up.
    pub async fn set_directive_on_pod(
        &self,
        pod: &str,
        directive: &str,
        value: &str,
    ) -> Result<WalkReport<()>> {
        let pod = self.pod(pod)?;
        let name = pod.name.as_str();

        let walk = self
            .walker()
            .walk(pod.sentinels()?, self.sentinel_password(), |mut link| async move {
                link.sentinel_set(name, directive, value).await
            })
            .await;

        for (addr, e) in walk.failures() {
            if e.is_unreachable() {
                log::warn!(
                    "Unable to connect to {}! You will need to manually adjust pod '{}' ({})",
                    addr,
                    name,
                    directive
                );
            }
        }

        at_least_one(walk)
    }

    /// SENTINEL RESET the pod on every known sentinel; all must succeed.
    pub async fn reset_pod(&self, pod: &str) -> Result<WalkReport<i64>> {
        let pod = self.pod(pod)?;
        self.reset_pod_config(pod).await
    }

    async fn reset_pod_config(&self, pod: &PodConfig) -> Result<WalkReport<i64>> {
        let name = pod.name.as_str();
        self.walker()
            .walk(pod.sentinels()?, self.sentinel_password(), |mut link| async move {
                link.sentinel_reset(name).await
            })
            .await
            .require_all("reset")
    }

    /// Reset every configured pod. A pod that fails is reported and the
    /// remaining pods are still reset.
    pub async fn reset_all_pods(&self) -> BulkReport<WalkReport<i64>> {
        let mut report = BulkReport { pods: Vec::new() };

        for pod in self.config().pods() {
            log::info!("Resetting {}", pod.name);
            let result = self.reset_pod_config(pod).await;
            if let Err(e) = &result {
                log::error!("reset of pod '{}' failed: {}", pod.name, e);
            }
            report.pods.push(PodOutcome {
                pod: pod.name.clone(),
                result,
            });
        }

        if report.total() == 0 {
            log::warn!("no pods configured, nothing to reset");
        } else {
            log::info!("{} reset", report.summary());
        }
        report
    }
}
