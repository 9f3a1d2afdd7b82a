//! In-memory nodes for exercising walks, health checks and pod operations
//! without a network.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::link::{Connector, MasterInfo, SentinelLink};
use crate::error::{Error, Result};

/// Scripted behavior of one node
#[derive(Debug, Clone, Default)]
pub struct FakeNode {
    unreachable: bool,
    password: Option<String>,
    hang: bool,
    rejects: Vec<&'static str>,
    rejected_directives: Vec<&'static str>,
    masters: Vec<MasterInfo>,
    reports_as: Option<String>,
}

impl FakeNode {
    pub fn sentinel() -> Self {
        Self::default()
    }

    pub fn redis() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Require this password on dial
    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    /// Accept the connection but never answer
    pub fn hang(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Answer the given command (PING, MONITOR, SET, REMOVE, RESET, MASTER, MASTERS)
    /// with an error reply
    pub fn reject(mut self, command: &'static str) -> Self {
        self.rejects.push(command);
        self
    }

    /// Answer SENTINEL SET of this directive with an error reply
    pub fn reject_directive(mut self, key: &'static str) -> Self {
        self.rejected_directives.push(key);
        self
    }

    /// Know about this pod
    pub fn master(mut self, name: &str) -> Self {
        self.masters.push(MasterInfo::new(name, "10.0.0.5", 6379));
        self
    }

    /// Answer every SENTINEL MASTER with a record for this pod instead
    pub fn reports_as(mut self, name: &str) -> Self {
        self.reports_as = Some(name.to_string());
        self
    }
}

#[derive(Default)]
struct Journal {
    dials: Vec<String>,
    calls: Vec<(String, String)>,
}

/// Connector over a fixed set of fake nodes. Unknown addresses are unreachable.
#[derive(Default)]
pub struct FakeConnector {
    nodes: HashMap<String, FakeNode>,
    journal: Arc<Mutex<Journal>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, addr: &str, node: FakeNode) -> Self {
        self.nodes.insert(addr.to_string(), node);
        self
    }

    /// Addresses dialed, in order
    pub fn dials(&self) -> Vec<String> {
        self.journal.lock().dials.clone()
    }

    /// Commands that reached `addr`, in order, e.g. `"SET cache1 auth-pass s3cret"`
    pub fn calls_to(&self, addr: &str) -> Vec<String> {
        self.journal
            .lock()
            .calls
            .iter()
            .filter(|(a, _)| a == addr)
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Count of commands across all nodes starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.journal
            .lock()
            .calls
            .iter()
            .filter(|(_, c)| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn dial(&self, addr: &str, password: Option<&str>) -> Result<Box<dyn SentinelLink>> {
        self.journal.lock().dials.push(addr.to_string());

        let node = match self.nodes.get(addr) {
            Some(node) if !node.unreachable => node.clone(),
            _ => {
                return Err(Error::Connectivity {
                    addr: addr.to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
                });
            }
        };

        if let Some(required) = &node.password {
            if password != Some(required.as_str()) {
                return Err(Error::Authentication {
                    addr: addr.to_string(),
                    message: "ERR invalid password".to_string(),
                });
            }
        }

        Ok(Box::new(FakeLink {
            addr: addr.to_string(),
            node,
            journal: self.journal.clone(),
        }))
    }
}

struct FakeLink {
    addr: String,
    node: FakeNode,
    journal: Arc<Mutex<Journal>>,
}

impl FakeLink {
    async fn enter(&self, command: &'static str, line: String) -> Result<()> {
        self.journal.lock().calls.push((self.addr.clone(), line));

        if self.node.hang {
            std::future::pending::<()>().await;
        }
        if self.node.rejects.contains(&command) {
            return Err(Error::protocol(
                &self.addr,
                format!("ERR {} rejected", command),
            ));
        }
        Ok(())
    }

    fn find(&self, pod: &str) -> Option<MasterInfo> {
        self.node.masters.iter().find(|m| m.name == pod).cloned()
    }
}

#[async_trait]
impl SentinelLink for FakeLink {
    fn address(&self) -> &str {
        &self.addr
    }

    async fn ping(&mut self) -> Result<()> {
        self.enter("PING", "PING".to_string()).await
    }

    async fn sentinel_monitor(
        &mut self,
        name: &str,
        host: &str,
        port: u16,
        quorum: u32,
    ) -> Result<()> {
        let line = format!("MONITOR {} {} {} {}", name, host, port, quorum);
        self.enter("MONITOR", line).await
    }

    async fn sentinel_set(&mut self, pod: &str, key: &str, value: &str) -> Result<()> {
        let line = format!("SET {} {} {}", pod, key, value);
        self.enter("SET", line).await?;
        if self.node.rejected_directives.iter().any(|d| *d == key) {
            return Err(Error::protocol(
                &self.addr,
                format!("ERR Invalid argument '{}' for SENTINEL SET", key),
            ));
        }
        Ok(())
    }

    async fn sentinel_remove(&mut self, pod: &str) -> Result<bool> {
        self.enter("REMOVE", format!("REMOVE {}", pod)).await?;
        Ok(self.find(pod).is_some())
    }

    async fn sentinel_reset(&mut self, pod: &str) -> Result<i64> {
        self.enter("RESET", format!("RESET {}", pod)).await?;
        Ok(if self.find(pod).is_some() { 1 } else { 0 })
    }

    async fn sentinel_master(&mut self, pod: &str) -> Result<MasterInfo> {
        self.enter("MASTER", format!("MASTER {}", pod)).await?;
        if let Some(name) = &self.node.reports_as {
            return Ok(MasterInfo::new(name.as_str(), "10.0.0.9", 6379));
        }
        self.find(pod)
            .ok_or_else(|| Error::NoSuchMaster(pod.to_string()))
    }

    async fn sentinel_masters(&mut self) -> Result<Vec<MasterInfo>> {
        self.enter("MASTERS", "MASTERS".to_string()).await?;
        Ok(self.node.masters.clone())
    }
}
