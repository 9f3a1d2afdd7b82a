//! Quorum Walker
//!
//! Visits every sentinel known for a pod, runs one operation per live
//! connection and keeps a per-node outcome. A node that cannot be dialed,
//! hangs, or rejects the operation is recorded and the walk moves on.

use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::timeout;

use super::link::{Connector, SentinelLink};
use crate::error::{Error, Result};

/// Result of visiting one node
#[derive(Debug)]
pub struct NodeOutcome<T> {
    pub address: String,
    /// The dial (and AUTH) completed; any error came from the operation itself
    pub connected: bool,
    pub result: Result<T>,
}

impl<T> NodeOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// False when the node could not be dialed, timed out or refused our credentials
    pub fn reachable(&self) -> bool {
        !matches!(&self.result, Err(e) if e.is_unreachable())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStatus {
    /// Every node succeeded
    All,
    /// Some nodes succeeded
    Partial,
    /// No node succeeded
    None,
}

/// Outcomes of one walk, in the order the addresses were given
#[derive(Debug)]
pub struct WalkReport<T> {
    pub outcomes: Vec<NodeOutcome<T>>,
}

impl<T> WalkReport<T> {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Err(e) => Some((o.address.as_str(), e)),
            Ok(_) => None,
        })
    }

    pub fn status(&self) -> WalkStatus {
        let ok = self.successes();
        if ok == self.attempted() {
            WalkStatus::All
        } else if ok == 0 {
            WalkStatus::None
        } else {
            WalkStatus::Partial
        }
    }

    /// Succeed only if every node succeeded
    pub fn require_all(self, action: &'static str) -> Result<Self> {
        if self.status() == WalkStatus::All {
            Ok(self)
        } else {
            Err(Error::QuorumShortfall {
                action,
                succeeded: self.successes(),
                attempted: self.attempted(),
            })
        }
    }
}

/// Walks a list of node addresses with bounded fan-out
pub struct QuorumWalker<'a> {
    connector: &'a dyn Connector,
    node_timeout: Duration,
    concurrency: usize,
}

impl<'a> QuorumWalker<'a> {
    pub fn new(connector: &'a dyn Connector, node_timeout: Duration, concurrency: usize) -> Self {
        Self {
            connector,
            node_timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Dial each address and run `op` on the connection. Every address is
    /// attempted exactly once; outcomes keep the input order.
    pub async fn walk<T, F, Fut>(
        &self,
        addresses: &[String],
        password: Option<&str>,
        op: F,
    ) -> WalkReport<T>
    where
        F: Fn(Box<dyn SentinelLink>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let op = &op;
        let outcomes = stream::iter(addresses)
            .map(|addr| async move {
                let mut connected = false;
                let visit = async {
                    let link = self.connector.dial(addr, password).await?;
                    connected = true;
                    op(link).await
                };

                let result = match timeout(self.node_timeout, visit).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout {
                        addr: addr.clone(),
                        after: self.node_timeout,
                    }),
                };

                if let Err(e) = &result {
                    log::warn!("[{}] {}", addr, e);
                }

                NodeOutcome {
                    address: addr.clone(),
                    connected,
                    result,
                }
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        WalkReport { outcomes }
    }
}
