//! Redis Sentinel management
//!
//! Operator-side tooling for a fleet of sentinels. Nothing here monitors or
//! fails over on its own; every operation connects to live sentinels, issues
//! `SENTINEL` commands and reports what each node answered.
//!
//! Layers:
//! 1. `link`: one authenticated RESP connection to a node
//! 2. `walker`: visit every sentinel of a pod, collect per-node outcomes
//! 3. `health`, `lifecycle`: operations built on walks
//!
//! Pods come from a sentinel.conf (`config_parser`); the live sentinels are
//! the source of truth for anything that changes at runtime.

pub mod archive;
pub mod config;
pub mod config_parser;
pub mod health;
pub mod lifecycle;
pub mod link;
pub mod manager;
pub mod walker;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{PodConfig, SentinelConfig};
pub use config_parser::parse_sentinel_config;
pub use health::{HealthReport, NodeHealth, NodeRole, SentinelAgreement};
pub use lifecycle::{AddPod, AddPodReport, BulkReport, PodOutcome, RemovePodReport};
pub use link::{Connector, MasterInfo, SentinelLink, TcpConnector};
pub use manager::Manager;
pub use walker::{NodeOutcome, QuorumWalker, WalkReport, WalkStatus};
