use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to connect to {addr}: {source}")]
    Connectivity {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{addr} did not respond within {after:?}")]
    Timeout { addr: String, after: Duration },

    #[error("authentication rejected by {addr}: {message}")]
    Authentication { addr: String, message: String },

    #[error("[{addr}] {message}")]
    Protocol { addr: String, message: String },

    #[error("ERR No such master with that name: {0}")]
    NoSuchMaster(String),

    #[error("[{addr}] asked for master of pod '{expected}', got master for pod '{actual}'")]
    Consistency {
        addr: String,
        expected: String,
        actual: String,
    },

    #[error("Only {succeeded} of {attempted} sentinels were successfully {action}")]
    QuorumShortfall {
        action: &'static str,
        succeeded: usize,
        attempted: usize,
    },

    #[error("{confirmed} of {total} sentinels confirmed")]
    SentinelDisagreement { confirmed: usize, total: usize },

    #[error("{failed} node(s) in pod '{pod}' failed the auth check")]
    Unhealthy { pod: String, failed: usize },

    #[error("unable to write archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pod '{0}' is not in the sentinel configuration")]
    UnknownPod(String),

    #[error("pod '{0}' has no known sentinels")]
    NoSentinels(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the node could not be used at all, including rejected
    /// credentials. A command rejected by a live node is not unreachable.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Error::Connectivity { .. } | Error::Timeout { .. } | Error::Authentication { .. }
        )
    }

    /// True when the node never answered
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Connectivity { .. } | Error::Timeout { .. })
    }

    /// Address of the node the error came from, when it is node-scoped.
    pub fn addr(&self) -> Option<&str> {
        match self {
            Error::Connectivity { addr, .. }
            | Error::Timeout { addr, .. }
            | Error::Authentication { addr, .. }
            | Error::Protocol { addr, .. }
            | Error::Consistency { addr, .. } => Some(addr),
            _ => None,
        }
    }

    pub(crate) fn protocol(addr: &str, message: impl Into<String>) -> Self {
        Error::Protocol {
            addr: addr.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortfall_message() {
        let err = Error::QuorumShortfall {
            action: "reset",
            succeeded: 2,
            attempted: 3,
        };
        assert_eq!(
            err.to_string(),
            "Only 2 of 3 sentinels were successfully reset"
        );
    }

    #[test]
    fn test_disagreement_message() {
        let err = Error::SentinelDisagreement {
            confirmed: 3,
            total: 5,
        };
        assert_eq!(err.to_string(), "3 of 5 sentinels confirmed");
    }

    #[test]
    fn test_unreachable_classification() {
        let refused = Error::Connectivity {
            addr: "10.0.0.1:26379".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        let auth = Error::Authentication {
            addr: "10.0.0.1:6379".into(),
            message: "ERR invalid password".into(),
        };
        let rejected = Error::protocol("10.0.0.1:26379", "ERR Unknown option");

        assert!(refused.is_unreachable());
        assert!(refused.is_connectivity());
        assert!(auth.is_unreachable());
        assert!(!auth.is_connectivity());
        assert!(!rejected.is_unreachable());
        assert_eq!(rejected.addr(), Some("10.0.0.1:26379"));
    }
}
