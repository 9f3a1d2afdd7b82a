pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod sentinel;

pub use config::ManagerSettings;
pub use error::{Error, Result};
pub use sentinel::{Manager, SentinelConfig};
