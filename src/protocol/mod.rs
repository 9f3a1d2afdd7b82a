//! RESP2 wire codec used to talk to Sentinel and Redis nodes.

pub mod parser;
pub mod types;

pub use parser::{ParseError, Parser};
pub use types::{RespValue, encode_command};
