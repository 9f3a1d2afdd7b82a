//! Sentinel Configuration Parser
//!
//! Parses sentinel.conf files into a [`SentinelConfig`], including the
//! `known-replica` and `known-sentinel` lines a running sentinel rewrites into
//! its own config.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::sentinel::config::{PodConfig, SentinelConfig};

/// Parse a sentinel configuration file
pub fn parse_sentinel_config(path: &Path) -> Result<SentinelConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "failed to read sentinel config file {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(parse_sentinel_str(&content))
}

/// Parse sentinel configuration text. Malformed lines are skipped with a warning.
pub fn parse_sentinel_str(content: &str) -> SentinelConfig {
    let mut config = SentinelConfig::default();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Err(e) = parse_sentinel_line(line, &mut config) {
            log::warn!("sentinel config line {}: {}", line_num + 1, e);
        }
    }

    config
}

/// Parse a single configuration line
fn parse_sentinel_line(line: &str, config: &mut SentinelConfig) -> std::result::Result<(), String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Ok(());
    }

    // Server directives (port, bind, dir, ...) do not describe pods
    if !parts[0].eq_ignore_ascii_case("sentinel") {
        return Ok(());
    }
    if parts.len() < 2 {
        return Err("sentinel directive requires a subcommand".to_string());
    }
    parse_sentinel_directive(&parts[1..], config)
}

/// Parse SENTINEL-specific directives
fn parse_sentinel_directive(
    parts: &[&str],
    config: &mut SentinelConfig,
) -> std::result::Result<(), String> {
    let subcommand = parts[0].to_lowercase();

    match subcommand.as_str() {
        "monitor" => {
            // sentinel monitor <name> <ip> <port> <quorum>
            if parts.len() < 5 {
                return Err("sentinel monitor requires: name ip port quorum".to_string());
            }

            let port: u16 = parts[3]
                .parse()
                .map_err(|_| "invalid port in sentinel monitor".to_string())?;
            let quorum: u32 = parts[4]
                .parse()
                .map_err(|_| "invalid quorum in sentinel monitor".to_string())?;

            config.add_pod(PodConfig::new(parts[1], parts[2], port, quorum));
        }
        "sentinel-pass" => {
            // sentinel sentinel-pass <password>
            if parts.len() < 2 {
                return Err("sentinel sentinel-pass requires a password".to_string());
            }
            config.sentinel_pass = Some(parts[1].to_string());
        }
        "auth-pass" => {
            let (pod, value) = pod_and_value(parts, config)?;
            pod.auth_pass = Some(value.to_string());
        }
        "client-reconfig-script" => {
            let (pod, value) = pod_and_value(parts, config)?;
            pod.client_reconfig_script = Some(value.into());
        }
        "notification-script" => {
            let (pod, value) = pod_and_value(parts, config)?;
            pod.notification_script = Some(value.into());
        }
        "known-replica" | "known-slave" => {
            // sentinel known-replica <name> <ip> <port>
            let addr = node_addr(parts)?;
            pod_mut(parts[1], config)?.add_replica(addr);
        }
        "known-sentinel" => {
            // sentinel known-sentinel <name> <ip> <port> [runid]
            let addr = node_addr(parts)?;
            pod_mut(parts[1], config)?.add_sentinel(addr);
        }
        _ => {
            // Failover tuning (down-after-milliseconds, parallel-syncs, ...)
            // lives on the sentinels themselves
        }
    }

    Ok(())
}

fn pod_mut<'a>(
    name: &str,
    config: &'a mut SentinelConfig,
) -> std::result::Result<&'a mut PodConfig, String> {
    config
        .get_pod_mut(name)
        .ok_or_else(|| format!("pod '{}' is not monitored (missing sentinel monitor line)", name))
}

/// `sentinel <directive> <name> <value>`
fn pod_and_value<'a, 'p>(
    parts: &[&'p str],
    config: &'a mut SentinelConfig,
) -> std::result::Result<(&'a mut PodConfig, &'p str), String> {
    if parts.len() < 3 {
        return Err(format!("sentinel {} requires name and value", parts[0]));
    }
    Ok((pod_mut(parts[1], config)?, parts[2]))
}

/// `sentinel <directive> <name> <ip> <port> ...` -> `ip:port`
fn node_addr(parts: &[&str]) -> std::result::Result<String, String> {
    if parts.len() < 4 {
        return Err(format!("sentinel {} requires: name ip port", parts[0]));
    }
    let port: u16 = parts[3]
        .parse()
        .map_err(|_| format!("invalid port in sentinel {}", parts[0]))?;
    Ok(format!("{}:{}", parts[2], port))
}
