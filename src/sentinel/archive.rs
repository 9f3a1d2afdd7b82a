//! Pod archive files written before a pod is removed from a sentinel.

use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::link::MasterInfo;
use crate::error::{Error, Result};

/// Fields rendered in the summary block, skipped in the raw dump
const SUMMARY_FIELDS: &[&str] = &["name", "ip", "port", "flags", "quorum"];

/// `<dir>/archive-<pod>.txt`, with path separators in the name replaced
pub fn archive_path(dir: &Path, pod: &str) -> PathBuf {
    let safe: String = pod
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    dir.join(format!("archive-{}.txt", safe))
}

/// Render a master record as human-readable text
pub fn render(info: &MasterInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Sentinel pod archive");
    let _ = writeln!(out, "Pod: {}", info.name);
    let _ = writeln!(out, "Master: {}", info.addr());
    let _ = writeln!(out, "State: {} ({})", info.state(), info.flags);
    let _ = writeln!(out, "Quorum: {}", info.quorum);
    let _ = writeln!(out, "Replicas: {}", info.num_slaves);
    let _ = writeln!(out, "Other sentinels: {}", info.num_other_sentinels);
    let _ = writeln!(out);
    let _ = writeln!(out, "# Raw fields");
    for (key, value) in &info.fields {
        if SUMMARY_FIELDS.contains(&key.as_str()) {
            continue;
        }
        let _ = writeln!(out, "{}: {}", key, value);
    }
    out
}

/// Write the archive for `info` into `dir`. Any failure to create or write
/// the file is returned as [`Error::Archive`].
pub fn write_archive(dir: &Path, info: &MasterInfo) -> Result<PathBuf> {
    let path = archive_path(dir, &info.name);
    let wrap = |source: std::io::Error| Error::Archive {
        path: path.clone(),
        source,
    };

    let mut file = File::create(&path).map_err(wrap)?;
    file.write_all(render(info).as_bytes()).map_err(wrap)?;
    file.sync_all().map_err(wrap)?;

    log::info!("archived pod '{}' to {}", info.name, path.display());
    Ok(path)
}
