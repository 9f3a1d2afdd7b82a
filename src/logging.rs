//! Logging configuration module
//!
//! Redis-style log lines on stderr:
//! - Log levels (debug, verbose, notice, warning, nothing)
//! - `pid:level-char timestamp message` formatting
//! - Passwords following `AUTH` or `auth-pass` are redacted

use log::{LevelFilter, Log, Metadata, Record};
use std::io::Write;

/// Redis-style log levels mapped to Rust log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedisLogLevel {
    Debug,
    Verbose,
    Notice,
    Warning,
    Nothing,
}

impl RedisLogLevel {
    /// Parse a Redis-style log level name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "verbose" => Some(Self::Verbose),
            "notice" => Some(Self::Notice),
            "warning" => Some(Self::Warning),
            "nothing" => Some(Self::Nothing),
            _ => None,
        }
    }

    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Debug => LevelFilter::Trace,
            Self::Verbose => LevelFilter::Debug,
            Self::Notice => LevelFilter::Info,
            Self::Warning => LevelFilter::Warn,
            Self::Nothing => LevelFilter::Off,
        }
    }
}

/// Logger writing to stderr, like redis-sentinel does when not daemonized
pub struct ManagerLogger {
    level: LevelFilter,
}

impl ManagerLogger {
    pub fn new(level: RedisLogLevel) -> Self {
        Self {
            level: level.to_level_filter(),
        }
    }

    fn format_record(&self, record: &Record) -> String {
        let level_char = match record.level() {
            log::Level::Error => '!',
            log::Level::Warn => '#',
            log::Level::Info => '*',
            log::Level::Debug => '-',
            log::Level::Trace => '.',
        };

        let msg = redact(&record.args().to_string());
        format!("{}:{} {} {}\n", std::process::id(), level_char, timestamp(), msg)
    }
}

impl Log for ManagerLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let formatted = self.format_record(record);
        let _ = std::io::stderr().lock().write_all(formatted.as_bytes());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Replace the secret in `AUTH <pw>`, `auth-pass <pw>`, `auth-pass=<pw>` and
/// the config-file form `sentinel auth-pass <pod> <pw>`.
pub fn redact(msg: &str) -> String {
    let words: Vec<&str> = msg.split(' ').collect();
    let mut out = Vec::with_capacity(words.len());
    let mut i = 0;

    while i < words.len() {
        let word = words[i];
        i += 1;

        let prefixed = word
            .get(..10)
            .is_some_and(|p| p.eq_ignore_ascii_case("auth-pass="));
        if prefixed && word.len() > 10 {
            out.push("auth-pass=[REDACTED]");
            continue;
        }
        out.push(word);

        let skip = if word.eq_ignore_ascii_case("auth") {
            1
        } else if word.eq_ignore_ascii_case("auth-pass") {
            let config_form = i >= 2 && words[i - 2].eq_ignore_ascii_case("sentinel");
            if config_form { 2 } else { 1 }
        } else {
            0
        };

        if skip == 2 && i < words.len() {
            out.push(words[i]);
            i += 1;
        }
        if skip > 0 && i < words.len() && !words[i].is_empty() {
            out.push("[REDACTED]");
            i += 1;
        }
    }

    out.join(" ")
}

/// Seconds since the epoch with millisecond precision
fn timestamp() -> String {
    use std::time::SystemTime;

    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:03}", now.as_secs(), now.subsec_millis())
}

/// Install the stderr logger at the given Redis level name
pub fn init_logging(level: &str) -> Result<(), String> {
    let level =
        RedisLogLevel::parse(level).ok_or_else(|| format!("invalid log level '{}'", level))?;

    log::set_boxed_logger(Box::new(ManagerLogger::new(level))).map_err(|e| e.to_string())?;
    log::set_max_level(level.to_level_filter());
    Ok(())
}
