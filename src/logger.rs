//! Audit and console logging for portwatch.
//!
//! Provides a [`Logger`] that writes every event to stdout and appends it to
//! the day-stamped audit file. The audit file is the authoritative record:
//! one physical file per calendar day (`<dir>/<YYYY-MM-DD>-watcher.log`),
//! append-only, never truncated, with each line of the form
//!
//! ```text
//! [<YYYY-MM-DD HH:MM:SS> - <LEVEL>] > <message>
//! ```
//!
//! where LEVEL is one of INFO, WARNING, ALERT or ERROR. Every append is
//! flushed before [`Logger::log`] returns, so an abrupt stop cannot leave a
//! partial line behind. Stdout output can optionally be formatted as
//! newline-delimited JSON (NDJSON) for log shippers; the file format is
//! fixed regardless.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ── Event types ──────────────────────────────────────────────────────────────

/// All distinct event kinds that portwatch can emit.
///
/// Each variant carries exactly the fields needed to describe that event.
/// The `#[serde(tag = "event")]` attribute ensures JSON output includes an
/// `"event"` key so consumers can filter by type without inspecting structure.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event<'a> {
    /// Informational startup / status message.
    Info { message: &'a str },

    /// A recoverable configuration value was replaced by its default.
    ConfigWarning { message: &'a str },

    /// Fatal configuration error; the watcher never starts after this.
    ConfigRejected { error: &'a str },

    /// A newly-appeared established connection on a monitored port.
    /// `severity` is the audit level tag (INFO, WARNING, ALERT, or ERROR
    /// when the port's configured severity was out of range).
    NewConnection {
        severity:    &'a str,
        local_port:  u16,
        remote_ip:   &'a str,
        remote_port: u16,
        at:          &'a str,
    },

    /// Connection enumeration failed; the cycle was skipped.
    SnapshotFailed { error: &'a str },

    /// A monitored port carries a severity value outside 1..=3.
    ClassificationAnomaly { local_port: u16, raw: u8 },

    /// The notification sink rejected or failed a delivery.
    NotifyFailed { error: &'a str },

    /// Session summary emitted on graceful shutdown.
    SessionSummary {
        duration_secs:     u64,
        cycles:            u64,
        snapshot_failures: u64,
        alerts:            u64,
        notify_failures:   u64,
    },
}

impl Event<'_> {
    /// The audit level tag for this event.
    fn level_tag(&self) -> &str {
        match self {
            Event::Info { .. } | Event::SessionSummary { .. } => "INFO",
            Event::ConfigWarning { .. } => "WARNING",
            Event::NewConnection { severity, .. } => *severity,
            Event::ConfigRejected { .. }
            | Event::SnapshotFailed { .. }
            | Event::ClassificationAnomaly { .. }
            | Event::NotifyFailed { .. } => "ERROR",
        }
    }

    /// Formats the event as the human-readable message after the `>`.
    fn message(&self) -> String {
        match self {
            Event::Info { message } | Event::ConfigWarning { message } =>
                (*message).to_string(),

            Event::ConfigRejected { error } =>
                format!("invalid configuration: {}", error),

            Event::NewConnection { local_port, remote_ip, remote_port, at, .. } =>
                format!(
                    "New connection on port {} from {}:{} at {}",
                    local_port, remote_ip, remote_port, at
                ),

            Event::SnapshotFailed { error } =>
                format!("connection snapshot failed: {}", error),

            Event::ClassificationAnomaly { local_port, raw } =>
                format!(
                    "severity value {} configured for port {} is outside 1..=3",
                    raw, local_port
                ),

            Event::NotifyFailed { error } =>
                format!("notification delivery failed: {}", error),

            Event::SessionSummary {
                duration_secs, cycles, snapshot_failures, alerts, notify_failures,
            } => format!(
                "session summary: duration={}s cycles={} snapshot_failures={} alerts={} notify_failures={}",
                duration_secs, cycles, snapshot_failures, alerts, notify_failures
            ),
        }
    }
}

// ── Logger ───────────────────────────────────────────────────────────────────

/// Day-stamped audit file state. Reopened when the calendar day changes.
struct AuditFile {
    dir:    PathBuf,
    day:    NaiveDate,
    writer: BufWriter<File>,
}

impl AuditFile {
    fn open_writer(dir: &Path, day: NaiveDate) -> io::Result<BufWriter<File>> {
        let path = dir.join(format!("{}-watcher.log", day.format("%Y-%m-%d")));
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BufWriter::new(file))
    }
}

/// Shared, thread-safe audit logger.
///
/// Constructed once in `main` and passed as an `Arc<Logger>` to every module
/// that needs to emit events. The internal `Mutex` serialises appends so two
/// dispatches never interleave partial lines.
pub struct Logger {
    /// Whether stdout output is NDJSON instead of the plain audit line.
    json:  bool,
    audit: Mutex<AuditFile>,
}

/// Type alias used throughout the codebase for convenience.
pub type SharedLogger = Arc<Logger>;

impl Logger {
    /// Creates a logger appending to today's audit file under `dir`.
    ///
    /// # Errors
    /// Returns an `io::Error` if the audit file cannot be opened or created.
    pub fn new(dir: &Path, json: bool) -> io::Result<Self> {
        let day = Local::now().date_naive();
        let writer = AuditFile::open_writer(dir, day)?;
        Ok(Self {
            json,
            audit: Mutex::new(AuditFile { dir: dir.to_path_buf(), day, writer }),
        })
    }

    /// Logs a single [`Event`] to stdout and the audit file.
    ///
    /// The audit line is written and flushed before this returns. If the
    /// calendar day changed since the last write, a new day-stamped file is
    /// opened; the old one is left as-is.
    pub fn log(&self, event: &Event) {
        let now = Local::now();
        let stamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
        let line = format!("[{} - {}] > {}", stamp, event.level_tag(), event.message());

        if self.json {
            // Serialise the event to a JSON Value so we can inject the
            // timestamp and level alongside the event fields.
            let mut val = serde_json::to_value(event).unwrap_or_default();
            if let Some(obj) = val.as_object_mut() {
                obj.insert("timestamp".to_string(), serde_json::Value::String(stamp));
                obj.insert(
                    "level".to_string(),
                    serde_json::Value::String(event.level_tag().to_string()),
                );
            }
            println!("{}", serde_json::to_string(&val).unwrap_or_default());
        } else {
            println!("{}", line);
        }

        if let Ok(mut audit) = self.audit.lock() {
            let today = now.date_naive();
            if today != audit.day {
                // Daily rollover. If the new file cannot be opened, keep the
                // old writer so the trail continues somewhere.
                if let Ok(writer) = AuditFile::open_writer(&audit.dir, today) {
                    audit.writer = writer;
                    audit.day = today;
                }
            }
            let _ = writeln!(audit.writer, "{}", line);
            let _ = audit.writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::fs;

    /// Reads back the single `*-watcher.log` file in `dir`.
    fn audit_contents(dir: &Path) -> String {
        let entry = fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .find(|e| e.file_name().to_string_lossy().ends_with("-watcher.log"))
            .expect("audit file not created");
        fs::read_to_string(entry.path()).unwrap()
    }

    #[test]
    fn audit_lines_are_well_formed() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(dir.path(), false).unwrap();

        logger.log(&Event::Info { message: "starting up" });
        logger.log(&Event::NewConnection {
            severity:    "ALERT",
            local_port:  22,
            remote_ip:   "1.2.3.4",
            remote_port: 51515,
            at:          "2026-08-08 10:00:00",
        });
        logger.log(&Event::NotifyFailed { error: "sink unreachable" });
        logger.log(&Event::ConfigWarning { message: "interval fell back to 5s" });

        let re = Regex::new(
            r"^\[\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} - (INFO|WARNING|ALERT|ERROR)\] > .+$",
        )
        .unwrap();
        let contents = audit_contents(dir.path());
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        for line in lines {
            assert!(re.is_match(line), "malformed audit line: {}", line);
        }
    }

    #[test]
    fn alert_line_carries_severity_and_port() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(dir.path(), false).unwrap();

        logger.log(&Event::NewConnection {
            severity:    "ALERT",
            local_port:  22,
            remote_ip:   "1.2.3.4",
            remote_port: 51515,
            at:          "2026-08-08 10:00:00",
        });

        let contents = audit_contents(dir.path());
        assert!(contents.contains(" - ALERT] > "));
        assert!(contents.contains("port 22"));
        assert!(contents.contains("1.2.3.4:51515"));
    }

    #[test]
    fn audit_file_is_day_stamped() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(dir.path(), false).unwrap();
        logger.log(&Event::Info { message: "hello" });

        let expected = format!("{}-watcher.log", Local::now().format("%Y-%m-%d"));
        assert!(dir.path().join(expected).exists());
    }

    #[test]
    fn reopening_appends_instead_of_truncating() {
        let dir = tempfile::tempdir().unwrap();
        {
            let logger = Logger::new(dir.path(), false).unwrap();
            logger.log(&Event::Info { message: "first run" });
        }
        {
            let logger = Logger::new(dir.path(), false).unwrap();
            logger.log(&Event::Info { message: "second run" });
        }

        let contents = audit_contents(dir.path());
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("first run"));
        assert!(contents.contains("second run"));
    }

    #[test]
    fn json_mode_keeps_the_audit_file_plain() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(dir.path(), true).unwrap();
        logger.log(&Event::SnapshotFailed { error: "boom" });

        let contents = audit_contents(dir.path());
        assert!(contents.starts_with('['));
        assert!(contents.contains(" - ERROR] > connection snapshot failed: boom"));
    }
}
