use chrono::{DateTime, Local};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

/// Set to `true` by the ctrlc handler; the watch loop exits on next check.
pub type ShutdownFlag = Arc<AtomicBool>;

/// Ordered severity classification for a monitored port.
///
/// Configuration maps each port to a raw integer (1, 2 or 3). The ordering
/// `Info < Warning < Alert` is part of the public contract and is relied on
/// by alert framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Alert,
}

impl Severity {
    /// Maps a raw configured severity value to a level.
    ///
    /// Returns `None` for anything outside `1..=3`; the caller surfaces that
    /// as a classification anomaly rather than a crash.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Severity::Info),
            2 => Some(Severity::Warning),
            3 => Some(Severity::Alert),
            _ => None,
        }
    }

    /// The audit-log level tag for this severity.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info    => "INFO",
            Severity::Warning => "WARNING",
            Severity::Alert   => "ALERT",
        }
    }
}

/// Identity of one observed established connection.
///
/// Two connections with the same key are the same connection for change
/// detection, even across polling cycles.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ConnKey {
    pub local_port:  u16,
    pub remote_ip:   IpAddr,
    pub remote_port: u16,
}

/// A newly-appeared connection plus its classification and capture time.
///
/// Consumed by the dispatcher and then dropped; the audit log is the only
/// durable record. `level == None` means the port's configured severity was
/// outside the valid range and the event is dispatched under the ERROR label.
#[derive(Debug)]
pub struct AlertEvent {
    pub key:   ConnKey,
    pub level: Option<Severity>,
    pub when:  DateTime<Local>,
}

/// Session-wide counters reported in the shutdown summary.
///
/// Plain atomics: the watch loop and the summary printer are the only
/// writers/readers, so `Relaxed` ordering is sufficient everywhere.
pub struct SessionStats {
    /// Polling cycles attempted, including ones whose snapshot failed.
    pub cycles_total:      AtomicU64,
    /// Cycles skipped because connection enumeration failed.
    pub snapshot_failures: AtomicU64,
    /// Alert events dispatched (audited and handed to the notifier).
    pub alerts_dispatched: AtomicU64,
    /// Notification attempts that returned an error.
    pub notify_failures:   AtomicU64,
}

/// Type alias used throughout the codebase for convenience.
pub type SharedStats = Arc<SessionStats>;

impl SessionStats {
    pub fn new() -> SharedStats {
        Arc::new(Self {
            cycles_total:      AtomicU64::new(0),
            snapshot_failures: AtomicU64::new(0),
            alerts_dispatched: AtomicU64::new(0),
            notify_failures:   AtomicU64::new(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Alert);
    }

    #[test]
    fn severity_from_raw_maps_valid_values() {
        assert_eq!(Severity::from_raw(1), Some(Severity::Info));
        assert_eq!(Severity::from_raw(2), Some(Severity::Warning));
        assert_eq!(Severity::from_raw(3), Some(Severity::Alert));
    }

    #[test]
    fn severity_from_raw_rejects_out_of_range_values() {
        assert_eq!(Severity::from_raw(0), None);
        assert_eq!(Severity::from_raw(4), None);
        assert_eq!(Severity::from_raw(255), None);
    }
}
