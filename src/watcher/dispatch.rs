//! Alert dispatch: the dual-sink side-effect pipeline.
//!
//! Every newly-appeared connection produces exactly one audit-log line and
//! exactly one notification attempt. The audit append always happens first
//! and is the authoritative record; notification delivery is best-effort,
//! and a delivery failure is itself logged at ERROR without stopping the
//! watch loop.

use crate::logger::{Event, SharedLogger};
use crate::notify::Notifier;
use crate::watcher::types::{AlertEvent, Severity, SharedStats};
use std::sync::atomic::Ordering;

pub struct AlertDispatcher {
    logger:   SharedLogger,
    notifier: Box<dyn Notifier>,
    stats:    SharedStats,
}

impl AlertDispatcher {
    pub fn new(logger: SharedLogger, notifier: Box<dyn Notifier>, stats: SharedStats) -> Self {
        Self { logger, notifier, stats }
    }

    /// Audits and forwards one alert event.
    ///
    /// An event without a valid severity (out-of-range configured value) is
    /// dispatched under the ERROR label rather than dropped; visibility is
    /// preferred over suppression.
    pub fn dispatch(&self, event: &AlertEvent) {
        let tag = event.level.map(Severity::label).unwrap_or("ERROR");
        let at = event.when.format("%Y-%m-%d %H:%M:%S").to_string();
        let remote_ip = event.key.remote_ip.to_string();

        // Audit first, so the record is durable before any network I/O.
        self.logger.log(&Event::NewConnection {
            severity:    tag,
            local_port:  event.key.local_port,
            remote_ip:   &remote_ip,
            remote_port: event.key.remote_port,
            at:          &at,
        });
        self.stats.alerts_dispatched.fetch_add(1, Ordering::Relaxed);

        let text = format!(
            "[{}] New connection on port {} from {}:{} at {}",
            tag, event.key.local_port, remote_ip, event.key.remote_port, at
        );
        if let Err(e) = self.notifier.send(&text) {
            self.stats.notify_failures.fetch_add(1, Ordering::Relaxed);
            let error = e.to_string();
            self.logger.log(&Event::NotifyFailed { error: &error });
        }
    }
}
