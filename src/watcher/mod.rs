//! Connection watch engine.
//!
//! One strictly sequential loop drives the whole pipeline: acquire a
//! snapshot of established connections, filter it to the monitored ports,
//! diff it against the previous cycle, classify each newly-appeared
//! connection, and dispatch an alert for it. No cycle begins before the
//! previous one (including its notification I/O) has finished, so the
//! known set needs no locking. A slow delivery delays the next poll
//! instead of overlapping with it.

pub mod diff;
pub mod dispatch;
pub mod policy;
pub mod snapshot;
pub mod types;

use crate::logger::{Event, SharedLogger};
use crate::notify::Notifier;
use crate::watcher::diff::DiffEngine;
use crate::watcher::dispatch::AlertDispatcher;
use crate::watcher::policy::SeverityPolicy;
use crate::watcher::snapshot::{SnapshotSource, SocketState};
use crate::watcher::types::{AlertEvent, ConnKey, SharedStats, ShutdownFlag};

use chrono::Local;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Configuration bundle passed from `main` into the watch engine.
pub struct WatcherConfig {
    /// Immutable port-to-severity mapping, validated at startup.
    pub policy:   SeverityPolicy,
    /// Provider of per-cycle connection snapshots.
    pub source:   Box<dyn SnapshotSource>,
    /// Pause between polling cycles.
    pub interval: Duration,
    /// Shared audit/console logger.
    pub logger:   SharedLogger,
    /// Shared session statistics for the shutdown summary.
    pub stats:    SharedStats,
    /// Set to `true` by the ctrlc handler; the loop exits on next check.
    pub shutdown: ShutdownFlag,
}

/// The polling state machine: STOPPED until [`Watcher::run`] is called,
/// RUNNING until the shutdown flag is set, then STOPPED again.
pub struct Watcher {
    policy:     SeverityPolicy,
    source:     Box<dyn SnapshotSource>,
    dispatcher: AlertDispatcher,
    engine:     DiffEngine,
    interval:   Duration,
    logger:     SharedLogger,
    stats:      SharedStats,
    shutdown:   ShutdownFlag,
}

impl Watcher {
    pub fn new(cfg: WatcherConfig, notifier: Box<dyn Notifier>) -> Self {
        let dispatcher =
            AlertDispatcher::new(Arc::clone(&cfg.logger), notifier, Arc::clone(&cfg.stats));
        let WatcherConfig { policy, source, interval, logger, stats, shutdown } = cfg;
        Self {
            policy,
            source,
            dispatcher,
            engine: DiffEngine::new(),
            interval,
            logger,
            stats,
            shutdown,
        }
    }

    /// Runs polling cycles until the shutdown flag is set.
    ///
    /// The inter-cycle sleep runs in 1-second increments so Ctrl+C is
    /// honoured within a second instead of waiting out the full interval.
    pub fn run(&mut self) {
        while !self.shutdown.load(Ordering::Relaxed) {
            self.cycle();

            let mut slept = Duration::ZERO;
            while slept < self.interval {
                if self.shutdown.load(Ordering::Relaxed) {
                    return;
                }
                thread::sleep(Duration::from_secs(1));
                slept += Duration::from_secs(1);
            }
        }
    }

    /// One polling cycle: snapshot, filter, diff, classify, dispatch.
    fn cycle(&mut self) {
        self.stats.cycles_total.fetch_add(1, Ordering::Relaxed);

        let entries = match self.source.snapshot() {
            Ok(entries) => entries,
            Err(e) => {
                // Recoverable: skip the diff entirely so the known set is
                // untouched and the next cycle resumes against it.
                self.stats.snapshot_failures.fetch_add(1, Ordering::Relaxed);
                let error = e.to_string();
                self.logger.log(&Event::SnapshotFailed { error: &error });
                return;
            }
        };

        let snapshot: HashSet<ConnKey> = entries
            .into_iter()
            .filter(|s| {
                s.state == SocketState::Established && self.policy.is_monitored(s.local_port)
            })
            .map(|s| ConnKey {
                local_port:  s.local_port,
                remote_ip:   s.remote_ip,
                remote_port: s.remote_port,
            })
            .collect();

        for key in self.engine.diff(snapshot) {
            let level = self.policy.classify(key.local_port);
            if level.is_none() {
                // The port is monitored but its configured severity is out
                // of range; flag the anomaly and dispatch anyway.
                let raw = self.policy.raw(key.local_port).unwrap_or(0);
                self.logger.log(&Event::ClassificationAnomaly {
                    local_port: key.local_port,
                    raw,
                });
            }
            let event = AlertEvent { key, level, when: Local::now() };
            self.dispatcher.dispatch(&event);
        }
    }
}
