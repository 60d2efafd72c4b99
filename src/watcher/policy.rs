//! Port-to-severity policy.
//!
//! The mapping is parsed once at startup from a `PORT=SEV[,PORT=SEV...]`
//! specification and is immutable afterwards. Malformed entries are fatal
//! configuration errors; a *well-formed* severity value outside `1..=3` is
//! accepted here and surfaces per-event at classification time, so that a
//! misconfigured port still produces a visible (ERROR-labelled) alert
//! instead of being silently dropped.

use crate::watcher::types::Severity;
use std::collections::HashMap;
use thiserror::Error;

/// Fatal parse errors for the `--ports` specification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortSpecError {
    #[error("empty port specification")]
    Empty,

    #[error("malformed entry `{0}`, expected PORT=SEVERITY")]
    BadEntry(String),

    #[error("invalid port number `{0}`")]
    BadPort(String),

    #[error("invalid severity value `{0}` for port {1}")]
    BadSeverity(String, u16),

    #[error("port {0} listed more than once")]
    DuplicatePort(u16),
}

/// Immutable map from monitored local port to its configured severity.
#[derive(Debug)]
pub struct SeverityPolicy {
    map: HashMap<u16, u8>,
}

impl SeverityPolicy {
    /// Parses a `22=3,25565=1,7777=1` style specification.
    ///
    /// # Errors
    /// Returns a [`PortSpecError`] for an empty spec, a non-integer or zero
    /// port, a non-integer severity, or a duplicated port. Integral severity
    /// values outside `1..=3` parse successfully; see [`Self::classify`].
    pub fn parse(spec: &str) -> Result<Self, PortSpecError> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(PortSpecError::Empty);
        }

        let mut map = HashMap::new();
        for entry in trimmed.split(',') {
            let entry = entry.trim();
            let (port_s, sev_s) = entry
                .split_once('=')
                .ok_or_else(|| PortSpecError::BadEntry(entry.to_string()))?;

            // Port 0 is never a valid listening port, reject it with the
            // same error as a non-numeric value.
            let port: u16 = port_s
                .trim()
                .parse()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| PortSpecError::BadPort(port_s.trim().to_string()))?;

            let raw: u8 = sev_s
                .trim()
                .parse()
                .map_err(|_| PortSpecError::BadSeverity(sev_s.trim().to_string(), port))?;

            if map.insert(port, raw).is_some() {
                return Err(PortSpecError::DuplicatePort(port));
            }
        }

        Ok(Self { map })
    }

    /// Classifies a monitored port.
    ///
    /// Pure and total over the configured set: `Some(level)` for raw values
    /// `1..=3`, `None` when the configured value is out of range (the
    /// classification-anomaly path). Callers only query ports already
    /// filtered as monitored.
    pub fn classify(&self, port: u16) -> Option<Severity> {
        self.map.get(&port).copied().and_then(Severity::from_raw)
    }

    /// The raw configured severity value for a port, for anomaly reporting.
    pub fn raw(&self, port: u16) -> Option<u8> {
        self.map.get(&port).copied()
    }

    pub fn is_monitored(&self, port: u16) -> bool {
        self.map.contains_key(&port)
    }

    /// Human-readable summary of the mapping, sorted by port.
    pub fn describe(&self) -> String {
        let mut entries: Vec<(u16, u8)> = self.map.iter().map(|(p, s)| (*p, *s)).collect();
        entries.sort_unstable();
        let parts: Vec<String> = entries
            .iter()
            .map(|(port, raw)| match Severity::from_raw(*raw) {
                Some(level) => format!("{}={}", port, level.label()),
                None => format!("{}=?{}", port, raw),
            })
            .collect();
        format!("ports [{}]", parts.join(", "))
    }
}
