//! Change detection between consecutive connection snapshots.

use crate::watcher::types::ConnKey;
use std::collections::HashSet;

/// Detects newly-appeared connections by set difference against the
/// previous cycle's snapshot.
///
/// The known set is replaced wholesale each cycle, never patched. A
/// connection that disappears and later reappears with the same tuple is
/// therefore reported again: being absent for even one poll means it was
/// forgotten. This trades connection-lifetime tracking for simplicity and
/// resilience against missed or noisy polls.
pub struct DiffEngine {
    known: HashSet<ConnKey>,
}

impl DiffEngine {
    /// Starts with an empty known set, so the first snapshot reports every
    /// connection it contains.
    pub fn new() -> Self {
        Self { known: HashSet::new() }
    }

    /// Returns the keys present in `snapshot` but absent from the known
    /// set, then adopts `snapshot` as the new known set.
    ///
    /// Calling `diff` twice with the same snapshot yields an empty result
    /// the second time, since the first call absorbed it.
    pub fn diff(&mut self, snapshot: HashSet<ConnKey>) -> Vec<ConnKey> {
        let new: Vec<ConnKey> = snapshot
            .iter()
            .filter(|key| !self.known.contains(*key))
            .cloned()
            .collect();
        self.known = snapshot;
        new
    }

    #[cfg(test)]
    pub fn known_len(&self) -> usize {
        self.known.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn key(local_port: u16, last_octet: u8, remote_port: u16) -> ConnKey {
        ConnKey {
            local_port,
            remote_ip: IpAddr::V4(Ipv4Addr::new(1, 2, 3, last_octet)),
            remote_port,
        }
    }

    fn snap(keys: &[ConnKey]) -> HashSet<ConnKey> {
        keys.iter().cloned().collect()
    }

    #[test]
    fn first_snapshot_reports_every_connection() {
        let mut engine = DiffEngine::new();
        let new = engine.diff(snap(&[key(22, 4, 51515), key(7777, 5, 40000)]));
        assert_eq!(new.len(), 2);
    }

    #[test]
    fn absorbed_snapshot_reports_nothing() {
        let mut engine = DiffEngine::new();
        let s = snap(&[key(22, 4, 51515)]);
        assert_eq!(engine.diff(s.clone()).len(), 1);
        assert!(engine.diff(s).is_empty());
    }

    #[test]
    fn empty_snapshot_clears_the_known_set() {
        let mut engine = DiffEngine::new();
        engine.diff(snap(&[key(22, 4, 51515)]));
        assert!(engine.diff(HashSet::new()).is_empty());
        assert_eq!(engine.known_len(), 0);
    }

    #[test]
    fn reappearing_connection_is_reported_again() {
        // S1 = {k}, S2 = {}, S3 = {k}: the third diff reports k again,
        // replace-not-merge.
        let mut engine = DiffEngine::new();
        let k = key(22, 4, 51515);
        assert_eq!(engine.diff(snap(&[k.clone()])).len(), 1);
        assert!(engine.diff(HashSet::new()).is_empty());
        assert_eq!(engine.diff(snap(&[k])).len(), 1);
    }

    #[test]
    fn teardown_produces_no_report() {
        let mut engine = DiffEngine::new();
        engine.diff(snap(&[key(22, 4, 51515), key(7777, 5, 40000)]));
        // One connection went away; the survivor is already known.
        let new = engine.diff(snap(&[key(22, 4, 51515)]));
        assert!(new.is_empty());
        assert_eq!(engine.known_len(), 1);
    }

    #[test]
    fn mixed_snapshot_reports_only_the_new_keys() {
        let mut engine = DiffEngine::new();
        engine.diff(snap(&[key(22, 4, 51515)]));
        let new = engine.diff(snap(&[key(22, 4, 51515), key(22, 9, 60000)]));
        assert_eq!(new, vec![key(22, 9, 60000)]);
    }
}
