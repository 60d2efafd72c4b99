//! Connection snapshot acquisition.
//!
//! The watch loop never enumerates sockets itself; it talks to a
//! [`SnapshotSource`], which returns an already-typed row per socket. The
//! production implementation reads the kernel tables through the `procfs`
//! crate. Keeping the seam here lets tests drive the loop with scripted
//! snapshots and keeps the diff engine ignorant of enumeration details.

use procfs::net::TcpState;
use std::net::IpAddr;
use thiserror::Error;

/// Transport state of an observed socket, reduced to what the watcher
/// cares about: established or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Established,
    /// Listening, closing, time-wait and everything else. Never enters a
    /// snapshot.
    Other,
}

/// One row of a connection snapshot, prior to filtering.
#[derive(Debug, Clone)]
pub struct SocketEntry {
    pub local_port:  u16,
    pub remote_ip:   IpAddr,
    pub remote_port: u16,
    pub state:       SocketState,
}

/// Failure to enumerate host connections. Recoverable: the cycle is skipped
/// and the known set is left untouched.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to enumerate connections: {0}")]
    Proc(#[from] procfs::ProcError),
}

/// On-demand provider of the host's current socket table.
pub trait SnapshotSource {
    fn snapshot(&self) -> Result<Vec<SocketEntry>, SnapshotError>;
}

/// Production source backed by `/proc/net/tcp` and `/proc/net/tcp6`.
pub struct ProcSnapshotSource;

impl SnapshotSource for ProcSnapshotSource {
    fn snapshot(&self) -> Result<Vec<SocketEntry>, SnapshotError> {
        let mut rows = procfs::net::tcp()?;
        // Hosts without IPv6 have no /proc/net/tcp6; that is not an
        // acquisition failure.
        if let Ok(rows6) = procfs::net::tcp6() {
            rows.extend(rows6);
        }

        Ok(rows
            .into_iter()
            .map(|row| SocketEntry {
                local_port:  row.local_address.port(),
                remote_ip:   row.remote_address.ip(),
                remote_port: row.remote_address.port(),
                state: if matches!(row.state, TcpState::Established) {
                    SocketState::Established
                } else {
                    SocketState::Other
                },
            })
            .collect())
    }
}
