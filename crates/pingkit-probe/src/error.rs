//! Errors surfaced by the probe engine.

use std::io;

/// Failures that abort a probe attempt.
///
/// A missing reply is not an error; see [`crate::ProbeResult::Timeout`].
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The OS refused to create a raw socket. `hint` says what privilege is missing.
    #[error("cannot open raw ICMP socket: {source} - {hint}")]
    PermissionDenied { source: io::Error, hint: String },

    /// The destination name could not be turned into an IPv4 address.
    #[error("cannot resolve {host}: {reason}")]
    Resolution { host: String, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ProbeError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ProbeError::PermissionDenied { .. })
    }
}
