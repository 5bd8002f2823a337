//! Outcome of a single probe.

use std::time::Duration;

/// What one echo request produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// A matching Echo Reply arrived after this round-trip time.
    Delay(Duration),
    /// No matching reply within the budget.
    Timeout,
    /// The destination name did not resolve; nothing was sent.
    ResolutionFailure,
}

impl ProbeResult {
    pub fn delay(&self) -> Option<Duration> {
        match self {
            ProbeResult::Delay(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeResult::Timeout)
    }
}
