//! Echo identifier generation.
//!
//! A raw ICMP socket sees every echo reply on the host, so the identifier is
//! the only thing tying a reply to the probe that caused it. Sources take
//! `&self` so one source can be shared by concurrently running probes.

use std::sync::atomic::{AtomicU16, Ordering};

/// Hands out identifiers for new probes.
pub trait IdentifierSource: Send + Sync {
    fn next_identifier(&self) -> u16;
}

/// Uniformly random identifiers over the full 16-bit range.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdentifiers;

impl IdentifierSource for RandomIdentifiers {
    fn next_identifier(&self) -> u16 {
        rand::random()
    }
}

/// Consecutive identifiers, wrapping at 65535. Deterministic, for tests and replays.
#[derive(Debug)]
pub struct SequentialIdentifiers {
    next: AtomicU16,
}

impl SequentialIdentifiers {
    pub fn starting_at(first: u16) -> Self {
        Self {
            next: AtomicU16::new(first),
        }
    }
}

impl IdentifierSource for SequentialIdentifiers {
    fn next_identifier(&self) -> u16 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
