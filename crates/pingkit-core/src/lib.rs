//! pingkit-core: checksum, ICMP echo wire format, and configuration.
//! The probe engine and both binaries depend on this one.

pub mod checksum;
pub mod config;
pub mod wire;

pub use checksum::checksum;
pub use wire::{build_echo_request, parse_echo_reply, EchoTemplate, IcmpEchoHeader, WireError};
