//! pingkit integration test harness.
//!
//! Tests in this file open real raw ICMP sockets against the loopback
//! interface. Most of them need root or CAP_NET_RAW:
//!
//!   sudo cargo test --test integration
//!
//! Tests that need privilege skip gracefully without it; tests that check
//! the unprivileged failure path skip when running privileged.

mod loopback;

use std::time::Duration;

use anyhow::Result;
use pingkit_core::config::ProtocolConfig;
use pingkit_probe::{
    EchoTransport, Pinger, ProbeResult, SequentialIdentifiers, SystemSocketFactory,
};
use socket2::{Domain, Protocol, Socket, Type};

// ── Harness ───────────────────────────────────────────────────────────────────

pub const LOOPBACK: &str = "127.0.0.1";
pub const TIMEOUT: Duration = Duration::from_secs(2);

/// Check whether this process may open raw ICMP sockets.
pub fn raw_sockets_available() -> bool {
    Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)).is_ok()
}

/// A pinger on real sockets with predictable identifiers.
pub fn system_pinger(first_identifier: u16) -> Pinger<SystemSocketFactory, SequentialIdentifiers> {
    Pinger::new(
        EchoTransport::new(SystemSocketFactory, ProtocolConfig::default())
            .with_resolve_timeout(Duration::from_secs(3)),
        SequentialIdentifiers::starting_at(first_identifier),
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// Without privilege, opening the socket fails with a hint rather than a bare errno.
#[tokio::test]
async fn test_unprivileged_open_carries_hint() -> Result<()> {
    if raw_sockets_available() {
        eprintln!("SKIP: raw sockets are available, nothing to refuse");
        return Ok(());
    }

    let err = system_pinger(1)
        .probe_once(LOOPBACK, TIMEOUT)
        .await
        .expect_err("open should be refused");
    assert!(err.is_permission_denied(), "unexpected error: {err}");
    assert!(err.to_string().contains("privilege") || err.to_string().contains("root"));
    Ok(())
}

/// Name resolution happens before any socket is opened, so it works unprivileged.
#[tokio::test]
async fn test_unresolvable_host_is_a_result() -> Result<()> {
    let result = system_pinger(1)
        .probe_once("pingkit-integration.invalid", TIMEOUT)
        .await?;
    assert_eq!(result, ProbeResult::ResolutionFailure);
    Ok(())
}
