//! Echo transport: raw socket lifecycle and reply correlation.
//!
//! One socket per probe: open, send the request, wait for the matching reply
//! or the deadline, close. The raw socket sees every ICMP datagram delivered
//! to the host, so replies for other probes (and our own looped-back request)
//! are expected traffic and are discarded, not reported.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use pingkit_core::config::ProtocolConfig;
use pingkit_core::wire::{parse_echo_reply, ICMP_ECHO_REPLY, MIN_REPLY_LEN};
use tokio::time::{self, Instant};

use crate::error::ProbeError;
use crate::result::ProbeResult;
use crate::socket::{EchoSocket, RawSocketFactory};

/// Receive buffer size. Only the first `MIN_REPLY_LEN` bytes are inspected.
pub const RECV_BUFFER_LEN: usize = 1024;

/// Default bound on a single name lookup.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Hint used when the OS reports a permission error whose errno has no configured hint.
const GENERIC_PERMISSION_HINT: &str = "raw ICMP sockets require elevated privileges";

/// Stand-in deadline for budgets too large to add to an instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

pub struct EchoTransport<F> {
    factory: F,
    protocol: ProtocolConfig,
    resolve_timeout: Duration,
}

impl<F: RawSocketFactory> EchoTransport<F> {
    pub fn new(factory: F, protocol: ProtocolConfig) -> Self {
        Self {
            factory,
            protocol,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    pub fn with_resolve_timeout(mut self, resolve_timeout: Duration) -> Self {
        self.resolve_timeout = resolve_timeout;
        self
    }

    /// Open a raw socket for the configured ICMP protocol number.
    ///
    /// Privilege failures become [`ProbeError::PermissionDenied`] carrying the
    /// configured hint for the errno.
    pub async fn open(&self) -> Result<F::Socket, ProbeError> {
        let err = match self.factory.open(self.protocol.icmp_protocol).await {
            Ok(socket) => {
                tracing::trace!(protocol = self.protocol.icmp_protocol, "raw socket opened");
                return Ok(socket);
            }
            Err(e) => e,
        };

        let hint = err
            .raw_os_error()
            .and_then(|errno| self.protocol.permission_hint(errno))
            .or_else(|| (err.kind() == io::ErrorKind::PermissionDenied).then_some(GENERIC_PERMISSION_HINT));

        match hint {
            Some(hint) => Err(ProbeError::PermissionDenied {
                hint: hint.to_string(),
                source: err,
            }),
            None => Err(ProbeError::Io(err)),
        }
    }

    /// Resolve a hostname or dotted-quad to an IPv4 address.
    ///
    /// Bounded by the resolve timeout; a lookup that stalls is a resolution failure.
    pub async fn resolve(&self, host: &str) -> Result<Ipv4Addr, ProbeError> {
        if let Ok(addr) = host.parse::<Ipv4Addr>() {
            return Ok(addr);
        }

        let failure = |reason: String| ProbeError::Resolution {
            host: host.to_string(),
            reason,
        };

        let addrs = match time::timeout(self.resolve_timeout, tokio::net::lookup_host((host, 0))).await {
            Ok(Ok(addrs)) => addrs,
            Ok(Err(e)) => return Err(failure(e.to_string())),
            Err(_) => {
                return Err(failure(format!(
                    "lookup timed out after {}ms",
                    self.resolve_timeout.as_millis()
                )))
            }
        };

        addrs
            .filter_map(|addr| match addr {
                SocketAddr::V4(v4) => Some(*v4.ip()),
                SocketAddr::V6(_) => None,
            })
            .next()
            .ok_or_else(|| failure("no IPv4 address".to_string()))
    }

    /// Send the whole packet, looping over short writes.
    pub async fn send(
        &self,
        socket: &F::Socket,
        dest: Ipv4Addr,
        packet: &[u8],
    ) -> Result<(), ProbeError> {
        let mut remaining = packet;
        while !remaining.is_empty() {
            let sent = socket.send_to(remaining, dest).await?;
            if sent == 0 {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "raw socket accepted no bytes").into());
            }
            tracing::trace!(%dest, bytes = sent, "echo request sent");
            remaining = &remaining[sent..];
        }
        Ok(())
    }

    /// Wait for the Echo Reply carrying `identifier`.
    ///
    /// The deadline is `sent_at + budget`: time spent on stray or malformed
    /// datagrams counts against the budget. Returns `Timeout` once the
    /// deadline passes without a match.
    pub async fn receive(
        &self,
        socket: &F::Socket,
        identifier: u16,
        sent_at: Instant,
        budget: Duration,
    ) -> Result<ProbeResult, ProbeError> {
        let deadline = sent_at
            .checked_add(budget)
            .unwrap_or_else(|| sent_at + FAR_FUTURE);
        let mut buf = vec![0u8; RECV_BUFFER_LEN];

        loop {
            let len = match time::timeout_at(deadline, socket.recv(&mut buf)).await {
                Ok(read) => read?,
                Err(_) => return Ok(ProbeResult::Timeout),
            };
            let received_at = Instant::now();

            match parse_echo_reply(&buf[..len]) {
                Ok(header)
                    if header.icmp_type == ICMP_ECHO_REPLY && header.identifier.get() == identifier =>
                {
                    return Ok(ProbeResult::Delay(received_at - sent_at));
                }
                Ok(header) => tracing::trace!(
                    expected = identifier,
                    identifier = header.identifier.get(),
                    icmp_type = header.icmp_type,
                    "discarding stray datagram"
                ),
                Err(e) => tracing::debug!(
                    error = %e,
                    bytes = hex::encode(&buf[..len.min(MIN_REPLY_LEN)]),
                    "discarding malformed datagram"
                ),
            }

            if received_at >= deadline {
                return Ok(ProbeResult::Timeout);
            }
        }
    }

    /// Release the socket. Called exactly once for every socket `open` returned.
    pub fn close(&self, socket: F::Socket) {
        drop(socket);
        tracing::trace!("raw socket closed");
    }
}
