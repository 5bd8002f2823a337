//! ICMP echo wire format.
//!
//! Echo Request and Echo Reply share one 8-byte header. Multi-byte fields are
//! network byte order on the wire; the zerocopy `U16<NetworkEndian>` fields
//! keep that explicit so the header can be written and read without any
//! manual shifting and without unsafe code.

use bytes::{Bytes, BytesMut};
use static_assertions::assert_eq_size;
use zerocopy::byteorder::{NetworkEndian, U16};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

use crate::checksum::checksum;

// ── Echo Header ───────────────────────────────────────────────────────────────

/// ICMP Echo Request / Echo Reply header.
///
/// Wire size: 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct IcmpEchoHeader {
    /// 8 for Echo Request, 0 for Echo Reply.
    pub icmp_type: u8,
    /// Always 0 for echo messages.
    pub code: u8,
    /// Internet checksum over header and payload, computed with this field zeroed.
    pub checksum: U16<NetworkEndian>,
    /// Correlates a reply with its request on a shared raw socket.
    pub identifier: U16<NetworkEndian>,
    pub sequence: U16<NetworkEndian>,
}

assert_eq_size!(IcmpEchoHeader, [u8; ICMP_HEADER_LEN]);

// ── Constants ─────────────────────────────────────────────────────────────────

pub const ICMP_ECHO_REQUEST: u8 = 8;
pub const ICMP_ECHO_REPLY: u8 = 0;

pub const ICMP_HEADER_LEN: usize = 8;

/// IPv4 header length assumed in front of every datagram read from a raw socket.
pub const IPV4_HEADER_LEN: usize = 20;

/// Shortest datagram that still carries a complete echo header.
pub const MIN_REPLY_LEN: usize = IPV4_HEADER_LEN + ICMP_HEADER_LEN;

/// Largest echo payload that fits in one IPv4 datagram.
pub const MAX_PAYLOAD: usize = 65535 - IPV4_HEADER_LEN - ICMP_HEADER_LEN;

pub const DEFAULT_PAYLOAD_LEN: usize = 192;
pub const DEFAULT_PAYLOAD_BYTE: u8 = b'Q';
pub const DEFAULT_SEQUENCE: u16 = 1;

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encode an echo message: header with a computed checksum, then `payload`.
pub fn encode_echo(icmp_type: u8, identifier: u16, sequence: u16, payload: &[u8]) -> Bytes {
    let mut header = IcmpEchoHeader {
        icmp_type,
        code: 0,
        checksum: U16::new(0),
        identifier: U16::new(identifier),
        sequence: U16::new(sequence),
    };

    let mut packet = BytesMut::with_capacity(ICMP_HEADER_LEN + payload.len());
    packet.extend_from_slice(header.as_bytes());
    packet.extend_from_slice(payload);

    header.checksum = U16::new(checksum(&packet));
    packet[..ICMP_HEADER_LEN].copy_from_slice(header.as_bytes());

    packet.freeze()
}

/// Build an Echo Request with the default sequence and filler payload.
pub fn build_echo_request(identifier: u16) -> Bytes {
    EchoTemplate::default().build(identifier)
}

/// Sequence number and payload shared by every request a pinger sends.
#[derive(Debug, Clone)]
pub struct EchoTemplate {
    sequence: u16,
    payload: Bytes,
}

impl EchoTemplate {
    /// A template with `payload_len` copies of `fill` as the payload.
    pub fn new(sequence: u16, payload_len: usize, fill: u8) -> Result<Self, WireError> {
        if payload_len > MAX_PAYLOAD {
            return Err(WireError::PayloadTooLarge(payload_len));
        }
        Ok(Self {
            sequence,
            payload: Bytes::from(vec![fill; payload_len]),
        })
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Encode an Echo Request for `identifier`.
    pub fn build(&self, identifier: u16) -> Bytes {
        encode_echo(ICMP_ECHO_REQUEST, identifier, self.sequence, &self.payload)
    }
}

impl Default for EchoTemplate {
    fn default() -> Self {
        Self {
            sequence: DEFAULT_SEQUENCE,
            payload: Bytes::from(vec![DEFAULT_PAYLOAD_BYTE; DEFAULT_PAYLOAD_LEN]),
        }
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Parse the echo header that follows the IPv4 header of a raw-socket datagram.
///
/// Datagrams shorter than [`MIN_REPLY_LEN`] are rejected.
pub fn parse_echo_reply(datagram: &[u8]) -> Result<IcmpEchoHeader, WireError> {
    let truncated = WireError::Truncated { len: datagram.len() };
    if datagram.len() < MIN_REPLY_LEN {
        return Err(truncated);
    }
    IcmpEchoHeader::read_from(&datagram[IPV4_HEADER_LEN..MIN_REPLY_LEN]).ok_or(truncated)
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("datagram of {len} bytes is too short for an echo header (need {})", MIN_REPLY_LEN)]
    Truncated { len: usize },

    #[error("payload length {0} exceeds maximum {}", MAX_PAYLOAD)]
    PayloadTooLarge(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
