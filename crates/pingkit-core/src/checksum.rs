//! Internet checksum for ICMP packets.
//!
//! Words are summed in little-endian order and the folded complement is
//! byte-swapped at the end. The result is the RFC 1071 checksum expressed as
//! a host integer: store it with `to_be_bytes` and the wire bytes come out
//! identical to a big-endian summation on every platform.

/// Compute the checksum of `data`.
///
/// A trailing odd byte is added as a standalone value (zero high byte).
/// Running this over a packet whose checksum field is already filled in
/// yields `0`.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum = sum.wrapping_add(u32::from(u16::from_le_bytes([word[0], word[1]])));
    }
    if let [last] = words.remainder() {
        sum = sum.wrapping_add(u32::from(*last));
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    (!(sum as u16)).swap_bytes()
}
