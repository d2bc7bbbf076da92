//! Internet checksum (RFC 1071).

/// Computes the Internet checksum of `buf`.
///
/// Words are accumulated little-endian, folded, complemented and finally
/// byte-swapped, so the returned value is the checksum as it must appear on
/// the wire when written with `to_be_bytes`. A trailing odd byte is added as
/// a low byte.
pub fn checksum(buf: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut words = buf.chunks_exact(2);
    for word in &mut words {
        sum = sum.wrapping_add(u32::from(u16::from_le_bytes([word[0], word[1]])));
    }
    if let [last] = words.remainder() {
        sum = sum.wrapping_add(u32::from(*last));
    }

    while sum >> 16 != 0 {
        sum = (sum >> 16) + (sum & 0xffff);
    }

    (!sum as u16).swap_bytes()
}
