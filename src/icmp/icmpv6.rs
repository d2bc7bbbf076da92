use pnet_packet::icmpv6::{self, Icmpv6Code};
use pnet_packet::Packet;

use super::{
    ensure_echo_len, read_timestamp, EchoReply, PingIdentifier, PingSequence, HEADER_SIZE,
};
use crate::checksum::checksum;
use crate::error::{MalformedPacketError, PingError, Result};

pub fn make_icmpv6_echo_packet(
    ident: PingIdentifier,
    seq_cnt: PingSequence,
    payload: &[u8],
) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; HEADER_SIZE + payload.len()];
    let mut packet =
        icmpv6::MutableIcmpv6Packet::new(&mut buf[..]).ok_or(PingError::IncorrectBufferSize)?;
    packet.set_icmpv6_type(icmpv6::Icmpv6Types::EchoRequest);
    packet.set_icmpv6_code(Icmpv6Code::new(0));

    // Identifier and sequence live in the generic ICMPv6 payload.
    let mut body = Vec::with_capacity(4 + payload.len());
    body.extend_from_slice(&ident.into_u16().to_be_bytes());
    body.extend_from_slice(&seq_cnt.into_u16().to_be_bytes());
    body.extend_from_slice(payload);
    packet.set_payload(&body);

    // The kernel overwrites this with a pseudo-header checksum
    // (https://tools.ietf.org/html/rfc3542#section-3.1), but a datagram that
    // leaves through a path which does not is still valid on its own.
    let sum = checksum(packet.packet());
    packet.set_checksum(sum);

    Ok(buf)
}

/// ICMPv6 sockets never deliver the IPv6 header, so the message starts at
/// offset zero.
pub fn decode_echo(buf: &[u8]) -> Result<EchoReply> {
    ensure_echo_len(buf, 0)?;

    let packet = icmpv6::Icmpv6Packet::new(buf).ok_or(MalformedPacketError::TruncatedEcho {
        offset: 0,
        need: HEADER_SIZE,
        len: buf.len(),
    })?;
    let payload = packet.payload();
    let identifier = u16::from_be_bytes([payload[0], payload[1]]);
    let sequence = u16::from_be_bytes([payload[2], payload[3]]);

    Ok(EchoReply {
        icmp_type: packet.get_icmpv6_type().0,
        code: packet.get_icmpv6_code().0,
        checksum: packet.get_checksum(),
        identifier: PingIdentifier(identifier),
        sequence: PingSequence(sequence),
        timestamp: read_timestamp(buf),
    })
}
