use pnet_packet::icmp::{self, echo_reply, IcmpCode};
use pnet_packet::ipv4;
use pnet_packet::Packet;

use super::{
    ensure_echo_len, read_timestamp, EchoReply, PingIdentifier, PingSequence, HEADER_SIZE,
};
use crate::checksum::checksum;
use crate::error::{MalformedPacketError, PingError, Result};

/// Length of an IPv4 header without options.
pub const IPV4_HEADER_SIZE: usize = 20;

pub fn make_icmpv4_echo_packet(
    ident: PingIdentifier,
    seq_cnt: PingSequence,
    payload: &[u8],
) -> Result<Vec<u8>> {
    let mut buf = vec![0; HEADER_SIZE + payload.len()];
    let mut packet = icmp::echo_request::MutableEchoRequestPacket::new(&mut buf[..])
        .ok_or(PingError::IncorrectBufferSize)?;
    packet.set_icmp_type(icmp::IcmpTypes::EchoRequest);
    packet.set_icmp_code(IcmpCode::new(0));
    packet.set_identifier(ident.into_u16());
    packet.set_sequence_number(seq_cnt.into_u16());
    packet.set_payload(payload);

    // checksum field is still zero here
    let sum = checksum(packet.packet());
    packet.set_checksum(sum);

    Ok(buf)
}

/// Offset of the ICMP message inside a datagram that starts with an IPv4
/// header, honouring header options.
fn icmp_offset(buf: &[u8]) -> Result<usize> {
    let ip_packet = ipv4::Ipv4Packet::new(buf)
        .ok_or(MalformedPacketError::TruncatedIpv4Header { len: buf.len() })?;
    Ok((usize::from(ip_packet.get_header_length()) * 4).max(IPV4_HEADER_SIZE))
}

pub fn decode_echo(buf: &[u8], has_ip_header: bool) -> Result<EchoReply> {
    let offset = if has_ip_header { icmp_offset(buf)? } else { 0 };
    ensure_echo_len(buf, offset)?;

    let message = &buf[offset..];
    // requests and replies share one layout, so the reply view reads both
    let echo = echo_reply::EchoReplyPacket::new(message).ok_or(
        MalformedPacketError::TruncatedEcho {
            offset,
            need: HEADER_SIZE,
            len: buf.len(),
        },
    )?;

    Ok(EchoReply {
        icmp_type: echo.get_icmp_type().0,
        code: echo.get_icmp_code().0,
        checksum: echo.get_checksum(),
        identifier: PingIdentifier(echo.get_identifier()),
        sequence: PingSequence(echo.get_sequence_number()),
        timestamp: read_timestamp(message),
    })
}
