use std::fmt;

use crate::{
    error::{MalformedPacketError, Result},
    ICMP,
};

pub mod icmpv4;
pub mod icmpv6;

/// Size of the echo header: type, code, checksum, identifier and sequence.
pub const HEADER_SIZE: usize = 8;
/// Width of the send timestamp at the start of the echo payload.
pub const TIMESTAMP_SIZE: usize = 8;
/// Default echo payload size, timestamp included.
pub const DEFAULT_PAYLOAD_SIZE: usize = 192;

const FILLER: u8 = b'Q';

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PingIdentifier(pub u16);

impl PingIdentifier {
    pub fn into_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for PingIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u16> for PingIdentifier {
    fn from(ident: u16) -> Self {
        Self(ident)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PingSequence(pub u16);

impl PingSequence {
    pub fn into_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for PingSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u16> for PingSequence {
    fn from(seq_cnt: u16) -> Self {
        Self(seq_cnt)
    }
}

/// An echo request about to be put on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoRequest {
    pub ident: PingIdentifier,
    pub seq: PingSequence,
    /// Send time on the process clock, see [`crate::platform::timestamp`].
    pub timestamp: f64,
}

impl EchoRequest {
    pub fn new(ident: PingIdentifier, seq: PingSequence, timestamp: f64) -> Self {
        EchoRequest {
            ident,
            seq,
            timestamp,
        }
    }

    /// Serializes the request with a checksummed header and a payload of
    /// `payload_size` bytes (clamped up to the timestamp width).
    pub fn encode(&self, kind: ICMP, payload_size: usize) -> Result<Vec<u8>> {
        let payload = make_payload(self.timestamp, payload_size);
        match kind {
            ICMP::V4 => icmpv4::make_icmpv4_echo_packet(self.ident, self.seq, &payload),
            ICMP::V6 => icmpv6::make_icmpv6_echo_packet(self.ident, self.seq, &payload),
        }
    }
}

/// Timestamp in host byte order followed by deterministic filler.
pub(crate) fn make_payload(timestamp: f64, payload_size: usize) -> Vec<u8> {
    let mut payload = Vec::with_capacity(payload_size.max(TIMESTAMP_SIZE));
    payload.extend_from_slice(&timestamp.to_ne_bytes());
    payload.resize(payload_size.max(TIMESTAMP_SIZE), FILLER);
    payload
}

/// An inbound echo message, request or reply, as seen by a probe socket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoReply {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub identifier: PingIdentifier,
    pub sequence: PingSequence,
    /// The timestamp the sender embedded in the payload.
    pub timestamp: f64,
}

impl EchoReply {
    /// Parses `buf` as read from a probe socket.
    ///
    /// `has_ip_header` tells whether the socket delivers the IPv4 header in
    /// front of the ICMP message; it is ignored for ICMPv6.
    pub fn decode(buf: &[u8], kind: ICMP, has_ip_header: bool) -> Result<Self> {
        match kind {
            ICMP::V4 => icmpv4::decode_echo(buf, has_ip_header),
            ICMP::V6 => icmpv6::decode_echo(buf),
        }
    }

    pub fn is_echo_reply(&self, kind: ICMP) -> bool {
        self.icmp_type == kind.echo_reply_type()
    }
}

/// Reads the embedded send timestamp from an ICMP message already known to
/// be long enough.
fn read_timestamp(message: &[u8]) -> f64 {
    let mut raw = [0u8; TIMESTAMP_SIZE];
    raw.copy_from_slice(&message[HEADER_SIZE..HEADER_SIZE + TIMESTAMP_SIZE]);
    f64::from_ne_bytes(raw)
}

fn ensure_echo_len(buf: &[u8], offset: usize) -> Result<()> {
    let need = HEADER_SIZE + TIMESTAMP_SIZE;
    if buf.len() < offset + need {
        return Err(MalformedPacketError::TruncatedEcho {
            offset,
            need,
            len: buf.len(),
        }
        .into());
    }
    Ok(())
}
