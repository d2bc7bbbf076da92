use std::io;

use thiserror::Error;

use crate::{icmp::PingSequence, ICMP};

pub type Result<T> = std::result::Result<T, PingError>;

/// An error resulting from resolving a target, opening a probe socket or
/// exchanging echo messages.
#[derive(Error, Debug)]
pub enum PingError {
    #[error("unable to resolve {host}{}", family_suffix(.family))]
    Resolution { host: String, family: Option<ICMP> },
    #[error("permission denied opening ICMP socket (raw and datagram): {0}")]
    PermissionDenied(#[source] io::Error),
    #[error("socket creation failed: {0}")]
    SocketCreation(#[source] io::Error),
    #[error("malformed packet: {0}")]
    MalformedPacket(#[from] MalformedPacketError),
    #[error("request timeout for icmp_seq {seq}")]
    Timeout { seq: PingSequence },
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    #[error("buffer size was too small")]
    IncorrectBufferSize,
}

impl PingError {
    /// A timeout is an expected outcome of a probe rather than a fault.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PingError::Timeout { .. })
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MalformedPacketError {
    #[error("expected an IPv4 header, got {len} bytes")]
    TruncatedIpv4Header { len: usize },
    #[error("need {need} bytes of echo message at offset {offset}, got {len}")]
    TruncatedEcho {
        offset: usize,
        need: usize,
        len: usize,
    },
}

fn family_suffix(family: &Option<ICMP>) -> String {
    match family {
        Some(kind) => format!(" as {}", kind),
        None => String::new(),
    }
}
