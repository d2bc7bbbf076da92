//! Asynchronous ICMP echo probes.
//!
//! Every probe owns one non-blocking ICMP socket (raw when permitted, the
//! unprivileged datagram kind otherwise) for exactly the time it takes to
//! send an echo request and wait for the matching reply. Probes suspend only
//! on socket readiness and on their deadline, so many of them can share a
//! single-threaded runtime.
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), aioping::PingError> {
//!     let rtt = aioping::ping("127.0.0.1", Duration::from_secs(1), None).await?;
//!     println!("time={:0.3?}", rtt);
//!     Ok(())
//! }
//! ```
#![cfg(unix)]

use std::{fmt, net::IpAddr, time::Duration};

mod checksum;
mod client;
mod config;
mod error;
mod icmp;
mod ping;
mod platform;
mod resolve;
mod unix;

pub use checksum::checksum;
pub use client::{Client, PingReport};
pub use config::{Config, ConfigBuilder, DEFAULT_TIMEOUT};
pub use error::{MalformedPacketError, PingError, Result};
pub use icmp::{
    icmpv4::make_icmpv4_echo_packet, icmpv6::make_icmpv6_echo_packet, EchoReply, EchoRequest,
    PingIdentifier, PingSequence, DEFAULT_PAYLOAD_SIZE,
};
pub use ping::Pinger;
pub use platform::{timestamp, Platform, PLATFORM};
pub use resolve::{Resolve, SystemResolver};

/// IP version a probe runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ICMP {
    #[default]
    V4,
    V6,
}

impl ICMP {
    pub fn echo_request_type(self) -> u8 {
        match self {
            ICMP::V4 => 8,
            ICMP::V6 => 128,
        }
    }

    pub fn echo_reply_type(self) -> u8 {
        match self {
            ICMP::V4 => 0,
            ICMP::V6 => 129,
        }
    }
}

impl From<IpAddr> for ICMP {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => ICMP::V4,
            IpAddr::V6(_) => ICMP::V6,
        }
    }
}

impl fmt::Display for ICMP {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ICMP::V4 => f.write_str("IPv4"),
            ICMP::V6 => f.write_str("IPv6"),
        }
    }
}

/// Sends one echo request to `host` and returns the round-trip time.
///
/// `family` restricts name resolution to one IP version. Fails with
/// [`PingError::Timeout`] when no matching reply arrives within `timeout`.
pub async fn ping(host: &str, timeout: Duration, family: Option<ICMP>) -> Result<Duration> {
    let mut builder = Config::builder().timeout(timeout);
    if let Some(family) = family {
        builder = builder.family(family);
    }
    Client::new(builder.build()).ping(host).await
}
