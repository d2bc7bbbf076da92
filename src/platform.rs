use std::time::{Duration, Instant};

use cfg_if::cfg_if;
use once_cell::sync::Lazy;
use socket2::Type;

use crate::ICMP;

/// Socket behaviour that differs between operating systems, resolved once
/// for the whole process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// An unprivileged `SOCK_DGRAM` ICMPv4 socket hands the IPv4 header to
    /// the application together with the ICMP message.
    pub dgram_includes_ipv4_header: bool,
    /// The kernel replaces the echo identifier of outgoing requests on
    /// `SOCK_DGRAM` sockets with the socket's local "port".
    pub dgram_rewrites_identifier: bool,
}

pub static PLATFORM: Lazy<Platform> = Lazy::new(Platform::detect);

static CLOCK_ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

impl Platform {
    fn detect() -> Self {
        cfg_if! {
            if #[cfg(any(target_os = "linux", target_os = "android"))] {
                Platform {
                    dgram_includes_ipv4_header: false,
                    dgram_rewrites_identifier: true,
                }
            } else if #[cfg(any(
                target_os = "macos",
                target_os = "ios",
                target_os = "freebsd",
                target_os = "netbsd",
                target_os = "openbsd",
                target_os = "dragonfly"
            ))] {
                Platform {
                    dgram_includes_ipv4_header: true,
                    dgram_rewrites_identifier: false,
                }
            } else {
                Platform {
                    dgram_includes_ipv4_header: false,
                    dgram_rewrites_identifier: false,
                }
            }
        }
    }

    /// Whether datagrams read from a socket of `sock_type` for `kind` start
    /// with an IP header.
    ///
    /// ICMPv6 sockets never deliver the IPv6 header. Raw ICMPv4 sockets always
    /// deliver the IPv4 header.
    pub fn has_ip_header(&self, kind: ICMP, sock_type: Type) -> bool {
        match kind {
            ICMP::V6 => false,
            ICMP::V4 if sock_type == Type::RAW => true,
            ICMP::V4 => self.dgram_includes_ipv4_header,
        }
    }

    pub fn rewrites_identifier(&self, sock_type: Type) -> bool {
        sock_type == Type::DGRAM && self.dgram_rewrites_identifier
    }
}

/// Seconds elapsed on the process-wide monotonic clock.
///
/// This is the value embedded in echo requests, so replies can be timed
/// without keeping per-request state.
pub fn timestamp() -> f64 {
    CLOCK_ORIGIN.elapsed().as_secs_f64()
}

/// Converts the difference between two [`timestamp`]s into a `Duration`,
/// clamping negative spans to zero.
pub fn elapsed_between(sent: f64, received: f64) -> Duration {
    let secs = received - sent;
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv6_never_has_header() {
        for platform in [
            Platform {
                dgram_includes_ipv4_header: true,
                dgram_rewrites_identifier: false,
            },
            *PLATFORM,
        ] {
            assert!(!platform.has_ip_header(ICMP::V6, Type::RAW));
            assert!(!platform.has_ip_header(ICMP::V6, Type::DGRAM));
            assert!(platform.has_ip_header(ICMP::V4, Type::RAW));
        }
    }

    #[test]
    fn dgram_ipv4_header_follows_platform() {
        let bsd = Platform {
            dgram_includes_ipv4_header: true,
            dgram_rewrites_identifier: false,
        };
        let linux = Platform {
            dgram_includes_ipv4_header: false,
            dgram_rewrites_identifier: true,
        };
        assert!(bsd.has_ip_header(ICMP::V4, Type::DGRAM));
        assert!(!linux.has_ip_header(ICMP::V4, Type::DGRAM));
        assert!(linux.rewrites_identifier(Type::DGRAM));
        assert!(!linux.rewrites_identifier(Type::RAW));
        assert!(!bsd.rewrites_identifier(Type::DGRAM));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_detection() {
        assert!(!PLATFORM.dgram_includes_ipv4_header);
        assert!(PLATFORM.dgram_rewrites_identifier);
    }

    #[test]
    fn clock_is_monotonic() {
        let a = timestamp();
        let b = timestamp();
        assert!(b >= a);
        assert_eq!(elapsed_between(b, a), Duration::ZERO);
        assert_eq!(elapsed_between(1.0, 1.5), Duration::from_millis(500));
        assert_eq!(elapsed_between(f64::NAN, 1.0), Duration::ZERO);
    }
}
