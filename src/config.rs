use std::{net::SocketAddr, time::Duration};

use socket2::{SockAddr, Type};

use crate::{icmp::DEFAULT_PAYLOAD_SIZE, ICMP};

/// Default time to wait for a matching reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Config is the packaging of everything a probe needs besides its target:
/// socket options, the address family filter and the reply deadline.
#[derive(Debug, Clone)]
pub struct Config {
    pub timeout: Duration,
    pub family: Option<ICMP>,
    pub sock_type_hint: Type,
    pub bind: Option<SockAddr>,
    pub interface: Option<String>,
    pub ttl: Option<u32>,
    pub payload_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            family: None,
            sock_type_hint: Type::RAW,
            bind: None,
            interface: None,
            ttl: None,
            payload_size: DEFAULT_PAYLOAD_SIZE,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Time budget of a probe, from the send until the matching reply.
    /// (default: 10s)
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Only resolve targets to addresses of this family.
    pub fn family(mut self, family: ICMP) -> Self {
        self.config.family = Some(family);
        self
    }

    /// Socket type tried first. When the OS refuses it for lack of privilege
    /// the other of `RAW`/`DGRAM` is tried. (default: `RAW`)
    pub fn sock_type_hint(mut self, typ: Type) -> Self {
        self.config.sock_type_hint = typ;
        self
    }

    /// Binds probe sockets to the specified address.
    ///
    /// This function directly corresponds to the `bind(2)` function on Windows
    /// and Unix.
    pub fn bind(mut self, bind: SocketAddr) -> Self {
        self.config.bind = Some(SockAddr::from(bind));
        self
    }

    /// Sets the value for the `SO_BINDTODEVICE` option on probe sockets.
    ///
    /// Only honoured on Android, Fuchsia and Linux.
    pub fn interface(mut self, interface: &str) -> Self {
        self.config.interface = Some(interface.to_string());
        self
    }

    /// Set the value of the `IP_TTL` option (`IPV6_UNICAST_HOPS` for IPv6).
    pub fn ttl(mut self, ttl: u32) -> Self {
        self.config.ttl = Some(ttl);
        self
    }

    /// Echo payload size in bytes, send timestamp included. Values below the
    /// timestamp width are raised to it. (default: 192)
    pub fn payload_size(mut self, size: usize) -> Self {
        self.config.payload_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.family, None);
        assert_eq!(config.sock_type_hint, Type::RAW);
        assert_eq!(config.payload_size, 192);
        assert!(config.bind.is_none());
    }

    #[test]
    fn builder_sets_fields() {
        let config = Config::builder()
            .timeout(Duration::from_millis(200))
            .family(ICMP::V6)
            .sock_type_hint(Type::DGRAM)
            .bind("[::1]:0".parse().unwrap())
            .ttl(64)
            .payload_size(56)
            .build();
        assert_eq!(config.timeout, Duration::from_millis(200));
        assert_eq!(config.family, Some(ICMP::V6));
        assert_eq!(config.sock_type_hint, Type::DGRAM);
        assert_eq!(
            config.bind.as_ref().and_then(|addr| addr.as_socket()),
            Some("[::1]:0".parse().unwrap())
        );
        assert_eq!(config.ttl, Some(64));
        assert_eq!(config.payload_size, 56);
    }
}
