use std::io::{self, Read};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::io::unix::AsyncFd;
use tracing::warn;

use crate::{
    config::Config,
    error::{PingError, Result},
    ICMP,
};

/// A non-blocking ICMP socket registered with the tokio reactor.
///
/// Dropping it removes the readiness registration before the descriptor is
/// closed, so a cancelled probe never leaves interest behind for a reused fd.
#[derive(Debug)]
pub(crate) struct AsyncSocket {
    inner: AsyncFd<Socket>,
    sock_type: Type,
}

impl AsyncSocket {
    pub(crate) fn new(kind: ICMP, config: &Config) -> Result<AsyncSocket> {
        let (socket, sock_type) = open(kind, config.sock_type_hint)?;
        configure(&socket, kind, config).map_err(PingError::SocketCreation)?;
        let inner = AsyncFd::new(socket).map_err(PingError::SocketCreation)?;
        Ok(AsyncSocket { inner, sock_type })
    }

    pub(crate) fn get_type(&self) -> Type {
        self.sock_type
    }

    /// The local "port" of the socket. Datagram ICMP sockets on Linux are
    /// assigned one on first send and use it as the echo identifier.
    pub(crate) fn local_port(&self) -> io::Result<Option<u16>> {
        let addr = self.inner.get_ref().local_addr()?;
        Ok(addr.as_socket().map(|addr| addr.port()))
    }

    /// Waits for write readiness and hands `buf` to the kernel.
    pub(crate) async fn send_to(&self, buf: &[u8], target: &SockAddr) -> io::Result<usize> {
        loop {
            let mut guard = self.inner.writable().await?;

            match guard.try_io(|inner| inner.get_ref().send_to(buf, target)) {
                Ok(Err(err)) if err.kind() == io::ErrorKind::Interrupted => continue,
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    /// Waits for read readiness and reads one datagram into `buf`.
    pub(crate) async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.inner.readable().await?;

            match guard.try_io(|inner| {
                let mut socket: &Socket = inner.get_ref();
                socket.read(buf)
            }) {
                Ok(Err(err)) if err.kind() == io::ErrorKind::Interrupted => continue,
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }
}

fn open(kind: ICMP, hint: Type) -> Result<(Socket, Type)> {
    let (domain, protocol) = match kind {
        ICMP::V4 => (Domain::IPV4, Protocol::ICMPV4),
        ICMP::V6 => (Domain::IPV6, Protocol::ICMPV6),
    };

    match Socket::new(domain, hint, Some(protocol)) {
        Ok(socket) => Ok((socket, hint)),
        Err(err) if is_permission_denied(&err) => {
            let fallback = if hint == Type::RAW {
                Type::DGRAM
            } else {
                Type::RAW
            };
            warn!(
                "{} socket for {} denied ({}), falling back to {}",
                type_name(hint),
                kind,
                err,
                type_name(fallback)
            );
            match Socket::new(domain, fallback, Some(protocol)) {
                Ok(socket) => Ok((socket, fallback)),
                Err(err) if is_permission_denied(&err) => Err(PingError::PermissionDenied(err)),
                Err(err) => Err(PingError::SocketCreation(err)),
            }
        }
        Err(err) => Err(PingError::SocketCreation(err)),
    }
}

fn configure(socket: &Socket, kind: ICMP, config: &Config) -> io::Result<()> {
    socket.set_nonblocking(true)?;
    if let Some(sock_addr) = &config.bind {
        socket.bind(sock_addr)?;
    }
    #[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
    if let Some(interface) = &config.interface {
        socket.bind_device(Some(interface.as_bytes()))?;
    }
    #[cfg(not(any(target_os = "android", target_os = "fuchsia", target_os = "linux")))]
    if let Some(interface) = &config.interface {
        tracing::debug!("ignoring interface {}: not supported on this platform", interface);
    }
    if let Some(ttl) = config.ttl {
        match kind {
            ICMP::V4 => socket.set_ttl(ttl)?,
            ICMP::V6 => socket.set_unicast_hops_v6(ttl)?,
        }
    }
    Ok(())
}

#[inline]
fn is_permission_denied(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::PermissionDenied)
}

fn type_name(typ: Type) -> &'static str {
    if typ == Type::RAW {
        "raw"
    } else {
        "datagram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_is_detected() {
        assert!(is_permission_denied(&io::Error::from(
            io::ErrorKind::PermissionDenied
        )));
        assert!(!is_permission_denied(&io::Error::from(
            io::ErrorKind::AddrInUse
        )));
    }

    #[tokio::test]
    async fn opens_some_socket_or_reports_permission() {
        match AsyncSocket::new(ICMP::V4, &Config::default()) {
            Ok(socket) => {
                let typ = socket.get_type();
                assert!(typ == Type::RAW || typ == Type::DGRAM);
            }
            Err(PingError::PermissionDenied(_)) => {}
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
}
