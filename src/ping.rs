use std::{
    future::Future,
    io,
    net::{IpAddr, SocketAddr, SocketAddrV6},
    time::Duration,
};

use socket2::{SockAddr, Type};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace, warn};

use crate::{
    config::Config,
    error::{PingError, Result},
    icmp::{EchoReply, EchoRequest, PingIdentifier, PingSequence},
    platform::{self, Platform, PLATFORM},
    unix::AsyncSocket,
    ICMP,
};

const RECV_BUFFER_SIZE: usize = 2048;

/// A Pinger owns the socket of one probe: it sends a single echo request
/// and waits for the matching reply.
///
/// [`Pinger::ping`] consumes the pinger, so the socket is deregistered and
/// closed when the probe ends, whatever the outcome.
#[derive(Debug)]
pub struct Pinger {
    pub host: IpAddr,
    pub ident: PingIdentifier,
    kind: ICMP,
    timeout: Duration,
    payload_size: usize,
    has_ip_header: bool,
    scope_id: u32,
    socket: AsyncSocket,
}

impl Pinger {
    /// Opens a probe socket for `host`. Fails with
    /// [`PingError::PermissionDenied`] when neither a raw nor a datagram ICMP
    /// socket may be created, and with [`PingError::SocketCreation`] on any
    /// other OS error, descriptor exhaustion included.
    pub fn new(host: IpAddr, ident: PingIdentifier, config: &Config) -> Result<Pinger> {
        let kind = ICMP::from(host);
        let socket = AsyncSocket::new(kind, config)?;
        let has_ip_header = PLATFORM.has_ip_header(kind, socket.get_type());
        Ok(Pinger {
            host,
            ident,
            kind,
            timeout: config.timeout,
            payload_size: config.payload_size,
            has_ip_header,
            scope_id: 0,
            socket,
        })
    }

    /// The time budget of the probe, covering both the send and the wait for
    /// the reply.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Pinger {
        self.timeout = timeout;
        self
    }

    /// Sets the IPv6 scope id used for link-local targets.
    pub fn scope_id(&mut self, scope_id: u32) -> &mut Pinger {
        self.scope_id = scope_id;
        self
    }

    /// `RAW`, or `DGRAM` when raw sockets were refused.
    pub fn sock_type(&self) -> Type {
        self.socket.get_type()
    }

    /// Sends an echo request with sequence number `seq` and waits for the
    /// reply carrying this probe's identifier.
    pub async fn ping(self, seq: PingSequence) -> Result<(EchoReply, Duration)> {
        let deadline = Instant::now().checked_add(self.timeout);
        let target = match self.host {
            IpAddr::V4(_) => SockAddr::from(SocketAddr::new(self.host, 0)),
            IpAddr::V6(addr) => SockAddr::from(SocketAddrV6::new(addr, 0, 0, self.scope_id)),
        };

        let request = EchoRequest::new(self.ident, seq, platform::timestamp());
        let packet = request.encode(self.kind, self.payload_size)?;
        match within(deadline, self.socket.send_to(&packet, &target)).await {
            Some(sent) => sent?,
            None => return Err(self.timed_out(seq)),
        };

        let ident = self.effective_ident();
        debug!(
            "PING {} icmp_seq={} ident={} ({} bytes sent)",
            self.host,
            seq,
            ident,
            packet.len()
        );

        match within(deadline, self.wait_reply(ident)).await {
            Some(reply) => reply,
            None => Err(self.timed_out(seq)),
        }
    }

    fn effective_ident(&self) -> PingIdentifier {
        let sock_type = self.socket.get_type();
        if !PLATFORM.rewrites_identifier(sock_type) {
            return self.ident;
        }
        reply_ident(&PLATFORM, sock_type, self.socket.local_port(), self.ident)
    }

    async fn wait_reply(&self, ident: PingIdentifier) -> Result<(EchoReply, Duration)> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            let size = self.socket.recv(&mut buf).await?;
            let received = platform::timestamp();
            let datagram = &buf[..size];

            let reply = match EchoReply::decode(datagram, self.kind, self.has_ip_header) {
                Ok(reply) => reply,
                Err(err) => {
                    trace!(
                        "{}: dropping datagram ({}): {}",
                        self.host,
                        err,
                        hex::encode(datagram)
                    );
                    continue;
                }
            };
            if !reply.is_echo_reply(self.kind) || reply.identifier != ident {
                trace!(
                    "{}: ignoring type={} ident={} seq={}",
                    self.host,
                    reply.icmp_type,
                    reply.identifier,
                    reply.sequence
                );
                continue;
            }

            let rtt = platform::elapsed_between(reply.timestamp, received);
            debug!(
                "reply from {}: icmp_seq={} time={:0.3?}",
                self.host, reply.sequence, rtt
            );
            return Ok((reply, rtt));
        }
    }

    fn timed_out(&self, seq: PingSequence) -> PingError {
        debug!(
            "{}: icmp_seq={} timed out after {:?}",
            self.host, seq, self.timeout
        );
        PingError::Timeout { seq }
    }
}

/// Runs `fut` until `deadline`, or to completion when the timeout is too large
/// to be represented as an instant. `None` means the deadline passed first.
async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

/// The identifier replies will carry. Kernels that rewrite identifiers on
/// datagram sockets use the socket's local port instead; when that port
/// cannot be read the chosen identifier is kept.
fn reply_ident(
    platform: &Platform,
    sock_type: Type,
    local_port: io::Result<Option<u16>>,
    chosen: PingIdentifier,
) -> PingIdentifier {
    if !platform.rewrites_identifier(sock_type) {
        return chosen;
    }
    match local_port {
        Ok(Some(port)) if port != 0 => PingIdentifier(port),
        Ok(_) => {
            warn!("datagram socket has no local port, keeping ident {}", chosen);
            chosen
        }
        Err(err) => {
            warn!("reading local port failed, keeping ident {}: {}", chosen, err);
            chosen
        }
    }
}
