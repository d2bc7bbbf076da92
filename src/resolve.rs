use std::{
    io,
    net::{IpAddr, SocketAddr},
};

use futures::future::{BoxFuture, FutureExt};

use crate::ICMP;

/// Name resolution used by [`Client`](crate::Client) to turn a target into
/// candidate addresses.
pub trait Resolve {
    /// Returns every address `host` resolves to, in preference order.
    fn resolve<'a>(&'a self, host: &'a str) -> BoxFuture<'a, io::Result<Vec<SocketAddr>>>;
}

/// Resolves through the system resolver (`getaddrinfo`) on tokio's blocking
/// pool. IP literals are returned without a lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    fn resolve<'a>(&'a self, host: &'a str) -> BoxFuture<'a, io::Result<Vec<SocketAddr>>> {
        lookup(host).boxed()
    }
}

async fn lookup(host: &str) -> io::Result<Vec<SocketAddr>> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, 0)]);
    }
    Ok(tokio::net::lookup_host((host, 0)).await?.collect())
}

/// Picks the first candidate of the requested family, or the first candidate
/// at all when no family is requested.
pub(crate) fn select(candidates: &[SocketAddr], family: Option<ICMP>) -> Option<SocketAddr> {
    candidates
        .iter()
        .copied()
        .find(|addr| family.map_or(true, |family| ICMP::from(addr.ip()) == family))
}
