use std::{
    fmt,
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use futures::future::join_all;
use rand::random;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use crate::{
    config::Config,
    error::{PingError, Result},
    icmp::{EchoReply, PingIdentifier, PingSequence},
    ping::Pinger,
    resolve::{self, Resolve, SystemResolver},
};

/// Entry point for pinging hosts by name.
///
/// A `Client` holds no sockets; each probe opens its own through a
/// [`Pinger`] and closes it when done, so one client can drive any number of
/// concurrent probes on the same task.
#[derive(Debug, Clone)]
pub struct Client<R = SystemResolver> {
    config: Config,
    resolver: R,
}

impl Client {
    pub fn new(config: Config) -> Self {
        Self::with_resolver(config, SystemResolver)
    }
}

impl<R: Resolve> Client<R> {
    /// A client that resolves names through `resolver`.
    pub fn with_resolver(config: Config, resolver: R) -> Self {
        Client { config, resolver }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolves `host` to a single address of the configured family. The
    /// lookup is bounded by the configured timeout.
    pub async fn resolve(&self, host: &str) -> Result<IpAddr> {
        self.resolve_addr(host).await.map(|addr| addr.ip())
    }

    async fn resolve_addr(&self, host: &str) -> Result<SocketAddr> {
        let unresolved = || PingError::Resolution {
            host: host.to_string(),
            family: self.config.family,
        };
        let lookup = self.resolver.resolve(host);
        let candidates = match Instant::now().checked_add(self.config.timeout) {
            Some(deadline) => timeout_at(deadline, lookup).await.map_err(|_| {
                debug!("resolving {} timed out after {:?}", host, self.config.timeout);
                unresolved()
            })?,
            None => lookup.await,
        }
        .map_err(|err| {
            debug!("resolving {} failed: {}", host, err);
            unresolved()
        })?;
        resolve::select(&candidates, self.config.family).ok_or_else(unresolved)
    }

    /// Resolves `host` and opens a probe for it with a random identifier.
    pub async fn pinger(&self, host: &str) -> Result<Pinger> {
        let addr = self.resolve_addr(host).await?;
        let mut pinger = Pinger::new(addr.ip(), PingIdentifier(random()), &self.config)?;
        if let SocketAddr::V6(addr) = addr {
            pinger.scope_id(addr.scope_id());
        }
        Ok(pinger)
    }

    /// Sends one echo request to `host` and returns the round-trip time.
    pub async fn ping(&self, host: &str) -> Result<Duration> {
        self.ping_with_reply(host, PingSequence(0))
            .await
            .map(|(_, rtt)| rtt)
    }

    /// Like [`Client::ping`], also returning the reply that matched.
    pub async fn ping_with_reply(
        &self,
        host: &str,
        seq: PingSequence,
    ) -> Result<(EchoReply, Duration)> {
        self.pinger(host).await?.ping(seq).await
    }

    /// Sends `count` probes to `host` one after another and logs one line per
    /// attempt. A failed attempt does not stop the following ones.
    pub async fn verbose_ping(&self, host: &str, count: u16) -> Vec<Result<Duration>> {
        let mut results = Vec::with_capacity(usize::from(count));
        for idx in 0..count {
            let result = self
                .ping_with_reply(host, PingSequence(idx))
                .await
                .map(|(_, rtt)| rtt);
            match &result {
                Ok(rtt) => info!(
                    "{} get ping in {:0.4}ms",
                    host,
                    rtt.as_secs_f64() * 1000f64
                ),
                Err(e) => info!("{} failed: {}", host, e),
            }
            results.push(result);
        }
        results
    }

    /// Runs [`Client::verbose_ping`] for every host concurrently and
    /// summarizes each host's attempts.
    pub async fn ping_many<S: AsRef<str>>(&self, hosts: &[S], count: u16) -> Vec<PingReport> {
        let tasks = hosts.iter().map(|host| async move {
            let host = host.as_ref();
            PingReport::new(host, self.verbose_ping(host, count).await)
        });
        join_all(tasks).await
    }
}

/// Outcome of a batch of probes against one host.
#[derive(Debug)]
pub struct PingReport {
    pub host: String,
    pub results: Vec<Result<Duration>>,
}

impl PingReport {
    pub fn new(host: &str, results: Vec<Result<Duration>>) -> PingReport {
        PingReport {
            host: host.to_owned(),
            results,
        }
    }

    pub fn transmitted(&self) -> usize {
        self.results.len()
    }

    pub fn received(&self) -> usize {
        self.durations().count()
    }

    pub fn timeouts(&self) -> usize {
        self.results
            .iter()
            .filter(|res| matches!(res, Err(err) if err.is_timeout()))
            .count()
    }

    fn durations(&self) -> impl Iterator<Item = Duration> + '_ {
        self.results.iter().filter_map(|res| res.as_ref().ok().copied())
    }

    pub fn loss(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        (self.transmitted() - self.received()) as f64 / self.transmitted() as f64 * 100_f64
    }

    pub fn min(&self) -> Option<Duration> {
        self.durations().min()
    }

    pub fn max(&self) -> Option<Duration> {
        self.durations().max()
    }

    pub fn avg(&self) -> Option<Duration> {
        let sum: Duration = self.durations().sum();
        sum.checked_div(self.received() as u32)
    }

    /// Standard deviation of the round-trip times.
    pub fn mdev(&self) -> Option<Duration> {
        let avg = self.avg()?.as_secs_f64();
        let square_sum = self
            .durations()
            .fold(0_f64, |acc, dur| acc + dur.as_secs_f64() * dur.as_secs_f64());
        let variance = square_sum / self.received() as f64 - avg * avg;
        Some(Duration::from_secs_f64(variance.max(0.0).sqrt()))
    }
}

impl fmt::Display for PingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- {} ping statistics ---", self.host)?;
        write!(
            f,
            "{} packets transmitted, {} packets received, {:.2}% packet loss",
            self.transmitted(),
            self.received(),
            self.loss()
        )?;
        if let (Some(min), Some(avg), Some(max), Some(mdev)) =
            (self.min(), self.avg(), self.max(), self.mdev())
        {
            let ms = |dur: Duration| dur.as_secs_f64() * 1000f64;
            write!(
                f,
                "\nround-trip min/avg/max/stddev = {:.3}/{:.3}/{:.3}/{:.3} ms",
                ms(min),
                ms(avg),
                ms(max),
                ms(mdev)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{io, net::SocketAddr};

    use futures::future::{BoxFuture, FutureExt};

    use super::*;
    use crate::ICMP;

    /// Answers every lookup with a fixed list of addresses.
    struct StaticResolver(Vec<SocketAddr>);

    impl Resolve for StaticResolver {
        fn resolve<'a>(&'a self, _host: &'a str) -> BoxFuture<'a, io::Result<Vec<SocketAddr>>> {
            let addrs = self.0.clone();
            async move { Ok::<_, io::Error>(addrs) }.boxed()
        }
    }

    struct FailingResolver;

    impl Resolve for FailingResolver {
        fn resolve<'a>(&'a self, _host: &'a str) -> BoxFuture<'a, io::Result<Vec<SocketAddr>>> {
            let err = io::Error::new(io::ErrorKind::NotFound, "no such host");
            async move { Err::<Vec<SocketAddr>, _>(err) }.boxed()
        }
    }

    /// Never answers.
    struct PendingResolver;

    impl Resolve for PendingResolver {
        fn resolve<'a>(&'a self, _host: &'a str) -> BoxFuture<'a, io::Result<Vec<SocketAddr>>> {
            futures::future::pending().boxed()
        }
    }

    fn v4_only() -> StaticResolver {
        StaticResolver(vec!["192.0.2.1:0".parse().unwrap()])
    }

    #[tokio::test]
    async fn v6_request_for_v4_only_host() {
        let config = Config::builder().family(ICMP::V6).build();
        let client = Client::with_resolver(config, v4_only());
        match client.ping("v4only.example").await {
            Err(PingError::Resolution { host, family }) => {
                assert_eq!(host, "v4only.example");
                assert_eq!(family, Some(ICMP::V6));
            }
            other => panic!("expected resolution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn resolve_honours_family() {
        let resolver = StaticResolver(vec![
            "[2001:db8::1]:0".parse().unwrap(),
            "192.0.2.1:0".parse().unwrap(),
        ]);
        let config = Config::builder().family(ICMP::V4).build();
        let client = Client::with_resolver(config, resolver);
        assert_eq!(
            client.resolve("dual.example").await.unwrap(),
            "192.0.2.1".parse::<IpAddr>().unwrap()
        );
    }

    #[tokio::test]
    async fn lookup_failure_is_resolution_error() {
        let client = Client::with_resolver(Config::default(), FailingResolver);
        let err = client.resolve("nowhere.invalid").await.unwrap_err();
        assert!(matches!(err, PingError::Resolution { family: None, .. }));
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn stalled_lookup_is_resolution_error() {
        let config = Config::builder().timeout(Duration::from_millis(200)).build();
        let client = Client::with_resolver(config, PendingResolver);
        let result = tokio::time::timeout(Duration::from_secs(2), client.ping("stalled.example"))
            .await
            .expect("lookup was not bounded by the probe timeout");
        match result {
            Err(PingError::Resolution { host, family: None }) => {
                assert_eq!(host, "stalled.example")
            }
            other => panic!("expected resolution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn verbose_ping_reports_every_attempt() {
        let client = Client::with_resolver(Config::default(), FailingResolver);
        let results = client.verbose_ping("nowhere.invalid", 3).await;
        assert_eq!(results.len(), 3);
        assert!(results
            .iter()
            .all(|res| matches!(res, Err(PingError::Resolution { .. }))));
    }

    #[tokio::test]
    async fn ping_many_keeps_host_order() {
        let client = Client::with_resolver(Config::default(), FailingResolver);
        let reports = client.ping_many(&["a.invalid", "b.invalid"], 2).await;
        let hosts: Vec<_> = reports.iter().map(|r| r.host.as_str()).collect();
        assert_eq!(hosts, ["a.invalid", "b.invalid"]);
        assert!(reports.iter().all(|r| r.transmitted() == 2 && r.received() == 0));
    }

    #[test]
    fn report_statistics() {
        let report = PingReport::new(
            "example",
            vec![
                Ok(Duration::from_millis(10)),
                Err(PingError::Timeout { seq: PingSequence(1) }),
                Ok(Duration::from_millis(30)),
                Ok(Duration::from_millis(20)),
            ],
        );
        assert_eq!(report.transmitted(), 4);
        assert_eq!(report.received(), 3);
        assert_eq!(report.timeouts(), 1);
        assert_eq!(report.loss(), 25.0);
        assert_eq!(report.min(), Some(Duration::from_millis(10)));
        assert_eq!(report.max(), Some(Duration::from_millis(30)));
        assert_eq!(report.avg(), Some(Duration::from_millis(20)));

        let mdev = report.mdev().unwrap().as_secs_f64() * 1000.0;
        assert!((mdev - 8.165).abs() < 0.01, "mdev was {}", mdev);

        let text = report.to_string();
        assert!(text.starts_with("--- example ping statistics ---"));
        assert!(text.contains("4 packets transmitted, 3 packets received, 25.00% packet loss"));
        assert!(text.contains("round-trip min/avg/max/stddev = 10.000/20.000/30.000/"));
    }

    #[test]
    fn empty_report() {
        let report = PingReport::new("example", Vec::new());
        assert_eq!(report.loss(), 0.0);
        assert_eq!(report.avg(), None);
        assert_eq!(report.mdev(), None);
        assert!(!report.to_string().contains("round-trip"));
    }
}
