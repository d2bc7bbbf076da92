use std::time::Duration;

use aioping::{Client, Config};
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "multi_ping")]
struct Opt {
    /// Number of probes sent to every host, one after another.
    #[structopt(short = "c", long, default_value = "3")]
    count: u16,

    /// Seconds to wait for each reply.
    #[structopt(short = "t", long, default_value = "2")]
    timeout: u64,

    hosts: Vec<String>,
}

// RUST_LOG=info shows one line per attempt.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    pretty_env_logger::init();
    let mut opt = Opt::from_args();
    if opt.hosts.is_empty() {
        opt.hosts = vec![
            "heise.de".to_string(),
            "google.com".to_string(),
            "a-test-url-taht-is-not-available.com".to_string(),
            "192.168.1.111".to_string(),
        ];
    }

    let config = Config::builder()
        .timeout(Duration::from_secs(opt.timeout))
        .build();
    let client = Client::new(config);

    for report in client.ping_many(&opt.hosts, opt.count).await {
        println!("\n{}", report);
    }
}
