use std::time::Duration;

use aioping::{Client, Config, PingSequence, ICMP};
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "aioping")]
struct Opt {
    host: String,

    /// Specify the number of data bytes to be sent, including the 8 byte send
    /// timestamp.
    #[structopt(short = "s", long, default_value = "192")]
    size: usize,

    /// Bind probe sockets to this interface (Linux only).
    #[structopt(short = "I", long)]
    iface: Option<String>,

    /// Only use IPv6 addresses of the host.
    #[structopt(short = "6")]
    ipv6: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    pretty_env_logger::init();
    let opt = Opt::from_args();

    let mut config_builder = Config::builder()
        .payload_size(opt.size)
        .timeout(Duration::from_secs(1));

    if let Some(interface) = opt.iface {
        config_builder = config_builder.interface(&interface);
    }

    if opt.ipv6 {
        config_builder = config_builder.family(ICMP::V6);
    }

    let client = Client::new(config_builder.build());
    match client.ping_with_reply(&opt.host, PingSequence(0)).await {
        Ok((reply, rtt)) => {
            println!("{:?} {:0.2?}", reply, rtt);
        }
        Err(e) => println!("{}", e),
    };
}
