mod backends;
mod config;
mod helpers;
mod info;
mod replay;
mod stats;

use crate::{config::ConfigFile, info::InfoTable};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::net::Ipv4Addr;
use udp_lb_common::{FALLBACK_SLOT, MAX_SERVERS, SERVICE_PORT, VERSION};
use udp_lb_datapath::{DestinationTable, FlowKey};

#[derive(Debug, Parser)]
#[clap(version, about = "UDP load balancer that hashes flows over a fixed backend table")]
struct Opt {
    /// Raise the log level, repeat for more details. RUST_LOG overrides it.
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and validate a config, then print the backends and their slot share
    Check(CheckOpt),
    /// Print the hash and slot of a client flow
    Hash(HashOpt),
    /// Dispatch captured frames through a table provisioned from a config
    Replay(replay::ReplayOpt),
}

#[derive(Debug, Args)]
struct CheckOpt {
    config: String,
}

#[derive(Debug, Args)]
struct HashOpt {
    /// Client source address
    src_ip: Ipv4Addr,

    /// Client source port
    src_port: u16,

    /// Destination port of the flow
    #[clap(long, default_value_t = SERVICE_PORT)]
    dport: u16,
}

fn default_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn check(opt: &CheckOpt) -> Result<(), anyhow::Error> {
    let cfg = ConfigFile::new(&opt.config).load()?;
    let backends = cfg.backends()?;
    let (ctl, _reader) = DestinationTable::create();
    backends::provision(&ctl, &cfg, &backends)?;

    println!("Service port: {}", cfg.service_port);
    backends::list(&ctl, &backends);

    Ok(())
}

fn hash(opt: &HashOpt) {
    let key = FlowKey::new(opt.src_ip, opt.src_port, opt.dport);
    let mut tab = InfoTable::new(vec!["flow", "key", "hash", "slot"]);

    tab.push_row(vec![
        format!("{}:{} -> :{}", opt.src_ip, opt.src_port, opt.dport),
        format!("{:08x}/{:08x}", key.src, key.ports),
        format!("{:08x}", key.hash()),
        format!("{}/{}", key.slot(), MAX_SERVERS),
    ]);
    tab.print("");

    if key.slot() == FALLBACK_SLOT {
        println!("The flow hashes to the fallback slot");
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let opt = Opt::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_log_level(opt.verbose)),
    )
    .init();

    info!("udp-lb version {:#x}", VERSION);

    match &opt.cmd {
        Command::Check(opt) => check(opt)?,
        Command::Hash(opt) => hash(opt),
        Command::Replay(opt) => replay::run(opt).await?,
    }

    Ok(())
}
