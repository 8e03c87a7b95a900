//! Vouch node - floods origin messages to UDP neighbors and counts the
//! attestations that come back.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use vouch_core::NodeId;
use vouch_runtime::{
    init_tracing, spawn_receiver, spawn_ticker, FloodEngine, NodeConfig, NodeRuntime,
};
use vouch_time::SystemClock;
use vouch_transport::{start_receive_loop, UdpTransport};

#[derive(Parser, Debug)]
#[command(name = "vouch-node")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Node id (nonzero)
    #[arg(short, long)]
    node_id: Option<u16>,

    /// UDP bind address
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Neighbor address; repeat for each neighbor
    #[arg(short = 'N', long = "neighbor", value_name = "ADDR")]
    neighbors: Vec<SocketAddr>,

    /// Log filter, overridden by RUST_LOG
    #[arg(short, long, default_value = "info")]
    log: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn node_config(&self) -> Result<NodeConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_file(path)?,
            None => NodeConfig::default(),
        };

        if let Some(node_id) = self.node_id {
            config.node_id = node_id;
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if !self.neighbors.is_empty() {
            config.neighbors = self.neighbors.clone();
        }
        config.json_logs |= self.json_logs;

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.node_config()?;
    init_tracing(&cli.log, config.json_logs)?;

    let node_id = NodeId::new(config.node_id);
    let engine = FloodEngine::new(node_id, config.engine_config(), SystemClock::new())?;

    let transport = UdpTransport::bind(config.bind)
        .await?
        .with_neighbors(config.neighbors.clone());
    info!(
        node = %node_id,
        addr = %transport.local_addr(),
        neighbors = config.neighbors.len(),
        "node listening"
    );

    let packets = start_receive_loop(transport.socket(), config.event_buffer);
    let (runtime, handle) = NodeRuntime::new(engine, transport, config.event_buffer);
    let node = tokio::spawn(runtime.run());

    let receiver = spawn_receiver(packets, handle.clone());
    let ticker = spawn_ticker(config.tick_schedule(), handle.clone());

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal, exiting gracefully");

    ticker.abort();
    receiver.abort();
    handle.shutdown().await?;
    let engine = node.await?;

    for line in engine.dump_cache() {
        info!("{}", line);
    }
    for line in engine.dump_store() {
        info!("{}", line);
    }
    let stats = engine.stats();
    info!(
        "Tx/Rx/MissedTx: {}/{}/{}",
        stats.tx, stats.rx, stats.missed_tx
    );
    info!(?stats, "final statistics");

    Ok(())
}
