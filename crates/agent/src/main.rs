//! Agent binary running cairn nodes over in-process adaptors.
#![warn(missing_docs)]
#![warn(clippy::all)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cairn_gossip_memory::{MemoryGossip, MemoryGossipHub};
use cairn_membership::{Instance, InstanceConfig};
use cairn_raft::ServerId;
use cairn_raft_memory::MemoryConsensus;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

type Node = Instance<MemoryGossip, MemoryConsensus>;

/// Agent error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Config file could not be read
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        /// Path that was read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Config file is not valid TOML for an instance config
    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        /// Path that was parsed
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },

    /// A sibling's port would not fit in 16 bits
    #[error("port {port} plus offset {offset} overflows for local cluster sibling")]
    PortOverflow {
        /// Base port of the first node
        port: u16,
        /// Sibling index added to the port
        offset: u16,
    },

    /// Membership layer error
    #[error(transparent)]
    Membership(#[from] cairn_membership::MembershipError),

    /// Signal handler could not be installed
    #[error("signal handler error: {0}")]
    Signal(std::io::Error),

    /// Global tracing subscriber could not be installed
    #[error("tracing error: {0}")]
    Tracing(#[from] tracing::subscriber::SetGlobalDefaultError),
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Unique node name
    #[arg(long, env = "CAIRN_NAME")]
    name: Option<String>,

    /// Host the gossip layer binds to
    #[arg(long, env = "CAIRN_BIND_ADDR")]
    bind_addr: Option<String>,

    /// Port the gossip layer binds to
    #[arg(long, env = "CAIRN_BIND_PORT")]
    bind_port: Option<u16>,

    /// Start in single-node bootstrap mode
    #[arg(long, env = "CAIRN_BOOTSTRAP")]
    bootstrap: bool,

    /// Number of nodes to wait for before bootstrapping
    #[arg(long, env = "CAIRN_EXPECT")]
    expect: Option<usize>,

    /// Seed nodes to join, repeatable
    #[arg(long = "peers", env = "CAIRN_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Replication transport address announced to peers
    #[arg(long, env = "CAIRN_RAFT_ADDR")]
    raft_addr: Option<SocketAddr>,

    /// Client RPC address announced to peers
    #[arg(long, env = "CAIRN_RPC_ADDR")]
    rpc_addr: Option<SocketAddr>,

    /// TOML file holding an instance config; flags override its values
    #[arg(long, env = "CAIRN_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    /// Total nodes to run in this process, siblings join the first one
    #[arg(long, default_value_t = 1, env = "CAIRN_LOCAL_CLUSTER")]
    local_cluster: u16,

    /// Log level
    #[arg(long, default_value_t = Level::INFO, env = "CAIRN_LOG_LEVEL")]
    log_level: Level,
}

impl Args {
    /// Instance config from the config file, if any, with flags applied on top
    fn instance_config(&self) -> Result<InstanceConfig, Error> {
        let mut config = match &self.config_file {
            Some(path) => load_config(path)?,
            None => InstanceConfig::default(),
        };

        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(host) = &self.bind_addr {
            config.bind_host = host.clone();
        }
        if let Some(port) = self.bind_port {
            config.bind_port = port;
        }
        if self.bootstrap {
            config.bootstrap = true;
        }
        if let Some(expect) = self.expect {
            config.expect = expect;
        }
        if let Some(addr) = self.raft_addr {
            config.raft_addr = addr;
        }
        if let Some(addr) = self.rpc_addr {
            config.rpc_addr = addr;
        }

        Ok(config)
    }
}

fn load_config(path: &Path) -> Result<InstanceConfig, Error> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&contents).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Config for the `index`th in-process sibling of `base`, counting from 1
fn sibling_config(base: &InstanceConfig, index: u16) -> Result<InstanceConfig, Error> {
    let offset_port = |port: u16| {
        port.checked_add(index).ok_or(Error::PortOverflow {
            port,
            offset: index,
        })
    };
    let offset_addr =
        |addr: SocketAddr| offset_port(addr.port()).map(|port| SocketAddr::new(addr.ip(), port));

    Ok(InstanceConfig {
        name: format!("{}-{}", base.name, index + 1),
        bind_port: offset_port(base.bind_port)?,
        raft_addr: offset_addr(base.raft_addr)?,
        rpc_addr: offset_addr(base.rpc_addr)?,
        bootstrap: false,
        ..base.clone()
    })
}

fn build_node(hub: &MemoryGossipHub, config: InstanceConfig) -> Result<Node, Error> {
    let gossip = MemoryGossip::new(
        hub.clone(),
        config.name.clone(),
        config.bind_addr(),
        config.local_tags(),
    );
    let consensus = MemoryConsensus::with_election(ServerId(config.name.clone()));

    let node = Instance::new(config, Arc::new(gossip), Arc::new(consensus))?;
    node.start()?;
    Ok(node)
}

async fn wait_for_signal() -> Result<(), Error> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).map_err(Error::Signal)?;
        let mut sigint = signal(SignalKind::interrupt()).map_err(Error::Signal)?;

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map_err(Error::Signal)?;
        info!("Received interrupt signal");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = args.instance_config()?;
    let hub = MemoryGossipHub::new();

    let primary = build_node(&hub, config.clone())?;
    primary.join(&args.peers).await?;

    let mut nodes = vec![primary];
    let seeds = vec![config.name.clone()];
    for index in 1..args.local_cluster.max(1) {
        let sibling = build_node(&hub, sibling_config(&config, index)?)?;
        sibling.join(&seeds).await?;
        nodes.push(sibling);
    }

    info!("Running {} node(s): {}", nodes.len(), hub.member_names().join(", "));

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    let signals = tokio::spawn(async move {
        let result = wait_for_signal().await;
        signal_token.cancel();
        result
    });

    shutdown_token.cancelled().await;
    match signals.await {
        Ok(Err(e)) => error!("{e}"),
        Err(e) => error!("Signal task failed: {e}"),
        Ok(Ok(())) => {}
    }

    info!("Shutting down");

    // Leave first so the remaining nodes see graceful departures
    for node in &nodes {
        if let Err(e) = node.leave().await {
            error!("Failed to leave {}: {e}", node.name());
        }
    }
    for node in &nodes {
        node.shutdown().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from([
            "cairn-agent",
            "--name",
            "node-1",
            "--expect",
            "3",
            "--peers",
            "node-2",
            "--peers",
            "node-3",
            "--raft-addr",
            "10.0.0.1:9000",
        ])
        .unwrap();

        let config = args.instance_config().unwrap();
        assert_eq!(config.name, "node-1");
        assert_eq!(config.expect, 3);
        assert_eq!(config.raft_addr, "10.0.0.1:9000".parse().unwrap());
        assert_eq!(config.bind_port, 7946);
        assert_eq!(args.peers, vec!["node-2", "node-3"]);
    }

    #[test]
    fn test_sibling_configs_are_offset() {
        let base = InstanceConfig::new("node").with_expect(3).with_bootstrap(true);

        let sibling = sibling_config(&base, 2).unwrap();
        assert_eq!(sibling.name, "node-3");
        assert_eq!(sibling.bind_port, 7948);
        assert_eq!(sibling.raft_addr, "127.0.0.1:8302".parse().unwrap());
        assert_eq!(sibling.rpc_addr, "127.0.0.1:8402".parse().unwrap());
        assert_eq!(sibling.expect, 3);
        assert!(!sibling.bootstrap);
    }

    #[test]
    fn test_sibling_ports_must_fit() {
        let base = InstanceConfig::new("node").with_raft_addr("127.0.0.1:65535".parse().unwrap());

        assert!(sibling_config(&base, 0).is_ok());
        assert!(matches!(
            sibling_config(&base, 1),
            Err(Error::PortOverflow {
                port: 65535,
                offset: 1
            })
        ));

        let base = InstanceConfig::new("node").with_bind_port(65534);
        assert_eq!(sibling_config(&base, 1).unwrap().bind_port, 65535);
        assert!(sibling_config(&base, 2).is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let args = Args::try_parse_from([
            "cairn-agent",
            "--config-file",
            "/nonexistent/cairn.toml",
        ])
        .unwrap();

        assert!(matches!(
            args.instance_config(),
            Err(Error::ConfigRead { .. })
        ));
    }
}
