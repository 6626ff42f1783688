//! The node-level orchestrator

use std::sync::Arc;
use std::time::Duration;

use cairn_gossip::{EventReceiver, GossipAdaptor, GossipEvent, Tags};
use cairn_raft::{ConsensusAdaptor, Server, ServerAddress, ServerId};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::bootstrap::{BootstrapDecision, ExpectMode};
use crate::config::InstanceConfig;
use crate::error::{MembershipError, MembershipResult};
use crate::peer::Peer;
use crate::registry::PeerRegistry;
use crate::router::{EventOutcome, MembershipRouter};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Lifecycle {
    started: bool,
    left: bool,
    shut_down: bool,
}

/// A cairn node: gossip membership wired to the consensus engine
///
/// Owns the peer registry and feeds gossip events through the
/// [`MembershipRouter`]. Events are consumed either by the loop spawned in
/// [`Instance::start`] or by calling [`Instance::handle_event`] directly.
pub struct Instance<G, C>
where
    G: GossipAdaptor,
    C: ConsensusAdaptor,
{
    config: InstanceConfig,
    gossip: Arc<G>,
    consensus: Arc<C>,
    router: Arc<MembershipRouter<C>>,
    lifecycle: Mutex<Lifecycle>,
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl<G, C> Instance<G, C>
where
    G: GossipAdaptor,
    C: ConsensusAdaptor,
{
    /// Create an instance after validating its configuration
    pub fn new(config: InstanceConfig, gossip: Arc<G>, consensus: Arc<C>) -> MembershipResult<Self> {
        config.validate()?;

        let router = Arc::new(MembershipRouter::new(
            config.expect,
            consensus.clone(),
            Arc::new(PeerRegistry::new()),
        ));

        info!(
            "Created instance {} (expect: {}, bootstrap: {})",
            config.name, config.expect, config.bootstrap
        );

        Ok(Self {
            config,
            gossip,
            consensus,
            router,
            lifecycle: Mutex::new(Lifecycle::default()),
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Spawn the loop that consumes gossip events
    pub fn start(&self) -> MembershipResult<()> {
        let events = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.started || lifecycle.shut_down {
                return Err(MembershipError::AlreadyStarted);
            }
            let events = self
                .gossip
                .take_events()
                .ok_or(MembershipError::AlreadyStarted)?;
            lifecycle.started = true;
            events
        };

        let router = self.router.clone();
        let cancellation = self.cancellation_token.clone();
        let name = self.config.name.clone();

        self.task_tracker.spawn(async move {
            Self::event_loop(name, router, events, cancellation).await;
        });

        debug!("Started event loop for {}", self.config.name);
        Ok(())
    }

    async fn event_loop(
        name: String,
        router: Arc<MembershipRouter<C>>,
        mut events: EventReceiver,
        cancellation: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancellation.cancelled() => {
                    debug!("Event loop for {name} cancelled");
                    break;
                }
                event = events.recv() => event,
            };

            match event {
                Some(event) => {
                    router.handle_event(&event).await;
                }
                None => {
                    debug!("Gossip event stream for {name} closed");
                    break;
                }
            }
        }
    }

    /// Contact seed nodes, returning how many were reached
    ///
    /// A node started in bootstrap mode also bootstraps a single-node
    /// cluster the first time it joins with an empty log. A failed index read
    /// or a rejected bootstrap is returned as [`MembershipError::Bootstrap`];
    /// only the former is retried by joining again.
    pub async fn join(&self, seeds: &[String]) -> MembershipResult<usize> {
        let contacted = self
            .gossip
            .join(seeds)
            .await
            .map_err(MembershipError::gossip)?;

        info!("{} joined gossip, contacted {} nodes", self.config.name, contacted);

        if self.config.bootstrap {
            let local = Server::voter(
                ServerId(self.config.name.clone()),
                ServerAddress(self.config.raft_addr.to_string()),
            );
            match self.router.coordinator().bootstrap_single(local).await {
                BootstrapDecision::IndexUnavailable => {
                    return Err(MembershipError::Bootstrap(
                        "last consensus index unavailable, join again to retry".to_string(),
                    ));
                }
                BootstrapDecision::BootstrapFailed { .. } => {
                    return Err(MembershipError::Bootstrap(
                        "consensus rejected single-node bootstrap".to_string(),
                    ));
                }
                _ => {}
            }
        }

        Ok(contacted)
    }

    /// Process one gossip event
    pub async fn handle_event(&self, event: &GossipEvent) -> EventOutcome {
        self.router.handle_event(event).await
    }

    /// Copy of the known peers, ordered by replication address
    pub fn peers(&self) -> Vec<Peer> {
        self.router.registry().snapshot()
    }

    /// Number of known peers
    pub fn peer_count(&self) -> usize {
        self.router.registry().len()
    }

    /// Whether this node leads the consensus cluster
    pub async fn is_leader(&self) -> bool {
        self.consensus.is_leader().await
    }

    /// Current expect mode
    pub fn expect_mode(&self) -> ExpectMode {
        self.router.coordinator().mode()
    }

    /// Node name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configuration this instance was created with
    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    /// Tags this node announces over gossip
    pub fn local_tags(&self) -> Tags {
        self.config.local_tags()
    }

    /// The gossip adaptor
    pub fn gossip(&self) -> &Arc<G> {
        &self.gossip
    }

    /// The consensus adaptor
    pub fn consensus(&self) -> &Arc<C> {
        &self.consensus
    }

    /// Leave the gossip cluster gracefully
    pub async fn leave(&self) -> MembershipResult<()> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.left {
                return Ok(());
            }
            lifecycle.left = true;
        }

        info!("{} leaving gossip cluster", self.config.name);
        self.gossip.leave().await.map_err(MembershipError::gossip)
    }

    /// Leave gossip, stop the event loop and release both adaptors
    ///
    /// Gossip is always left before the consensus engine is shut down. Every
    /// step runs even when an earlier one fails; the first error is returned.
    pub async fn shutdown(&self) -> MembershipResult<()> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.shut_down {
                return Ok(());
            }
            lifecycle.shut_down = true;
        }

        info!("Shutting down instance {}", self.config.name);
        let mut first_error = None;

        if let Err(e) = self.leave().await {
            error!("Failed to leave gossip cluster: {e}");
            first_error.get_or_insert(e);
        }

        self.cancellation_token.cancel();
        self.task_tracker.close();
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, self.task_tracker.wait())
            .await
            .is_err()
        {
            warn!("Timeout waiting for event loop of {} to stop", self.config.name);
        }

        if let Err(e) = self.gossip.shutdown().await {
            let e = MembershipError::gossip(e);
            error!("Failed to shut down gossip: {e}");
            first_error.get_or_insert(e);
        }

        if let Err(e) = self.consensus.shutdown().await {
            let e = MembershipError::consensus(e);
            error!("Failed to shut down consensus: {e}");
            first_error.get_or_insert(e);
        }

        self.router.registry().clear();
        info!("Instance {} shut down", self.config.name);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
