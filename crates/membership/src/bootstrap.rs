//! Expect-N quorum bootstrap
//!
//! While expect mode is armed, every join re-evaluates whether the registry
//! holds enough agreeing peers to submit the initial consensus configuration.
//! The configuration is submitted at most once per instance lifetime. A node
//! that finds data in its log never bootstraps.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cairn_raft::{Configuration, ConsensusAdaptor, Server, ServerAddress, ServerId};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::registry::PeerRegistry;

/// Expect-mode state of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectMode {
    /// Waiting for this many peers before bootstrapping
    Armed(usize),
    /// A bootstrap submission is in flight
    Bootstrapping,
    /// Bootstrap was attempted or is not wanted; terminal
    Disabled,
}

impl ExpectMode {
    /// Initial mode for a configured expect value
    pub fn from_expect(expect: usize) -> Self {
        if expect == 0 {
            Self::Disabled
        } else {
            Self::Armed(expect)
        }
    }

    /// Whether joins should be routed to the coordinator
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Expect value while armed, 0 otherwise
    pub fn expect(&self) -> usize {
        match self {
            Self::Armed(n) => *n,
            _ => 0,
        }
    }
}

impl fmt::Display for ExpectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Armed(n) => write!(f, "armed({n})"),
            Self::Bootstrapping => f.write_str("bootstrapping"),
            Self::Disabled => f.write_str("disabled"),
        }
    }
}

/// What a single bootstrap evaluation decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapDecision {
    /// Expect mode was already disabled
    NotArmed,
    /// Another evaluation holds the bootstrap claim
    InProgress,
    /// The log already has entries; expect mode disabled
    AlreadyInitialized {
        /// Last index found in the log
        last_index: u64,
    },
    /// The log index could not be read; expect mode stays armed
    IndexUnavailable,
    /// A peer announced a different expect value; expect mode stays armed
    ConflictingExpect {
        /// Offending peer name
        peer: String,
        /// Expect value it announced
        expect: usize,
    },
    /// A peer announced single-node bootstrap; expect mode stays armed
    ForeignBootstrap {
        /// Offending peer name
        peer: String,
    },
    /// Not enough peers yet
    Waiting {
        /// Peers currently known
        have: usize,
        /// Peers required
        need: usize,
    },
    /// Configuration submitted and accepted
    Bootstrapped {
        /// Configuration that was submitted
        configuration: Configuration,
    },
    /// Configuration submitted and rejected; not retried
    BootstrapFailed {
        /// Configuration that was submitted
        configuration: Configuration,
    },
}

impl BootstrapDecision {
    /// Whether this evaluation called `bootstrap_cluster`
    pub fn submitted(&self) -> bool {
        matches!(
            self,
            Self::Bootstrapped { .. } | Self::BootstrapFailed { .. }
        )
    }
}

/// Performs the one-time bootstrap of the consensus configuration
pub struct BootstrapCoordinator<C: ConsensusAdaptor> {
    consensus: Arc<C>,
    registry: Arc<PeerRegistry>,
    mode: Mutex<ExpectMode>,
    single_attempted: AtomicBool,
}

impl<C: ConsensusAdaptor> BootstrapCoordinator<C> {
    /// Create a coordinator armed with `expect`, or disabled when it is 0
    pub fn new(expect: usize, consensus: Arc<C>, registry: Arc<PeerRegistry>) -> Self {
        Self {
            consensus,
            registry,
            mode: Mutex::new(ExpectMode::from_expect(expect)),
            single_attempted: AtomicBool::new(false),
        }
    }

    /// Current expect mode
    pub fn mode(&self) -> ExpectMode {
        *self.mode.lock()
    }

    /// Whether joins should still be evaluated here
    pub fn is_active(&self) -> bool {
        self.mode.lock().is_active()
    }

    /// Disable expect mode for good
    pub fn disable(&self) {
        *self.mode.lock() = ExpectMode::Disabled;
    }

    /// Decide whether to bootstrap now, and do it if so
    pub async fn evaluate(&self) -> BootstrapDecision {
        let expect = match self.mode() {
            ExpectMode::Armed(n) => n,
            ExpectMode::Bootstrapping => return BootstrapDecision::InProgress,
            ExpectMode::Disabled => return BootstrapDecision::NotArmed,
        };

        match self.consensus.last_applied_index().await {
            Ok(0) => {}
            Ok(last_index) => {
                info!("Consensus data found at index {last_index}, disabling expect mode");
                self.disarm();
                return BootstrapDecision::AlreadyInitialized { last_index };
            }
            Err(e) => {
                error!("Failed to read last consensus index: {e}");
                return BootstrapDecision::IndexUnavailable;
            }
        }

        let peers = self.registry.snapshot();

        if let Some(peer) = peers.iter().find(|p| p.expect != 0 && p.expect != expect) {
            error!(
                "Member {} has a conflicting expect value {} (local {}); all nodes should expect the same number",
                peer, peer.expect, expect
            );
            return BootstrapDecision::ConflictingExpect {
                peer: peer.name.clone(),
                expect: peer.expect,
            };
        }

        if let Some(peer) = peers.iter().find(|p| p.bootstrap) {
            error!("Member {peer} is in bootstrap mode, not bootstrapping with expect");
            return BootstrapDecision::ForeignBootstrap {
                peer: peer.name.clone(),
            };
        }

        if peers.len() < expect {
            debug!("Waiting for peers before bootstrap: {}/{}", peers.len(), expect);
            return BootstrapDecision::Waiting {
                have: peers.len(),
                need: expect,
            };
        }

        // Only one evaluation may move from armed to bootstrapping
        {
            let mut mode = self.mode.lock();
            match *mode {
                ExpectMode::Armed(_) => *mode = ExpectMode::Bootstrapping,
                ExpectMode::Bootstrapping => return BootstrapDecision::InProgress,
                ExpectMode::Disabled => return BootstrapDecision::NotArmed,
            }
        }

        // Snapshot is ordered by replication address
        let configuration: Configuration = peers
            .iter()
            .map(|peer| {
                Server::voter(
                    ServerId(peer.name.clone()),
                    ServerAddress(peer.replication_addr.to_string()),
                )
            })
            .collect();

        info!(
            "Found expected number of peers, attempting bootstrap: {}",
            configuration.addresses().join(",")
        );

        let result = self.consensus.bootstrap_cluster(configuration.clone()).await;
        self.disable();

        match result {
            Ok(()) => {
                info!("Bootstrapped cluster with {} voters", configuration.len());
                BootstrapDecision::Bootstrapped { configuration }
            }
            Err(e) => {
                error!("Failed to bootstrap cluster: {e}");
                BootstrapDecision::BootstrapFailed { configuration }
            }
        }
    }

    /// Bootstrap a cluster made of `local` alone
    ///
    /// Used by nodes started in bootstrap mode. Like the expect path it
    /// never bootstraps over existing log data and submits at most once.
    pub async fn bootstrap_single(&self, local: Server) -> BootstrapDecision {
        if self.single_attempted.load(Ordering::Acquire) {
            return BootstrapDecision::NotArmed;
        }

        match self.consensus.last_applied_index().await {
            Ok(0) => {}
            Ok(last_index) => {
                info!("Consensus data found at index {last_index}, skipping single-node bootstrap");
                self.single_attempted.store(true, Ordering::Release);
                return BootstrapDecision::AlreadyInitialized { last_index };
            }
            Err(e) => {
                error!("Failed to read last consensus index: {e}");
                return BootstrapDecision::IndexUnavailable;
            }
        }

        if self.single_attempted.swap(true, Ordering::AcqRel) {
            return BootstrapDecision::InProgress;
        }

        let configuration: Configuration = std::iter::once(local).collect();
        info!("Bootstrapping single-node cluster at {}", configuration.addresses().join(","));

        match self.consensus.bootstrap_cluster(configuration.clone()).await {
            Ok(()) => BootstrapDecision::Bootstrapped { configuration },
            Err(e) => {
                error!("Failed to bootstrap single-node cluster: {e}");
                BootstrapDecision::BootstrapFailed { configuration }
            }
        }
    }

    /// Disable unless a submission is in flight; that path disables itself
    fn disarm(&self) {
        let mut mode = self.mode.lock();
        if matches!(*mode, ExpectMode::Armed(_)) {
            *mode = ExpectMode::Disabled;
        }
    }
}
