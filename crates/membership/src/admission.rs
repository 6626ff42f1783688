//! Adding newly joined peers as voters once the cluster exists

use std::sync::Arc;

use cairn_raft::{ConsensusAdaptor, ServerAddress, ServerId};
use tracing::{error, info};

use crate::peer::Peer;

/// Result of one voter admission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// This node does not lead; nothing was proposed
    NotLeader,
    /// The voter was added
    Added {
        /// Server id proposed
        id: ServerId,
        /// Server address proposed
        address: ServerAddress,
    },
    /// The consensus engine rejected the change; not retried
    Rejected {
        /// Server id proposed
        id: ServerId,
        /// Engine error message
        reason: String,
    },
}

/// Proposes joined peers as voters while this node leads
pub struct VoterAdmission<C: ConsensusAdaptor> {
    consensus: Arc<C>,
}

impl<C: ConsensusAdaptor> VoterAdmission<C> {
    /// Create an admission handler
    pub fn new(consensus: Arc<C>) -> Self {
        Self { consensus }
    }

    /// Propose `peer` as a voter if this node is still the leader
    pub async fn admit(&self, peer: &Peer) -> AdmissionOutcome {
        if !self.consensus.is_leader().await {
            return AdmissionOutcome::NotLeader;
        }

        let id = ServerId(peer.name.clone());
        let address = ServerAddress(peer.replication_addr.to_string());

        // No index or term fencing
        match self
            .consensus
            .add_voter(id.clone(), address.clone(), 0, 0)
            .await
        {
            Ok(()) => {
                info!("Added voter {peer}");
                AdmissionOutcome::Added { id, address }
            }
            Err(e) => {
                error!("Failed to add voter {peer}: {e}");
                AdmissionOutcome::Rejected {
                    id,
                    reason: e.to_string(),
                }
            }
        }
    }
}
