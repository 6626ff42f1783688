//! Dispatch of gossip membership events

use std::sync::Arc;

use cairn_gossip::{GossipEvent, Member};
use cairn_raft::ConsensusAdaptor;
use tracing::{debug, error, info, warn};

use crate::admission::{AdmissionOutcome, VoterAdmission};
use crate::bootstrap::{BootstrapCoordinator, BootstrapDecision};
use crate::peer::Peer;
use crate::registry::PeerRegistry;

/// Summary of what one event changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventOutcome {
    /// Peers newly inserted into the registry
    pub added: usize,
    /// Joined peers whose address was already registered
    pub duplicates: usize,
    /// Peers removed from the registry
    pub removed: usize,
    /// Members skipped because their tags were malformed
    pub malformed: usize,
    /// Event kind has no membership handler
    pub ignored: bool,
    /// Bootstrap evaluations run for this event, in member order
    pub decisions: Vec<BootstrapDecision>,
    /// Voter admissions attempted for this event, in member order
    pub admissions: Vec<AdmissionOutcome>,
}

impl EventOutcome {
    fn ignored() -> Self {
        Self {
            ignored: true,
            ..Self::default()
        }
    }
}

/// Routes gossip events to the registry, the bootstrap coordinator and voter admission
pub struct MembershipRouter<C: ConsensusAdaptor> {
    consensus: Arc<C>,
    registry: Arc<PeerRegistry>,
    coordinator: BootstrapCoordinator<C>,
    admission: VoterAdmission<C>,
}

impl<C: ConsensusAdaptor> MembershipRouter<C> {
    /// Create a router with expect mode armed for `expect` peers
    pub fn new(expect: usize, consensus: Arc<C>, registry: Arc<PeerRegistry>) -> Self {
        Self {
            coordinator: BootstrapCoordinator::new(expect, consensus.clone(), registry.clone()),
            admission: VoterAdmission::new(consensus.clone()),
            consensus,
            registry,
        }
    }

    /// The registry this router mutates
    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    /// The bootstrap coordinator
    pub fn coordinator(&self) -> &BootstrapCoordinator<C> {
        &self.coordinator
    }

    /// Handle one gossip event; never fails
    pub async fn handle_event(&self, event: &GossipEvent) -> EventOutcome {
        match event {
            GossipEvent::MemberJoin(members) => self.members_joined(members).await,
            GossipEvent::MemberLeave(members) | GossipEvent::MemberFailed(members) => {
                self.members_gone(members)
            }
            other => {
                warn!("Unhandled gossip event: {:?}", other.kind());
                EventOutcome::ignored()
            }
        }
    }

    async fn members_joined(&self, members: &[Member]) -> EventOutcome {
        info!("Member join ({} members)", members.len());
        let mut outcome = EventOutcome::default();

        for member in members {
            let peer = match Peer::try_from(member) {
                Ok(peer) => peer,
                Err(e) => {
                    error!("Failed to construct peer: {e}");
                    outcome.malformed += 1;
                    continue;
                }
            };

            if self.registry.upsert_if_absent(peer.clone()) {
                debug!("Registered peer {peer}");
                outcome.added += 1;
            } else {
                outcome.duplicates += 1;
            }

            if self.coordinator.is_active() {
                debug!("Testing bootstrap after {peer} joined");
                outcome.decisions.push(self.coordinator.evaluate().await);
            } else if self.consensus.is_leader().await {
                outcome.admissions.push(self.admission.admit(&peer).await);
            }
        }

        outcome
    }

    fn members_gone(&self, members: &[Member]) -> EventOutcome {
        let mut outcome = EventOutcome::default();

        for member in members {
            match Peer::try_from(member) {
                Ok(peer) => {
                    if self.registry.remove(&peer.replication_addr).is_some() {
                        info!("Removed peer {peer}");
                        outcome.removed += 1;
                    }
                }
                Err(e) => {
                    error!("Failed to construct departing peer: {e}");
                    outcome.malformed += 1;
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use cairn_gossip::{Tags, tags};
    use cairn_raft::{ServerAddress, ServerId};
    use cairn_raft_memory::MemoryConsensus;
    use tracing_test::traced_test;

    fn member(n: u8, expect: usize) -> Member {
        let set: Tags = [
            (tags::ID, format!("node-{n}")),
            (tags::RAFT_IP, format!("10.0.0.{n}")),
            (tags::RAFT_PORT, "8300".to_string()),
            (tags::RPC_IP, format!("10.0.0.{n}")),
            (tags::RPC_PORT, "8400".to_string()),
            (tags::EXPECT, expect.to_string()),
        ]
        .into_iter()
        .collect();
        Member::new(format!("node-{n}"), format!("10.0.0.{n}:7946"), set)
    }

    fn router(expect: usize) -> (MembershipRouter<MemoryConsensus>, Arc<MemoryConsensus>) {
        let consensus = Arc::new(MemoryConsensus::new());
        let router = MembershipRouter::new(expect, consensus.clone(), Arc::new(PeerRegistry::new()));
        (router, consensus)
    }

    #[tokio::test]
    #[traced_test]
    async fn test_malformed_member_does_not_stop_batch() {
        let (router, _) = router(0);
        let broken = Member::new("broken", "10.0.0.9:7946", Tags::new());

        let outcome = router
            .handle_event(&GossipEvent::MemberJoin(vec![
                member(1, 0),
                broken,
                member(2, 0),
            ]))
            .await;

        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.malformed, 1);
        assert_eq!(router.registry().len(), 2);
        assert!(logs_contain("missing tag 'id'"));
    }

    #[tokio::test]
    async fn test_duplicate_join_keeps_first() {
        let (router, _) = router(0);
        router
            .handle_event(&GossipEvent::MemberJoin(vec![member(1, 0)]))
            .await;

        let mut changed = member(1, 0);
        changed.tags.insert(tags::ID, "renamed");
        let outcome = router
            .handle_event(&GossipEvent::MemberJoin(vec![changed]))
            .await;

        assert_eq!(outcome.duplicates, 1);
        assert_eq!(router.registry().snapshot()[0].name, "node-1");
    }

    #[tokio::test]
    async fn test_leave_and_fail_remove_entries() {
        let (router, _) = router(0);
        router
            .handle_event(&GossipEvent::MemberJoin(vec![member(1, 0), member(2, 0)]))
            .await;

        let left = router
            .handle_event(&GossipEvent::MemberLeave(vec![member(1, 0)]))
            .await;
        assert_eq!(left.removed, 1);

        let unknown = router
            .handle_event(&GossipEvent::MemberFailed(vec![member(3, 0)]))
            .await;
        assert_eq!(unknown.removed, 0);

        let failed = router
            .handle_event(&GossipEvent::MemberFailed(vec![member(2, 0)]))
            .await;
        assert_eq!(failed.removed, 1);
        assert!(router.registry().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_other_events_are_ignored() {
        let (router, _) = router(0);

        for event in [
            GossipEvent::MemberUpdate(vec![member(1, 0)]),
            GossipEvent::MemberReap(vec![member(1, 0)]),
            GossipEvent::User {
                name: "deploy".to_string(),
                payload: vec![1, 2, 3],
            },
            GossipEvent::Query {
                name: "ping".to_string(),
                payload: Vec::new(),
            },
        ] {
            assert!(router.handle_event(&event).await.ignored);
        }

        assert!(router.registry().is_empty());
        assert!(logs_contain("Unhandled gossip event"));
    }

    #[tokio::test]
    async fn test_joins_route_to_coordinator_while_armed() {
        let (router, consensus) = router(2);
        consensus.set_leader(true);

        let outcome = router
            .handle_event(&GossipEvent::MemberJoin(vec![member(1, 2)]))
            .await;

        assert_eq!(
            outcome.decisions,
            vec![BootstrapDecision::Waiting { have: 1, need: 2 }]
        );
        assert!(outcome.admissions.is_empty());
        assert!(consensus.add_voter_calls().is_empty());
    }

    #[tokio::test]
    async fn test_leader_admits_after_bootstrap() {
        let (router, consensus) = router(0);
        consensus.set_leader(true);

        let outcome = router
            .handle_event(&GossipEvent::MemberJoin(vec![member(4, 0)]))
            .await;

        assert!(outcome.decisions.is_empty());
        assert_eq!(
            consensus.add_voter_calls(),
            vec![(ServerId::from("node-4"), ServerAddress::from("10.0.0.4:8300"))]
        );
    }

    #[tokio::test]
    async fn test_follower_does_not_admit() {
        let (router, consensus) = router(0);

        let outcome = router
            .handle_event(&GossipEvent::MemberJoin(vec![member(4, 0)]))
            .await;

        assert!(outcome.admissions.is_empty());
        assert!(consensus.add_voter_calls().is_empty());
    }
}
