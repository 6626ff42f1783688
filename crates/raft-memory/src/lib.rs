//! In-memory consensus adaptor for testing
//!
//! Tracks a voter configuration and a log index without replicating
//! anything. Bootstrap succeeds once and is rejected afterwards, every call
//! is recorded, and leadership and failures can be driven from tests.
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;

pub use error::Error;

use async_trait::async_trait;
use cairn_raft::{ConsensusAdaptor, Configuration, Server, ServerAddress, ServerId};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct State {
    leader: bool,
    last_index: u64,
    voters: Vec<Server>,
    bootstrap_calls: Vec<Configuration>,
    add_voter_calls: Vec<(ServerId, ServerAddress)>,
    fail_next_bootstrap: bool,
    fail_next_add_voter: bool,
    fail_index_reads: bool,
    shut_down: bool,
}

/// Consensus adaptor holding its state in process memory
#[derive(Debug, Default)]
pub struct MemoryConsensus {
    /// Set when this node should take leadership if it heads a bootstrapped configuration
    elect_as: Option<ServerId>,
    state: Mutex<State>,
}

impl MemoryConsensus {
    /// Create an adaptor with an empty log that is not leader
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an adaptor that becomes leader when it is the first server
    /// of the configuration it bootstraps
    pub fn with_election(id: ServerId) -> Self {
        Self {
            elect_as: Some(id),
            state: Mutex::default(),
        }
    }

    /// Force leadership on or off
    pub fn set_leader(&self, leader: bool) {
        self.state.lock().leader = leader;
    }

    /// Pretend the durable log already holds entries up to `index`
    pub fn set_last_index(&self, index: u64) {
        self.state.lock().last_index = index;
    }

    /// Make the next bootstrap call fail
    pub fn fail_next_bootstrap(&self) {
        self.state.lock().fail_next_bootstrap = true;
    }

    /// Make the next add_voter call fail
    pub fn fail_next_add_voter(&self) {
        self.state.lock().fail_next_add_voter = true;
    }

    /// Make log index reads fail until turned off again
    pub fn fail_index_reads(&self, fail: bool) {
        self.state.lock().fail_index_reads = fail;
    }

    /// Every configuration submitted through `bootstrap_cluster`, accepted or not
    pub fn bootstrap_calls(&self) -> Vec<Configuration> {
        self.state.lock().bootstrap_calls.clone()
    }

    /// Every `add_voter` call, accepted or not
    pub fn add_voter_calls(&self) -> Vec<(ServerId, ServerAddress)> {
        self.state.lock().add_voter_calls.clone()
    }

    /// Current voters
    pub fn voters(&self) -> Vec<Server> {
        self.state.lock().voters.clone()
    }

    /// Whether `shutdown` was called
    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }
}

#[async_trait]
impl ConsensusAdaptor for MemoryConsensus {
    type Error = Error;

    async fn last_applied_index(&self) -> Result<u64, Self::Error> {
        let state = self.state.lock();
        if state.fail_index_reads {
            return Err(Error::Storage("injected read failure".to_string()));
        }
        Ok(state.last_index)
    }

    async fn is_leader(&self) -> bool {
        let state = self.state.lock();
        state.leader && !state.shut_down
    }

    async fn add_voter(
        &self,
        id: ServerId,
        address: ServerAddress,
        prev_index: u64,
        _prev_term: u64,
    ) -> Result<(), Self::Error> {
        let mut state = self.state.lock();
        state.add_voter_calls.push((id.clone(), address.clone()));

        if state.shut_down {
            return Err(Error::ShutDown);
        }
        if !state.leader {
            return Err(Error::NotLeader);
        }
        if state.fail_next_add_voter {
            state.fail_next_add_voter = false;
            return Err(Error::Rejected("injected add_voter failure".to_string()));
        }
        if prev_index != 0 && prev_index != state.last_index {
            return Err(Error::Rejected(format!(
                "configuration changed since index {prev_index}"
            )));
        }

        match state.voters.iter_mut().find(|server| server.id == id) {
            Some(existing) => existing.address = address,
            None => state.voters.push(Server::voter(id.clone(), address)),
        }
        state.last_index += 1;

        debug!("Added voter {} at index {}", id, state.last_index);
        Ok(())
    }

    async fn bootstrap_cluster(&self, configuration: Configuration) -> Result<(), Self::Error> {
        let mut state = self.state.lock();
        state.bootstrap_calls.push(configuration.clone());

        if state.shut_down {
            return Err(Error::ShutDown);
        }
        if state.fail_next_bootstrap {
            state.fail_next_bootstrap = false;
            return Err(Error::Rejected("injected bootstrap failure".to_string()));
        }
        if state.last_index != 0 || !state.voters.is_empty() {
            warn!("Rejecting bootstrap of an already initialized log");
            return Err(Error::AlreadyBootstrapped);
        }

        state.voters = configuration.servers.clone();
        state.last_index = 1;

        if let Some(id) = &self.elect_as
            && configuration.servers.first().map(|s| &s.id) == Some(id)
        {
            state.leader = true;
        }

        info!(
            "Bootstrapped cluster with {} servers (leader: {})",
            configuration.len(),
            state.leader
        );
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        let mut state = self.state.lock();
        state.shut_down = true;
        state.leader = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use cairn_raft::{ConsensusAdaptorError, ConsensusAdaptorErrorKind};

    fn configuration(ids: &[&str]) -> Configuration {
        ids.iter()
            .enumerate()
            .map(|(i, id)| {
                Server::voter(
                    ServerId::from(*id),
                    ServerAddress(format!("10.0.0.{}:8300", i + 1)),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_bootstrap_once_then_rejected() {
        let consensus = MemoryConsensus::new();

        consensus
            .bootstrap_cluster(configuration(&["a", "b"]))
            .await
            .unwrap();
        assert_eq!(consensus.last_applied_index().await.unwrap(), 1);
        assert_eq!(consensus.voters().len(), 2);

        let err = consensus
            .bootstrap_cluster(configuration(&["a", "b"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ConsensusAdaptorErrorKind::AlreadyBootstrapped);
        assert_eq!(consensus.bootstrap_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_bootstrap_rejected_when_log_has_entries() {
        let consensus = MemoryConsensus::new();
        consensus.set_last_index(42);

        let err = consensus
            .bootstrap_cluster(configuration(&["a"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ConsensusAdaptorErrorKind::AlreadyBootstrapped);
    }

    #[tokio::test]
    async fn test_injected_bootstrap_failure_is_one_shot() {
        let consensus = MemoryConsensus::new();
        consensus.fail_next_bootstrap();

        assert!(
            consensus
                .bootstrap_cluster(configuration(&["a"]))
                .await
                .is_err()
        );
        assert!(
            consensus
                .bootstrap_cluster(configuration(&["a"]))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_election_on_bootstrap() {
        let first = MemoryConsensus::with_election(ServerId::from("a"));
        let second = MemoryConsensus::with_election(ServerId::from("b"));

        first
            .bootstrap_cluster(configuration(&["a", "b"]))
            .await
            .unwrap();
        second
            .bootstrap_cluster(configuration(&["a", "b"]))
            .await
            .unwrap();

        assert!(first.is_leader().await);
        assert!(!second.is_leader().await);
    }

    #[tokio::test]
    async fn test_add_voter_requires_leadership() {
        let consensus = MemoryConsensus::new();
        let id = ServerId::from("d");
        let address = ServerAddress::from("10.0.0.4:8300");

        let err = consensus
            .add_voter(id.clone(), address.clone(), 0, 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ConsensusAdaptorErrorKind::NotLeader);

        consensus.set_leader(true);
        consensus.add_voter(id.clone(), address, 0, 0).await.unwrap();

        assert_eq!(consensus.voters(), vec![Server::voter(id, "10.0.0.4:8300".into())]);
        assert_eq!(consensus.add_voter_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_drops_leadership() {
        let consensus = MemoryConsensus::new();
        consensus.set_leader(true);

        consensus.shutdown().await.unwrap();

        assert!(!consensus.is_leader().await);
        assert!(consensus.is_shut_down());
    }
}
