//! Consensus engine interface for cairn nodes
//!
//! The engine itself (log replication, leader election, persistence) lives
//! behind [`ConsensusAdaptor`]. Membership code only needs to know whether the
//! node already holds log data, whether it leads, and how to change the
//! voter configuration.
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

use async_trait::async_trait;

pub use error::{ConsensusAdaptorError, ConsensusAdaptorErrorKind};
pub use types::{Configuration, Server, ServerAddress, ServerId};

/// Consensus engine consumed by the membership layer
#[async_trait]
pub trait ConsensusAdaptor: Send + Sync + 'static {
    /// Error type returned by the adaptor
    type Error: ConsensusAdaptorError;

    /// Index of the last entry in the durable log
    ///
    /// Zero means the node has never been part of a cluster.
    async fn last_applied_index(&self) -> Result<u64, Self::Error>;

    /// Whether this node currently believes it is the leader
    async fn is_leader(&self) -> bool;

    /// Propose adding a voter to the running configuration
    ///
    /// A `prev_index` of zero disables configuration-index fencing. The engine
    /// must reject the call if this node is no longer leader.
    async fn add_voter(
        &self,
        id: ServerId,
        address: ServerAddress,
        prev_index: u64,
        prev_term: u64,
    ) -> Result<(), Self::Error>;

    /// Submit the initial configuration of a fresh cluster
    ///
    /// Must fail cleanly when the node is already bootstrapped.
    async fn bootstrap_cluster(&self, configuration: Configuration) -> Result<(), Self::Error>;

    /// Release consensus resources
    async fn shutdown(&self) -> Result<(), Self::Error>;
}
