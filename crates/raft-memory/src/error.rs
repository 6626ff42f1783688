//! Error types for the in-memory consensus adaptor.

use cairn_raft::{ConsensusAdaptorError, ConsensusAdaptorErrorKind};
use thiserror::Error;

/// Error type for the in-memory consensus adaptor.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration was already bootstrapped.
    #[error("Cluster already bootstrapped")]
    AlreadyBootstrapped,

    /// This node is not the leader.
    #[error("Node is not the leader")]
    NotLeader,

    /// The durable log could not be read.
    #[error("Log storage error: {0}")]
    Storage(String),

    /// The adaptor was shut down.
    #[error("Consensus adaptor is shut down")]
    ShutDown,

    /// The engine refused the request.
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl ConsensusAdaptorError for Error {
    fn kind(&self) -> ConsensusAdaptorErrorKind {
        match self {
            Self::AlreadyBootstrapped => ConsensusAdaptorErrorKind::AlreadyBootstrapped,
            Self::NotLeader => ConsensusAdaptorErrorKind::NotLeader,
            Self::Storage(_) => ConsensusAdaptorErrorKind::Storage,
            Self::ShutDown => ConsensusAdaptorErrorKind::ShutDown,
            Self::Rejected(_) => ConsensusAdaptorErrorKind::Other,
        }
    }
}
