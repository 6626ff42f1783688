//! Error types for the in-memory gossip adaptor.

use cairn_gossip::{GossipAdaptorError, GossipAdaptorErrorKind};
use thiserror::Error;

/// Error type for the in-memory gossip adaptor.
#[derive(Debug, Error)]
pub enum Error {
    /// None of the given seeds is registered in the hub.
    #[error("No reachable seed among {0:?}")]
    UnknownSeed(Vec<String>),

    /// The adaptor already left or was shut down.
    #[error("Gossip node '{0}' is not running")]
    NotRunning(String),

    /// Another registered node uses the same name.
    #[error("Node name '{0}' is already in use")]
    NameConflict(String),

    /// The hub has no node with the given name.
    #[error("Node not found: {0}")]
    NodeNotFound(String),
}

impl GossipAdaptorError for Error {
    fn kind(&self) -> GossipAdaptorErrorKind {
        match self {
            Self::UnknownSeed(_) => GossipAdaptorErrorKind::UnknownSeed,
            Self::NotRunning(_) => GossipAdaptorErrorKind::NotRunning,
            Self::NameConflict(_) => GossipAdaptorErrorKind::NameConflict,
            Self::NodeNotFound(_) => GossipAdaptorErrorKind::Other,
        }
    }
}
