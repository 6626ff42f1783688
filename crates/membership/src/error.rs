//! Error types for the membership layer

use cairn_gossip::{GossipAdaptorError, GossipAdaptorErrorKind};
use cairn_raft::{ConsensusAdaptorError, ConsensusAdaptorErrorKind};
use thiserror::Error;

/// Result type for membership operations
pub type MembershipResult<T> = Result<T, MembershipError>;

/// Errors returned by instance lifecycle operations
#[derive(Debug, Error)]
pub enum MembershipError {
    /// Instance configuration rejected
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Gossip adaptor failed
    #[error("Gossip error ({kind}): {message}")]
    Gossip {
        /// Kind reported by the adaptor
        kind: GossipAdaptorErrorKind,
        /// Adaptor error message
        message: String,
    },

    /// Consensus adaptor failed
    #[error("Consensus error ({kind}): {message}")]
    Consensus {
        /// Kind reported by the adaptor
        kind: ConsensusAdaptorErrorKind,
        /// Adaptor error message
        message: String,
    },

    /// Single-node bootstrap could not be completed
    #[error("Bootstrap error: {0}")]
    Bootstrap(String),

    /// `start` called twice, or the event stream was already taken
    #[error("Instance already started")]
    AlreadyStarted,
}

impl MembershipError {
    pub(crate) fn gossip<E: GossipAdaptorError>(err: E) -> Self {
        Self::Gossip {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub(crate) fn consensus<E: ConsensusAdaptorError>(err: E) -> Self {
        Self::Consensus {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// A gossip member whose tags do not describe a usable peer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedPeerError {
    /// A required tag is absent
    #[error("member {member} is missing tag '{tag}'")]
    MissingTag {
        /// Gossip name of the member
        member: String,
        /// Tag key
        tag: &'static str,
    },

    /// A tag that should hold an IP address does not
    #[error("member {member} has invalid address '{value}' in tag '{tag}'")]
    InvalidAddress {
        /// Gossip name of the member
        member: String,
        /// Tag key
        tag: &'static str,
        /// Offending value
        value: String,
    },

    /// A tag that should hold a port does not
    #[error("member {member} has invalid port '{value}' in tag '{tag}'")]
    InvalidPort {
        /// Gossip name of the member
        member: String,
        /// Tag key
        tag: &'static str,
        /// Offending value
        value: String,
    },
}

/// Invalid instance configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Node name is empty
    #[error("node name must not be empty")]
    MissingName,

    /// Bootstrap mode and expect mode are mutually exclusive
    #[error("bootstrap cannot be combined with expect {expect}")]
    BootstrapWithExpect {
        /// Configured expect value
        expect: usize,
    },

    /// Gossip encryption key has the wrong length
    #[error("gossip encryption key must be 32 bytes, got {len}")]
    InvalidEncryptionKey {
        /// Length of the supplied key
        len: usize,
    },
}
