//! Error types for consensus adaptors

use std::error::Error;
use std::fmt::{self, Debug};

/// Marker trait for `ConsensusAdaptor` errors
pub trait ConsensusAdaptorError: Debug + Error + Send + Sync + 'static {
    /// Returns the kind of this error
    fn kind(&self) -> ConsensusAdaptorErrorKind;
}

/// The kind of consensus adaptor error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConsensusAdaptorErrorKind {
    /// The node already holds a configuration
    AlreadyBootstrapped,

    /// The node is not the leader
    NotLeader,

    /// Reading or writing the durable log failed
    Storage,

    /// The engine was shut down
    ShutDown,

    /// Other/unknown error
    Other,
}

impl fmt::Display for ConsensusAdaptorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
