//! Error types for gossip adaptors

use std::error::Error;
use std::fmt::{self, Debug};

/// Marker trait for `GossipAdaptor` errors
pub trait GossipAdaptorError: Debug + Error + Send + Sync + 'static {
    /// Returns the kind of this error
    fn kind(&self) -> GossipAdaptorErrorKind;
}

/// The kind of gossip adaptor error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GossipAdaptorErrorKind {
    /// A seed node could not be reached
    UnknownSeed,

    /// The adaptor has left the membership or was shut down
    NotRunning,

    /// Another member already uses this node's name
    NameConflict,

    /// Other/unknown error
    Other,
}

impl fmt::Display for GossipAdaptorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
