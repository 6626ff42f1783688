//! Cluster membership and quorum bootstrap for cairn nodes
//!
//! This crate provides:
//! - Peer decoding from gossip member tags
//! - A lock-protected peer registry keyed by replication address
//! - The expect-N bootstrap coordinator
//! - Voter admission once a cluster exists
//! - The [`Instance`] orchestrator tying gossip to consensus
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod admission;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod instance;
pub mod peer;
pub mod registry;
pub mod router;

pub use admission::{AdmissionOutcome, VoterAdmission};
pub use bootstrap::{BootstrapCoordinator, BootstrapDecision, ExpectMode};
pub use config::InstanceConfig;
pub use error::{ConfigurationError, MalformedPeerError, MembershipError, MembershipResult};
pub use instance::Instance;
pub use peer::Peer;
pub use registry::PeerRegistry;
pub use router::{EventOutcome, MembershipRouter};
