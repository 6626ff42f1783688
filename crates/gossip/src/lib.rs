//! Gossip membership interface for cairn nodes
//!
//! This crate provides:
//! - Member records and their metadata tags
//! - The closed set of membership events a gossip layer delivers
//! - The `GossipAdaptor` trait implemented by concrete gossip layers
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod event;
pub mod member;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use error::{GossipAdaptorError, GossipAdaptorErrorKind};
pub use event::{GossipEvent, GossipEventKind};
pub use member::{Member, MemberStatus, Tags, tags};

/// Receiving half of a gossip event stream
pub type EventReceiver = mpsc::UnboundedReceiver<GossipEvent>;

/// Gossip membership layer consumed by a node
///
/// Implementations handle failure detection and dissemination. The node only
/// sees the resulting membership events and the metadata tags of each member.
#[async_trait]
pub trait GossipAdaptor: Send + Sync + 'static {
    /// Error type returned by the adaptor
    type Error: GossipAdaptorError;

    /// The member record this node announces about itself
    fn local_member(&self) -> Member;

    /// Every member currently known to the gossip layer
    fn members(&self) -> Vec<Member>;

    /// Take the event stream
    ///
    /// Returns `None` once the stream has already been taken.
    fn take_events(&self) -> Option<EventReceiver>;

    /// Contact the given seed nodes, returning how many were reached
    async fn join(&self, seeds: &[String]) -> Result<usize, Self::Error>;

    /// Gracefully leave the membership so peers see the departure promptly
    async fn leave(&self) -> Result<(), Self::Error>;

    /// Stop the gossip layer and close the event stream
    async fn shutdown(&self) -> Result<(), Self::Error>;
}
