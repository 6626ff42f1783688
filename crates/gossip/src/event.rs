//! Membership events delivered by a gossip layer

use crate::Member;

/// Event emitted by the gossip layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GossipEvent {
    /// Members joined the cluster
    MemberJoin(Vec<Member>),
    /// Members left gracefully
    MemberLeave(Vec<Member>),
    /// Members were detected as failed
    MemberFailed(Vec<Member>),
    /// Members updated their tags
    MemberUpdate(Vec<Member>),
    /// Failed or left members were reaped from the member list
    MemberReap(Vec<Member>),
    /// Application-level broadcast
    User {
        /// Event name
        name: String,
        /// Opaque payload
        payload: Vec<u8>,
    },
    /// Application-level query
    Query {
        /// Query name
        name: String,
        /// Opaque payload
        payload: Vec<u8>,
    },
}

/// Discriminant of a [`GossipEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GossipEventKind {
    /// See [`GossipEvent::MemberJoin`]
    MemberJoin,
    /// See [`GossipEvent::MemberLeave`]
    MemberLeave,
    /// See [`GossipEvent::MemberFailed`]
    MemberFailed,
    /// See [`GossipEvent::MemberUpdate`]
    MemberUpdate,
    /// See [`GossipEvent::MemberReap`]
    MemberReap,
    /// See [`GossipEvent::User`]
    User,
    /// See [`GossipEvent::Query`]
    Query,
}

impl GossipEvent {
    /// Kind of this event
    pub fn kind(&self) -> GossipEventKind {
        match self {
            Self::MemberJoin(_) => GossipEventKind::MemberJoin,
            Self::MemberLeave(_) => GossipEventKind::MemberLeave,
            Self::MemberFailed(_) => GossipEventKind::MemberFailed,
            Self::MemberUpdate(_) => GossipEventKind::MemberUpdate,
            Self::MemberReap(_) => GossipEventKind::MemberReap,
            Self::User { .. } => GossipEventKind::User,
            Self::Query { .. } => GossipEventKind::Query,
        }
    }

    /// Members carried by a member event, empty for user events and queries
    pub fn members(&self) -> &[Member] {
        match self {
            Self::MemberJoin(members)
            | Self::MemberLeave(members)
            | Self::MemberFailed(members)
            | Self::MemberUpdate(members)
            | Self::MemberReap(members) => members,
            Self::User { .. } | Self::Query { .. } => &[],
        }
    }
}
