//! Gossip member records

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known metadata tag keys announced by every cairn node
pub mod tags {
    /// Unique node name
    pub const ID: &str = "id";
    /// IP of the replication (raft) transport
    pub const RAFT_IP: &str = "raftIP";
    /// Port of the replication (raft) transport
    pub const RAFT_PORT: &str = "raftPort";
    /// IP of the client RPC service
    pub const RPC_IP: &str = "rpcIP";
    /// Port of the client RPC service
    pub const RPC_PORT: &str = "rpcPort";
    /// Present when the node was started in single-node bootstrap mode
    pub const BOOTSTRAP: &str = "bootstrap";
    /// Expect-N value the node was configured with
    pub const EXPECT: &str = "expect";
}

/// Metadata tags attached to a gossip member
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// Create an empty tag set
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a tag value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Set a tag value, returning the previous one
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Whether the tag is present
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of tags
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no tags
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Tags
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Liveness of a member as seen by the gossip layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberStatus {
    /// Member is alive
    Alive,
    /// Member announced it is leaving
    Leaving,
    /// Member left gracefully
    Left,
    /// Member stopped responding
    Failed,
}

/// A member of the gossip cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Gossip-level node name
    pub name: String,
    /// Gossip bind address (host:port)
    pub addr: String,
    /// Metadata tags
    pub tags: Tags,
    /// Liveness status
    pub status: MemberStatus,
}

impl Member {
    /// Create an alive member
    pub fn new(name: impl Into<String>, addr: impl Into<String>, tags: Tags) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            tags,
            status: MemberStatus::Alive,
        }
    }

    /// Copy of this member with a different status
    pub fn with_status(&self, status: MemberStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.addr)
    }
}
