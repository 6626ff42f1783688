//! Consensus configuration types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a server in the consensus configuration
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerId(pub String);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Transport address of a server (host:port)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerAddress(pub String);

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerAddress {
    fn from(address: &str) -> Self {
        Self(address.to_string())
    }
}

/// A server entry in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Server {
    /// Server identifier
    pub id: ServerId,
    /// Transport address
    pub address: ServerAddress,
}

impl Server {
    /// Create a voting server entry
    pub fn voter(id: ServerId, address: ServerAddress) -> Self {
        Self { id, address }
    }
}

/// Ordered set of servers submitted as one configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Servers in submission order
    pub servers: Vec<Server>,
}

impl Configuration {
    /// Number of servers
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Whether the configuration is empty
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Addresses in submission order
    pub fn addresses(&self) -> Vec<String> {
        self.servers.iter().map(|s| s.address.0.clone()).collect()
    }
}

impl FromIterator<Server> for Configuration {
    fn from_iter<I: IntoIterator<Item = Server>>(iter: I) -> Self {
        Self {
            servers: iter.into_iter().collect(),
        }
    }
}
