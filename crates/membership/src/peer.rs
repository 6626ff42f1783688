//! Peers decoded from gossip member tags

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use cairn_gossip::{Member, Tags, tags};
use serde::{Deserialize, Serialize};

use crate::error::MalformedPeerError;

/// A remote cairn node as announced over gossip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Node name, used as the consensus server id
    pub name: String,
    /// Replication transport address, the registry key
    pub replication_addr: SocketAddr,
    /// Client RPC address
    pub service_addr: SocketAddr,
    /// Whether the node announced single-node bootstrap intent
    pub bootstrap: bool,
    /// Expect value the node was started with, 0 when unset
    pub expect: usize,
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.replication_addr)
    }
}

impl TryFrom<&Member> for Peer {
    type Error = MalformedPeerError;

    fn try_from(member: &Member) -> Result<Self, Self::Error> {
        let name = required(member, tags::ID)?.to_string();
        let replication_addr = socket_addr(member, tags::RAFT_IP, tags::RAFT_PORT)?;
        let service_addr = socket_addr(member, tags::RPC_IP, tags::RPC_PORT)?;

        Ok(Self {
            name,
            replication_addr,
            service_addr,
            bootstrap: bootstrap_flag(&member.tags),
            expect: member
                .tags
                .get(tags::EXPECT)
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(0),
        })
    }
}

fn required<'a>(member: &'a Member, tag: &'static str) -> Result<&'a str, MalformedPeerError> {
    member
        .tags
        .get(tag)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| MalformedPeerError::MissingTag {
            member: member.name.clone(),
            tag,
        })
}

fn socket_addr(
    member: &Member,
    ip_tag: &'static str,
    port_tag: &'static str,
) -> Result<SocketAddr, MalformedPeerError> {
    let ip_value = required(member, ip_tag)?;
    let ip: IpAddr = ip_value
        .parse()
        .map_err(|_| MalformedPeerError::InvalidAddress {
            member: member.name.clone(),
            tag: ip_tag,
            value: ip_value.to_string(),
        })?;

    let port_value = required(member, port_tag)?;
    let port: u16 = port_value
        .parse()
        .map_err(|_| MalformedPeerError::InvalidPort {
            member: member.name.clone(),
            tag: port_tag,
            value: port_value.to_string(),
        })?;

    Ok(SocketAddr::new(ip, port))
}

/// Any non-empty value other than an explicit "off" marker counts as set
fn bootstrap_flag(set: &Tags) -> bool {
    match set.get(tags::BOOTSTRAP) {
        Some(value) => {
            let value = value.trim().to_ascii_lowercase();
            !value.is_empty() && !matches!(value.as_str(), "0" | "false" | "no" | "off")
        }
        None => false,
    }
}
