//! Instance configuration

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use cairn_gossip::{Tags, tags};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Default gossip bind port
pub const DEFAULT_BIND_PORT: u16 = 7946;

/// Default replication (raft) transport port
pub const DEFAULT_RAFT_PORT: u16 = 8300;

/// Default client RPC port
pub const DEFAULT_RPC_PORT: u16 = 8400;

/// Required length of the gossip encryption key
pub const ENCRYPTION_KEY_LEN: usize = 32;

/// Configuration of a single cairn node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Unique node name, also the consensus server id
    pub name: String,

    /// Host the gossip layer binds to
    pub bind_host: String,

    /// Port the gossip layer binds to
    pub bind_port: u16,

    /// Address of the replication transport announced to peers
    pub raft_addr: SocketAddr,

    /// Address of the client RPC service announced to peers
    pub rpc_addr: SocketAddr,

    /// Single-node bootstrap intent, announced to peers
    pub bootstrap: bool,

    /// Number of peers to wait for before bootstrapping; 0 disables expect mode
    pub expect: usize,

    /// Symmetric gossip encryption key
    pub encryption_key: Option<Vec<u8>>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            bind_host: "0.0.0.0".to_string(),
            bind_port: DEFAULT_BIND_PORT,
            raft_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_RAFT_PORT)),
            rpc_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_RPC_PORT)),
            bootstrap: false,
            expect: 0,
            encryption_key: None,
        }
    }
}

impl InstanceConfig {
    /// Default configuration for a named node
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the gossip bind host
    pub fn with_bind_host(mut self, host: impl Into<String>) -> Self {
        self.bind_host = host.into();
        self
    }

    /// Set the gossip bind port
    pub fn with_bind_port(mut self, port: u16) -> Self {
        self.bind_port = port;
        self
    }

    /// Set the replication transport address
    pub fn with_raft_addr(mut self, addr: SocketAddr) -> Self {
        self.raft_addr = addr;
        self
    }

    /// Set the client RPC address
    pub fn with_rpc_addr(mut self, addr: SocketAddr) -> Self {
        self.rpc_addr = addr;
        self
    }

    /// Set the bootstrap flag
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set the expect count
    pub fn with_expect(mut self, expect: usize) -> Self {
        self.expect = expect;
        self
    }

    /// Set the gossip encryption key
    pub fn with_encryption_key(mut self, key: Vec<u8>) -> Self {
        self.encryption_key = Some(key);
        self
    }

    /// Gossip bind address as `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }

    /// Check that the configuration can be used to start a node
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::MissingName);
        }

        if self.bootstrap && self.expect != 0 {
            return Err(ConfigurationError::BootstrapWithExpect {
                expect: self.expect,
            });
        }

        if let Some(key) = &self.encryption_key
            && key.len() != ENCRYPTION_KEY_LEN
        {
            return Err(ConfigurationError::InvalidEncryptionKey { len: key.len() });
        }

        Ok(())
    }

    /// Tags this node announces about itself over gossip
    ///
    /// `bootstrap` is only written when set; `expect` is always written.
    pub fn local_tags(&self) -> Tags {
        let mut local = Tags::new();
        local.insert(tags::ID, self.name.clone());
        local.insert(tags::RAFT_IP, self.raft_addr.ip().to_string());
        local.insert(tags::RAFT_PORT, self.raft_addr.port().to_string());
        local.insert(tags::RPC_IP, self.rpc_addr.ip().to_string());
        local.insert(tags::RPC_PORT, self.rpc_addr.port().to_string());
        if self.bootstrap {
            local.insert(tags::BOOTSTRAP, "1");
        }
        local.insert(tags::EXPECT, self.expect.to_string());
        local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InstanceConfig::new("node-1");

        assert_eq!(config.bind_addr(), "0.0.0.0:7946");
        assert_eq!(config.raft_addr, "127.0.0.1:8300".parse().unwrap());
        assert_eq!(config.rpc_addr, "127.0.0.1:8400".parse().unwrap());
        assert_eq!(config.expect, 0);
        assert!(!config.bootstrap);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        assert_eq!(
            InstanceConfig::default().validate(),
            Err(ConfigurationError::MissingName)
        );
    }

    #[test]
    fn test_validate_rejects_bootstrap_with_expect() {
        let config = InstanceConfig::new("node-1")
            .with_bootstrap(true)
            .with_expect(3);

        assert_eq!(
            config.validate(),
            Err(ConfigurationError::BootstrapWithExpect { expect: 3 })
        );
    }

    #[test]
    fn test_validate_encryption_key_length() {
        let short = InstanceConfig::new("node-1").with_encryption_key(vec![0; 16]);
        assert_eq!(
            short.validate(),
            Err(ConfigurationError::InvalidEncryptionKey { len: 16 })
        );

        let ok = InstanceConfig::new("node-1").with_encryption_key(vec![7; 32]);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_local_tags() {
        let config = InstanceConfig::new("node-1")
            .with_raft_addr("10.0.0.1:9000".parse().unwrap())
            .with_rpc_addr("10.0.0.1:9001".parse().unwrap())
            .with_expect(3);

        let local = config.local_tags();
        assert_eq!(local.get(tags::ID), Some("node-1"));
        assert_eq!(local.get(tags::RAFT_IP), Some("10.0.0.1"));
        assert_eq!(local.get(tags::RAFT_PORT), Some("9000"));
        assert_eq!(local.get(tags::RPC_PORT), Some("9001"));
        assert_eq!(local.get(tags::EXPECT), Some("3"));
        assert!(!local.contains(tags::BOOTSTRAP));

        let bootstrap = config.with_bootstrap(true).local_tags();
        assert_eq!(bootstrap.get(tags::BOOTSTRAP), Some("1"));
    }

    #[test]
    fn test_partial_toml() {
        let config: InstanceConfig = toml::from_str(
            r#"
            name = "node-2"
            expect = 3
            raft_addr = "10.0.0.2:8300"
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "node-2");
        assert_eq!(config.expect, 3);
        assert_eq!(config.raft_addr, "10.0.0.2:8300".parse().unwrap());
        assert_eq!(config.bind_port, DEFAULT_BIND_PORT);
    }
}
