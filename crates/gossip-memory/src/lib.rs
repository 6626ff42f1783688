//! In-memory gossip adaptor for testing
//!
//! Nodes sharing a [`MemoryGossipHub`] see each other join, leave and fail
//! within the same process, perfect for testing and local clusters. As with
//! real gossip layers, a joining node is reported to itself in its first
//! join batch.
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;

pub use error::Error;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cairn_gossip::{EventReceiver, GossipAdaptor, GossipEvent, Member, MemberStatus, Tags};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Registered node inside a hub
#[derive(Clone)]
struct HubEntry {
    member: Member,
    events: mpsc::UnboundedSender<GossipEvent>,
}

/// Shared membership view routing events between in-memory nodes
#[derive(Clone, Default)]
pub struct MemoryGossipHub {
    nodes: Arc<RwLock<HashMap<String, HubEntry>>>,
}

impl MemoryGossipHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of registered nodes, sorted
    pub fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.nodes.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Whether no node is registered
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Simulate failure detection for a node
    ///
    /// The node is dropped from the hub and every remaining node receives a
    /// `MemberFailed` event for it.
    pub fn fail(&self, name: &str) -> Result<(), Error> {
        let entry = self
            .nodes
            .write()
            .remove(name)
            .ok_or_else(|| Error::NodeNotFound(name.to_string()))?;

        info!("Memory gossip marking {} as failed", name);
        self.broadcast(GossipEvent::MemberFailed(vec![
            entry.member.with_status(MemberStatus::Failed),
        ]));
        Ok(())
    }

    /// Broadcast a user event to every registered node
    pub fn user_event(&self, name: &str, payload: Vec<u8>) {
        self.broadcast(GossipEvent::User {
            name: name.to_string(),
            payload,
        });
    }

    /// Replace the tags of a node and notify every registered node
    pub fn update_tags(&self, name: &str, tags: Tags) -> Result<(), Error> {
        let member = {
            let mut nodes = self.nodes.write();
            let entry = nodes
                .get_mut(name)
                .ok_or_else(|| Error::NodeNotFound(name.to_string()))?;
            entry.member.tags = tags;
            entry.member.clone()
        };

        self.broadcast(GossipEvent::MemberUpdate(vec![member]));
        Ok(())
    }

    fn members(&self) -> Vec<Member> {
        let mut members: Vec<Member> = self
            .nodes
            .read()
            .values()
            .map(|entry| entry.member.clone())
            .collect();
        members.sort_by(|a, b| a.name.cmp(&b.name));
        members
    }

    fn knows(&self, seed: &str) -> bool {
        self.nodes
            .read()
            .values()
            .any(|entry| entry.member.name == seed || entry.member.addr == seed)
    }

    /// Register a node; returns the members that were present before it
    fn register(&self, entry: HubEntry) -> Result<Vec<Member>, Error> {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(&entry.member.name) {
            return Err(Error::NameConflict(entry.member.name.clone()));
        }

        let mut existing: Vec<Member> = nodes.values().map(|e| e.member.clone()).collect();
        existing.sort_by(|a, b| a.name.cmp(&b.name));
        nodes.insert(entry.member.name.clone(), entry);
        Ok(existing)
    }

    fn unregister(&self, name: &str) -> Option<Member> {
        self.nodes.write().remove(name).map(|entry| entry.member)
    }

    fn send_to(&self, name: &str, event: GossipEvent) {
        let sender = self.nodes.read().get(name).map(|entry| entry.events.clone());
        if let Some(sender) = sender {
            // The receiving node may have dropped its stream already
            let _ = sender.send(event);
        }
    }

    fn broadcast(&self, event: GossipEvent) {
        self.broadcast_except(event, None);
    }

    fn broadcast_except(&self, event: GossipEvent, except: Option<&str>) {
        let senders: Vec<_> = self
            .nodes
            .read()
            .values()
            .filter(|entry| Some(entry.member.name.as_str()) != except)
            .map(|entry| entry.events.clone())
            .collect();

        for sender in senders {
            let _ = sender.send(event.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Idle,
    Joined,
    Left,
    ShutDown,
}

/// Gossip adaptor backed by a [`MemoryGossipHub`]
pub struct MemoryGossip {
    hub: MemoryGossipHub,
    member: Member,
    sender: Mutex<Option<mpsc::UnboundedSender<GossipEvent>>>,
    receiver: Mutex<Option<EventReceiver>>,
    state: Mutex<NodeState>,
}

impl MemoryGossip {
    /// Create a node that announces the given tags once joined
    pub fn new(
        hub: MemoryGossipHub,
        name: impl Into<String>,
        addr: impl Into<String>,
        tags: Tags,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        Self {
            hub,
            member: Member::new(name, addr, tags),
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            state: Mutex::new(NodeState::Idle),
        }
    }

    /// The hub this node is attached to
    pub fn hub(&self) -> &MemoryGossipHub {
        &self.hub
    }
}

#[async_trait]
impl GossipAdaptor for MemoryGossip {
    type Error = Error;

    fn local_member(&self) -> Member {
        self.member.clone()
    }

    fn members(&self) -> Vec<Member> {
        match *self.state.lock() {
            NodeState::Joined => self.hub.members(),
            _ => vec![self.member.clone()],
        }
    }

    fn take_events(&self) -> Option<EventReceiver> {
        self.receiver.lock().take()
    }

    async fn join(&self, seeds: &[String]) -> Result<usize, Self::Error> {
        let reachable = seeds.iter().filter(|seed| self.hub.knows(seed)).count();
        if !seeds.is_empty() && reachable == 0 {
            return Err(Error::UnknownSeed(seeds.to_vec()));
        }

        let mut state = self.state.lock();
        match *state {
            NodeState::Joined => {
                debug!("{} already joined, contacted {} seeds", self.member.name, reachable);
                return Ok(reachable);
            }
            NodeState::Left | NodeState::ShutDown => {
                return Err(Error::NotRunning(self.member.name.clone()));
            }
            NodeState::Idle => {}
        }

        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or_else(|| Error::NotRunning(self.member.name.clone()))?;

        let mut batch = self.hub.register(HubEntry {
            member: self.member.clone(),
            events: sender,
        })?;
        *state = NodeState::Joined;
        drop(state);

        self.hub.broadcast_except(
            GossipEvent::MemberJoin(vec![self.member.clone()]),
            Some(&self.member.name),
        );
        batch.push(self.member.clone());
        self.hub
            .send_to(&self.member.name, GossipEvent::MemberJoin(batch));

        info!(
            "{} joined memory gossip ({} seeds reachable)",
            self.member.name, reachable
        );
        Ok(reachable)
    }

    async fn leave(&self) -> Result<(), Self::Error> {
        let mut state = self.state.lock();
        if *state != NodeState::Joined {
            return Ok(());
        }
        *state = NodeState::Left;
        drop(state);

        if let Some(member) = self.hub.unregister(&self.member.name) {
            info!("{} leaving memory gossip", member.name);
            self.hub
                .broadcast(GossipEvent::MemberLeave(vec![member.with_status(MemberStatus::Left)]));
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        let previous = std::mem::replace(&mut *self.state.lock(), NodeState::ShutDown);

        // Shutting down without leaving looks like a crash to the others
        if previous == NodeState::Joined
            && let Some(member) = self.hub.unregister(&self.member.name)
        {
            self.hub.broadcast(GossipEvent::MemberFailed(vec![
                member.with_status(MemberStatus::Failed),
            ]));
        }

        self.sender.lock().take();
        debug!("{} memory gossip shut down", self.member.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use cairn_gossip::{GossipAdaptorError, GossipAdaptorErrorKind, GossipEventKind};

    fn node(hub: &MemoryGossipHub, name: &str) -> MemoryGossip {
        MemoryGossip::new(hub.clone(), name, format!("{name}:7946"), Tags::new())
    }

    fn names(event: &GossipEvent) -> Vec<String> {
        event.members().iter().map(|m| m.name.clone()).collect()
    }

    #[tokio::test]
    async fn test_first_node_joins_alone_and_sees_itself() {
        let hub = MemoryGossipHub::new();
        let a = node(&hub, "a");
        let mut events = a.take_events().unwrap();

        assert_eq!(a.join(&[]).await.unwrap(), 0);

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind(), GossipEventKind::MemberJoin);
        assert_eq!(names(&event), vec!["a"]);
        assert_eq!(hub.len(), 1);
    }

    #[tokio::test]
    async fn test_join_notifies_both_sides() {
        let hub = MemoryGossipHub::new();
        let a = node(&hub, "a");
        let b = node(&hub, "b");
        let mut a_events = a.take_events().unwrap();
        let mut b_events = b.take_events().unwrap();

        a.join(&[]).await.unwrap();
        assert_eq!(b.join(&["a".to_string()]).await.unwrap(), 1);

        let _self_join = a_events.recv().await.unwrap();
        let event = a_events.recv().await.unwrap();
        assert_eq!(names(&event), vec!["b"]);

        let event = b_events.recv().await.unwrap();
        assert_eq!(names(&event), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_unknown_seed_is_rejected() {
        let hub = MemoryGossipHub::new();
        let a = node(&hub, "a");

        let err = a.join(&["nowhere:7946".to_string()]).await.unwrap_err();
        assert_eq!(err.kind(), GossipAdaptorErrorKind::UnknownSeed);
        assert!(hub.is_empty());
    }

    #[tokio::test]
    async fn test_name_conflict_is_rejected() {
        let hub = MemoryGossipHub::new();
        let first = node(&hub, "a");
        let second = node(&hub, "a");

        first.join(&[]).await.unwrap();
        let err = second.join(&["a".to_string()]).await.unwrap_err();
        assert_eq!(err.kind(), GossipAdaptorErrorKind::NameConflict);
    }

    #[tokio::test]
    async fn test_leave_and_fail_are_broadcast() {
        let hub = MemoryGossipHub::new();
        let a = node(&hub, "a");
        let b = node(&hub, "b");
        let c = node(&hub, "c");
        let mut a_events = a.take_events().unwrap();

        a.join(&[]).await.unwrap();
        b.join(&["a".to_string()]).await.unwrap();
        c.join(&["a".to_string()]).await.unwrap();

        b.leave().await.unwrap();
        hub.fail("c").unwrap();

        let kinds: Vec<_> = std::iter::from_fn(|| a_events.try_recv().ok())
            .map(|e| (e.kind(), names(&e)))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (GossipEventKind::MemberJoin, vec!["a".to_string()]),
                (GossipEventKind::MemberJoin, vec!["b".to_string()]),
                (GossipEventKind::MemberJoin, vec!["c".to_string()]),
                (GossipEventKind::MemberLeave, vec!["b".to_string()]),
                (GossipEventKind::MemberFailed, vec!["c".to_string()]),
            ]
        );
        assert_eq!(hub.member_names(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_rejoin_after_leave_is_refused() {
        let hub = MemoryGossipHub::new();
        let a = node(&hub, "a");

        a.join(&[]).await.unwrap();
        a.leave().await.unwrap();

        let err = a.join(&[]).await.unwrap_err();
        assert_eq!(err.kind(), GossipAdaptorErrorKind::NotRunning);
    }

    #[tokio::test]
    async fn test_shutdown_closes_event_stream() {
        let hub = MemoryGossipHub::new();
        let a = node(&hub, "a");
        let mut events = a.take_events().unwrap();

        a.join(&[]).await.unwrap();
        a.shutdown().await.unwrap();

        assert!(events.recv().await.is_some());
        assert!(events.recv().await.is_none());
        assert!(a.take_events().is_none());
    }
}
