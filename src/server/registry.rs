//! Registry of connected participants.
//!
//! The table is shared by every connection task. Fan-out holds the read lock
//! so it always walks a consistent snapshot; add and remove hold the write
//! lock. Each participant has a bounded outbound queue; a peer whose queue is
//! full or closed is removed and its connection task told to stop.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify, RwLock};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::chat::{self, ChatEvent};

/// An encoded frame shared by every recipient of one broadcast.
pub type Frame = Arc<[u8]>;

/// Sending half of a participant's outbound queue.
pub type Outbound = mpsc::Sender<Frame>;

/// Frames a participant may have queued before it counts as unresponsive.
pub const OUTBOUND_CAPACITY: usize = 100;

/// Create a participant's outbound queue.
pub fn outbound_channel() -> (Outbound, mpsc::Receiver<Frame>) {
    mpsc::channel(OUTBOUND_CAPACITY)
}

/// A registered participant.
#[derive(Debug)]
pub struct Participant {
    /// Identifier of the connection that registered this entry.
    pub connection_id: Uuid,
    /// Display name.
    pub name: String,
    /// Registration timestamp.
    pub connected_at: DateTime<Utc>,
    outbound: Outbound,
    evicted: Arc<Notify>,
}

impl Participant {
    /// Create a participant for a fresh connection.
    pub fn new(name: impl Into<String>, outbound: Outbound) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            name: name.into(),
            connected_at: Utc::now(),
            outbound,
            evicted: Arc::new(Notify::new()),
        }
    }

    /// Signal fired when this entry is removed or replaced.
    pub fn evicted(&self) -> Arc<Notify> {
        Arc::clone(&self.evicted)
    }

    fn evict(&self) {
        self.evicted.notify_one();
    }
}

/// Result of one fan-out.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Number of participants the frame was queued for.
    pub delivered: usize,
    /// Participants removed because their outbound queue was full or closed.
    pub dropped: Vec<String>,
}

/// Name → outbound channel table.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    participants: RwLock<HashMap<String, Participant>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant.
    ///
    /// A participant already registered under the same name is replaced,
    /// signalled as evicted and returned; dropping it closes its outbound
    /// queue.
    pub async fn add(&self, participant: Participant) -> Option<Participant> {
        let name = participant.name.clone();
        let replaced = self
            .participants
            .write()
            .await
            .insert(name.clone(), participant);
        if let Some(old) = &replaced {
            old.evict();
        }
        debug!("Registered participant {}", name);
        replaced
    }

    /// Remove a participant by name. Unknown names are ignored.
    pub async fn remove(&self, name: &str) -> bool {
        match self.participants.write().await.remove(name) {
            Some(participant) => {
                participant.evict();
                true
            }
            None => false,
        }
    }

    /// Remove `name` only if it is still registered by `connection_id`.
    ///
    /// A connection that was replaced by a newer one with the same name must
    /// not remove its successor.
    pub async fn remove_connection(&self, name: &str, connection_id: Uuid) -> bool {
        let mut participants = self.participants.write().await;
        match participants.get(name) {
            Some(p) if p.connection_id == connection_id => {
                if let Some(participant) = participants.remove(name) {
                    participant.evict();
                }
                true
            }
            _ => false,
        }
    }

    /// Check whether a name is registered.
    pub async fn contains(&self, name: &str) -> bool {
        self.participants.read().await.contains_key(name)
    }

    /// Number of registered participants.
    pub async fn participant_count(&self) -> usize {
        self.participants.read().await.len()
    }

    /// Registered names, sorted.
    pub async fn participant_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.participants.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Deliver a message from `sender` to every other participant.
    pub async fn broadcast(&self, sender: &str, body: &str) -> Delivery {
        self.fanout(&ChatEvent::new(sender, body), Some(sender))
            .await
    }

    /// Deliver a `SYSTEM` message to every participant.
    pub async fn broadcast_system(&self, body: &str) -> Delivery {
        self.fanout(&ChatEvent::system(body), None).await
    }

    /// Announce a newly registered participant to everyone else.
    pub async fn announce_join(&self, name: &str) -> Delivery {
        self.fanout(&ChatEvent::joined(name), Some(name)).await
    }

    /// Announce a departed participant to everyone still registered.
    pub async fn announce_leave(&self, name: &str) -> Delivery {
        self.fanout(&ChatEvent::left(name), None).await
    }

    async fn fanout(&self, event: &ChatEvent, exclude: Option<&str>) -> Delivery {
        let frame: Frame = match chat::encode(event) {
            Ok(bytes) => bytes.into(),
            Err(e) => {
                error!("Failed to encode event from {}: {}", event.sender, e);
                return Delivery::default();
            }
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        {
            let participants = self.participants.read().await;
            for (name, participant) in participants.iter() {
                if exclude == Some(name.as_str()) {
                    continue;
                }
                match participant.outbound.try_send(Arc::clone(&frame)) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!("Outbound queue for {} is full", name);
                        failed.push((name.clone(), participant.connection_id));
                    }
                    Err(TrySendError::Closed(_)) => {
                        failed.push((name.clone(), participant.connection_id));
                    }
                }
            }
        }

        let mut dropped = Vec::new();
        for (name, connection_id) in failed {
            if self.remove_connection(&name, connection_id).await {
                debug!("Removed {} after a failed delivery", name);
                dropped.push(name);
            }
        }

        Delivery { delivered, dropped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc::Receiver;

    fn participant(name: &str) -> (Participant, Receiver<Frame>) {
        let (tx, rx) = outbound_channel();
        (Participant::new(name, tx), rx)
    }

    fn received(rx: &mut Receiver<Frame>) -> Vec<ChatEvent> {
        let mut buffer = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            buffer.extend_from_slice(&frame);
        }
        chat::decode(&mut buffer)
    }

    #[tokio::test]
    async fn test_add_and_remove() {
        let registry = ConnectionRegistry::new();
        let (alice, _rx) = participant("alice");

        assert!(registry.add(alice).await.is_none());
        assert!(registry.contains("alice").await);
        assert_eq!(registry.participant_count().await, 1);

        assert!(registry.remove("alice").await);
        assert!(!registry.contains("alice").await);
    }

    #[tokio::test]
    async fn test_remove_unknown_is_noop() {
        let registry = ConnectionRegistry::new();
        let (alice, _rx) = participant("alice");
        registry.add(alice).await;

        assert!(!registry.remove("nobody").await);
        assert_eq!(registry.participant_count().await, 1);
    }

    #[tokio::test]
    async fn test_add_same_name_replaces() {
        let registry = ConnectionRegistry::new();
        let (first, mut first_rx) = participant("alice");
        let (second, mut second_rx) = participant("alice");
        let second_id = second.connection_id;

        registry.add(first).await;
        let replaced = registry.add(second).await;
        assert!(replaced.is_some());
        drop(replaced);

        assert_eq!(registry.participant_count().await, 1);
        // The old queue is closed once the replaced entry is dropped.
        assert!(first_rx.recv().await.is_none());

        registry.broadcast_system("hello").await;
        assert_eq!(received(&mut second_rx), vec![ChatEvent::system("hello")]);

        let (bob, _bob_rx) = participant("bob");
        registry.add(bob).await;
        assert!(registry.remove_connection("alice", second_id).await);
    }

    #[tokio::test]
    async fn test_remove_connection_ignores_stale_id() {
        let registry = ConnectionRegistry::new();
        let (first, _first_rx) = participant("alice");
        let stale_id = first.connection_id;
        let (second, _second_rx) = participant("alice");

        registry.add(first).await;
        registry.add(second).await;

        assert!(!registry.remove_connection("alice", stale_id).await);
        assert!(registry.contains("alice").await);
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let registry = ConnectionRegistry::new();
        let (alice, mut alice_rx) = participant("alice");
        let (bob, mut bob_rx) = participant("bob");
        let (carol, mut carol_rx) = participant("carol");
        registry.add(alice).await;
        registry.add(bob).await;
        registry.add(carol).await;

        let delivery = registry.broadcast("alice", "hi").await;

        assert_eq!(delivery.delivered, 2);
        assert!(delivery.dropped.is_empty());
        assert!(received(&mut alice_rx).is_empty());
        assert_eq!(received(&mut bob_rx), vec![ChatEvent::new("alice", "hi")]);
        assert_eq!(received(&mut carol_rx), vec![ChatEvent::new("alice", "hi")]);
    }

    #[tokio::test]
    async fn test_broadcast_system_reaches_everyone() {
        let registry = ConnectionRegistry::new();
        let (alice, mut alice_rx) = participant("alice");
        let (bob, mut bob_rx) = participant("bob");
        registry.add(alice).await;
        registry.add(bob).await;

        let delivery = registry.broadcast_system("maintenance soon").await;

        assert_eq!(delivery.delivered, 2);
        assert_eq!(
            received(&mut alice_rx),
            vec![ChatEvent::system("maintenance soon")]
        );
        assert_eq!(
            received(&mut bob_rx),
            vec![ChatEvent::system("maintenance soon")]
        );
    }

    #[tokio::test]
    async fn test_announce_join_skips_joiner() {
        let registry = ConnectionRegistry::new();
        let (alice, mut alice_rx) = participant("alice");
        let (bob, mut bob_rx) = participant("bob");
        registry.add(alice).await;
        registry.add(bob).await;

        registry.announce_join("bob").await;

        assert_eq!(received(&mut alice_rx), vec![ChatEvent::joined("bob")]);
        assert!(received(&mut bob_rx).is_empty());
    }

    #[tokio::test]
    async fn test_failed_peer_removed_others_still_delivered() {
        let registry = ConnectionRegistry::new();
        let (alice, _alice_rx) = participant("alice");
        let (bob, bob_rx) = participant("bob");
        let (carol, mut carol_rx) = participant("carol");
        let (dave, mut dave_rx) = participant("dave");
        registry.add(alice).await;
        registry.add(bob).await;
        registry.add(carol).await;
        registry.add(dave).await;

        // Bob's connection is gone.
        drop(bob_rx);

        let delivery = registry.broadcast("alice", "still there?").await;

        assert_eq!(delivery.delivered, 2);
        assert_eq!(delivery.dropped, vec!["bob".to_string()]);
        assert!(!registry.contains("bob").await);
        assert_eq!(
            received(&mut carol_rx),
            vec![ChatEvent::new("alice", "still there?")]
        );
        assert_eq!(
            received(&mut dave_rx),
            vec![ChatEvent::new("alice", "still there?")]
        );
    }

    #[tokio::test]
    async fn test_concurrent_add_and_broadcast() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut receivers = Vec::new();
        let mut handles = Vec::new();

        for i in 0..20 {
            let (p, rx) = participant(&format!("user{i}"));
            receivers.push(rx);
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.add(p).await;
                registry.broadcast_system("tick").await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.participant_count().await, 20);
        assert_eq!(registry.participant_names().await.len(), 20);
        for rx in receivers.iter_mut() {
            assert!(!received(rx).is_empty());
        }
    }

    #[tokio::test]
    async fn test_unresponsive_peer_removed_when_queue_full() {
        let registry = ConnectionRegistry::new();
        let (alice, _alice_rx) = participant("alice");
        let (bob, mut bob_rx) = participant("bob");
        let (carol, mut carol_rx) = participant("carol");
        let stalled = bob.evicted();
        registry.add(alice).await;
        registry.add(bob).await;
        registry.add(carol).await;

        // Bob never drains his queue.
        for i in 0..OUTBOUND_CAPACITY {
            let delivery = registry.broadcast("alice", &format!("msg {i}")).await;
            assert!(delivery.dropped.is_empty());
            assert_eq!(received(&mut carol_rx).len(), 1);
        }

        let delivery = registry.broadcast("alice", "one too many").await;
        assert_eq!(delivery.delivered, 1);
        assert_eq!(delivery.dropped, vec!["bob".to_string()]);
        assert!(!registry.contains("bob").await);

        tokio::time::timeout(Duration::from_secs(1), stalled.notified())
            .await
            .expect("bob's connection should be told to stop");

        // Only what fit in the queue was ever accepted for bob.
        assert_eq!(received(&mut bob_rx).len(), OUTBOUND_CAPACITY);
    }

    #[tokio::test]
    async fn test_replaced_participant_is_evicted() {
        let registry = ConnectionRegistry::new();
        let (first, _first_rx) = participant("alice");
        let (second, _second_rx) = participant("alice");
        let evicted = first.evicted();

        registry.add(first).await;
        registry.add(second).await;

        tokio::time::timeout(Duration::from_secs(1), evicted.notified())
            .await
            .expect("replaced connection should be told to stop");
    }
}
