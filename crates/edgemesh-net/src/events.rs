//! Event hub.
//!
//! Consumers observe inbound traffic through explicit channels: a broadcast
//! stream of [`ClientEvent`]s for anyone interested, and per-signature
//! mailboxes for plugin payloads.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::messages::EdgeMessage;

/// Default capacity of hub channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Inbound traffic as seen by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A heartbeat replaced a node's snapshot.
    Heartbeat { node: String },
    /// A notification was received.
    Notification(EdgeMessage),
    /// A data payload was received.
    Payload(EdgeMessage),
    /// A supervisor published on the admin path.
    NetworkTopology { supervisor: String, message: EdgeMessage },
}

/// Broadcast stream plus per-signature payload mailboxes.
pub struct EventHub {
    events: broadcast::Sender<ClientEvent>,
    mailboxes: RwLock<HashMap<String, Vec<mpsc::Sender<EdgeMessage>>>>,
    capacity: usize,
}

impl EventHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (events, _) = broadcast::channel(capacity);
        Self {
            events,
            mailboxes: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Subscribe to every client event.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Receive payloads published by plugins with this signature.
    pub fn subscribe_payloads(&self, signature: &str) -> mpsc::Receiver<EdgeMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.mailboxes
            .write()
            .entry(signature.to_string())
            .or_default()
            .push(tx);
        debug!(signature = %signature, "payload subscription created");
        rx
    }

    /// Publish an event. Returns the number of receivers.
    pub fn emit(&self, event: ClientEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    /// Deliver a payload to its signature's mailboxes and the broadcast.
    ///
    /// Closed mailboxes are pruned; full ones drop the payload.
    pub fn deliver_payload(&self, message: EdgeMessage) -> usize {
        let mut delivered = 0;
        if let Some(signature) = message.path.signature.clone() {
            let mut mailboxes = self.mailboxes.write();
            if let Some(senders) = mailboxes.get_mut(&signature) {
                senders.retain(|tx| !tx.is_closed());
                for tx in senders.iter() {
                    match tx.try_send(message.clone()) {
                        Ok(()) => delivered += 1,
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            warn!(signature = %signature, "payload mailbox full, dropping");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {}
                    }
                }
                if senders.is_empty() {
                    mailboxes.remove(&signature);
                }
            }
        }
        self.emit(ClientEvent::Payload(message));
        delivered
    }

    /// Signatures with at least one open mailbox.
    pub fn payload_signatures(&self) -> Vec<String> {
        let mut signatures: Vec<String> = self.mailboxes.read().keys().cloned().collect();
        signatures.sort();
        signatures
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::EventType;
    use edgemesh_core::PathTuple;
    use serde_json::Map;

    fn payload(signature: &str) -> EdgeMessage {
        EdgeMessage {
            event_type: EventType::Payload,
            path: PathTuple::instance("n", "p", signature, "i"),
            sender: None,
            session_id: None,
            initiator_id: None,
            timestamp: None,
            data: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_payloads_routed_by_signature() {
        let hub = EventHub::new();
        let mut detector = hub.subscribe_payloads("DETECTOR");
        let mut counter = hub.subscribe_payloads("COUNTER");
        let mut all = hub.subscribe();

        assert_eq!(hub.deliver_payload(payload("DETECTOR")), 1);

        assert_eq!(detector.recv().await.unwrap(), payload("DETECTOR"));
        assert!(counter.try_recv().is_err());
        assert_eq!(all.recv().await.unwrap(), ClientEvent::Payload(payload("DETECTOR")));
    }

    #[tokio::test]
    async fn test_closed_mailboxes_pruned() {
        let hub = EventHub::new();
        let rx = hub.subscribe_payloads("DETECTOR");
        drop(rx);

        assert_eq!(hub.deliver_payload(payload("DETECTOR")), 0);
        assert!(hub.payload_signatures().is_empty());
    }

    #[test]
    fn test_full_mailbox_drops() {
        let hub = EventHub::with_capacity(1);
        let _rx = hub.subscribe_payloads("DETECTOR");
        assert_eq!(hub.deliver_payload(payload("DETECTOR")), 1);
        assert_eq!(hub.deliver_payload(payload("DETECTOR")), 0);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let hub = EventHub::new();
        assert_eq!(hub.emit(ClientEvent::Heartbeat { node: "n".into() }), 0);
    }
}
