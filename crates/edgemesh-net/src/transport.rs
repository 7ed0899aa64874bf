//! Transport abstraction.
//!
//! The client talks to edge nodes through a topic-based publish/subscribe
//! broker. Connection management and reconnect policy belong to the
//! implementation; the client only needs subscribe, publish and an ordered
//! stream of inbound frames.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use crate::error::{NetError, Result};

/// One inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub topic: String,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Broker connection parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    pub url: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Publish/subscribe transport.
///
/// Implementations must be thread-safe (Send + Sync) and deliver frames in
/// arrival order.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start receiving frames published on topics matching `filter`.
    async fn subscribe(&self, filter: &str) -> Result<()>;

    /// Publish a payload on a topic.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()>;

    /// Receive the next inbound frame.
    ///
    /// Errors once the connection is closed.
    async fn recv(&self) -> Result<Frame>;

    /// Receive with timeout.
    ///
    /// Returns None if the timeout expires before a frame arrives.
    async fn recv_timeout(&self, timeout: Duration) -> Result<Option<Frame>> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(frame) => frame.map(Some),
            Err(_) => Ok(None),
        }
    }
}

/// Whether a topic filter matches a topic.
///
/// Filters use `/`-separated levels; `+` matches one level and a trailing
/// `#` matches any remainder.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// An in-memory broker for tests and demos.
///
/// Every connected client gets a channel; publishing delivers a copy of the
/// frame to each client with a matching subscription, including the
/// publisher.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex, RwLock};
    use tracing::debug;

    const CLIENT_CHANNEL_CAPACITY: usize = 1000;

    struct Client {
        filters: Vec<String>,
        sender: mpsc::Sender<Frame>,
    }

    /// Shared state of the in-memory broker.
    pub struct MemoryBroker {
        clients: RwLock<HashMap<String, Client>>,
    }

    impl MemoryBroker {
        /// Create a new broker.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Connect a client. Reconnecting with a known id drops the old
        /// session's subscriptions.
        pub async fn connect(
            self: &Arc<Self>,
            options: &ConnectOptions,
        ) -> Result<MemoryTransport> {
            if options.client_id.is_empty() {
                return Err(NetError::Transport("client id must not be empty".into()));
            }
            let (tx, rx) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
            self.clients.write().await.insert(
                options.client_id.clone(),
                Client {
                    filters: Vec::new(),
                    sender: tx,
                },
            );
            debug!(client_id = %options.client_id, "memory transport connected");

            Ok(MemoryTransport {
                client_id: options.client_id.clone(),
                broker: Arc::clone(self),
                receiver: Mutex::new(rx),
            })
        }

        /// Disconnect a client; its pending `recv` fails.
        pub async fn disconnect(&self, client_id: &str) {
            self.clients.write().await.remove(client_id);
        }
    }

    impl Default for MemoryBroker {
        fn default() -> Self {
            Self {
                clients: RwLock::new(HashMap::new()),
            }
        }
    }

    /// A client connection to a [`MemoryBroker`].
    pub struct MemoryTransport {
        client_id: String,
        broker: Arc<MemoryBroker>,
        receiver: Mutex<mpsc::Receiver<Frame>>,
    }

    impl MemoryTransport {
        pub fn client_id(&self) -> &str {
            &self.client_id
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn subscribe(&self, filter: &str) -> Result<()> {
            let mut clients = self.broker.clients.write().await;
            let client = clients
                .get_mut(&self.client_id)
                .ok_or_else(|| NetError::Transport("not connected".into()))?;
            if !client.filters.iter().any(|f| f == filter) {
                client.filters.push(filter.to_string());
            }
            Ok(())
        }

        async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
            let targets: Vec<mpsc::Sender<Frame>> = {
                let clients = self.broker.clients.read().await;
                if !clients.contains_key(&self.client_id) {
                    return Err(NetError::Transport("not connected".into()));
                }
                clients
                    .values()
                    .filter(|c| c.filters.iter().any(|f| topic_matches(f, topic)))
                    .map(|c| c.sender.clone())
                    .collect()
            };

            for sender in targets {
                // Ignore errors (receiver may have gone away)
                let _ = sender.send(Frame::new(topic, payload.clone())).await;
            }
            Ok(())
        }

        async fn recv(&self) -> Result<Frame> {
            let mut rx = self.receiver.lock().await;
            rx.recv()
                .await
                .ok_or_else(|| NetError::Transport("channel closed".into()))
        }
    }
}
