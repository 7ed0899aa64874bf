//! In-memory node state cache.
//!
//! Holds the last heartbeat of every node, the last time each node was seen
//! on any channel, and the last network view reported by each supervisor.
//! Thread-safe via `parking_lot::RwLock`; no lock is held while events are
//! delivered.

use std::collections::HashMap;
use std::time::Duration;

use edgemesh_core::now_millis;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::heartbeat::Heartbeat;
use crate::snapshot::{NetworkSnapshot, NodeSnapshot, Object};

/// Default capacity of the state event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Default window for [`NodeStateCache::is_online`].
pub const DEFAULT_ONLINE_WINDOW: Duration = Duration::from_secs(60);

/// Changes published by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    /// A node's snapshot was replaced by a new heartbeat.
    NodeStateChanged { node: String },
    /// A supervisor reported a new network view.
    NetworkSnapshotUpdated { supervisor: String },
}

/// Node state cache.
pub struct NodeStateCache {
    inner: RwLock<CacheInner>,
    events: broadcast::Sender<StateEvent>,
}

#[derive(Default)]
struct CacheInner {
    /// node → last heartbeat snapshot.
    nodes: HashMap<String, NodeSnapshot>,

    /// node → last witnessed time (Unix ms).
    last_seen: HashMap<String, i64>,

    /// supervisor → last network view.
    networks: HashMap<String, NetworkSnapshot>,
}

impl NodeStateCache {
    /// Create an empty cache with the default event capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create an empty cache with the given event capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: RwLock::new(CacheInner::default()),
            events,
        }
    }

    /// Subscribe to state events.
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.events.subscribe()
    }

    /// Replace the node's snapshot with the given heartbeat.
    ///
    /// Nothing from the previous snapshot survives.
    pub fn node_info_update(&self, heartbeat: Heartbeat) {
        let Heartbeat {
            node,
            node_time,
            data,
        } = heartbeat;

        {
            let mut inner = self.inner.write();
            inner.nodes.insert(
                node.clone(),
                NodeSnapshot {
                    last_update: now_millis(),
                    node_time,
                    data,
                },
            );
        }

        debug!(node = %node, "node state replaced");
        self.emit(StateEvent::NodeStateChanged { node });
    }

    /// Record that a node was witnessed at `timestamp` (Unix ms).
    pub fn mark_node_as_seen(&self, node: &str, timestamp: i64) {
        self.inner
            .write()
            .last_seen
            .insert(node.to_string(), timestamp);
    }

    /// The node's last snapshot.
    pub fn node_info(&self, node: &str) -> Option<NodeSnapshot> {
        self.inner.read().nodes.get(node).cloned()
    }

    /// Config of a pipeline running on a node.
    pub fn running_pipeline_config(&self, node: &str, pipeline: &str) -> Option<Object> {
        let inner = self.inner.read();
        inner
            .nodes
            .get(node)?
            .data
            .pipelines
            .get(pipeline)
            .map(|p| p.config.clone())
    }

    /// Config of a plugin instance, looked up by instance id under any
    /// signature of the pipeline.
    pub fn running_instance_config(
        &self,
        node: &str,
        pipeline: &str,
        instance_id: &str,
    ) -> Option<Object> {
        let inner = self.inner.read();
        let (_, instance) = inner
            .nodes
            .get(node)?
            .data
            .pipelines
            .get(pipeline)?
            .find_instance(instance_id)?;
        Some(instance.config.clone())
    }

    /// Store the network view reported by a supervisor.
    pub fn update_network_snapshot(&self, supervisor: &str, snapshot: NetworkSnapshot) {
        self.inner
            .write()
            .networks
            .insert(supervisor.to_string(), snapshot);

        debug!(supervisor = %supervisor, "network snapshot updated");
        self.emit(StateEvent::NetworkSnapshotUpdated {
            supervisor: supervisor.to_string(),
        });
    }

    /// The last network view reported by a supervisor.
    pub fn network_snapshot(&self, supervisor: &str) -> Option<NetworkSnapshot> {
        self.inner.read().networks.get(supervisor).cloned()
    }

    /// Nodes that have sent a heartbeat, sorted.
    pub fn known_nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self.inner.read().nodes.keys().cloned().collect();
        nodes.sort();
        nodes
    }

    /// Last time the node was seen on any channel (Unix ms).
    pub fn last_seen(&self, node: &str) -> Option<i64> {
        self.inner.read().last_seen.get(node).copied()
    }

    /// Whether the node was seen within `window` of now.
    pub fn is_online(&self, node: &str, window: Duration) -> bool {
        self.last_seen(node)
            .map(|seen| now_millis().saturating_sub(seen) <= window.as_millis() as i64)
            .unwrap_or(false)
    }

    fn emit(&self, event: StateEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl Default for NodeStateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn heartbeat(node: &str, value: serde_json::Value) -> Heartbeat {
        Heartbeat::from_fields(node, value.as_object().unwrap()).unwrap()
    }

    fn camera_heartbeat() -> Heartbeat {
        heartbeat(
            "node-1",
            json!({
                "CURRENT_TIME": "2026-01-14 12:00:00",
                "EE_TIMEZONE": "UTC",
                "CONFIG_STREAMS": [{
                    "NAME": "cam-1",
                    "TYPE": "VideoStream",
                    "PLUGINS": [{
                        "SIGNATURE": "OBJECT_DETECTOR",
                        "INSTANCES": [{"INSTANCE_ID": "det-1", "THRESHOLD": 0.5}]
                    }]
                }],
            }),
        )
    }

    #[test]
    fn test_lookups() {
        let cache = NodeStateCache::new();
        cache.node_info_update(camera_heartbeat());

        let snapshot = cache.node_info("node-1").unwrap();
        assert_eq!(snapshot.node_time.date.as_deref(), Some("2026-01-14 12:00:00"));
        assert!(snapshot.last_update > 0);

        let pipeline = cache.running_pipeline_config("node-1", "cam-1").unwrap();
        assert_eq!(pipeline["TYPE"], json!("VideoStream"));

        let instance = cache
            .running_instance_config("node-1", "cam-1", "det-1")
            .unwrap();
        assert_eq!(instance["THRESHOLD"], json!(0.5));
    }

    #[test]
    fn test_missing_intermediate_keys() {
        let cache = NodeStateCache::new();
        assert!(cache.node_info("node-1").is_none());
        assert!(cache.running_pipeline_config("node-1", "cam-1").is_none());

        cache.node_info_update(camera_heartbeat());
        assert!(cache.running_pipeline_config("node-1", "cam-2").is_none());
        assert!(cache.running_instance_config("node-1", "cam-2", "det-1").is_none());
        assert!(cache.running_instance_config("node-1", "cam-1", "det-2").is_none());
    }

    #[test]
    fn test_heartbeat_replaces_not_merges() {
        let cache = NodeStateCache::new();
        cache.node_info_update(camera_heartbeat());
        cache.node_info_update(heartbeat(
            "node-1",
            json!({"CONFIG_STREAMS": [{"NAME": "cam-2", "PLUGINS": []}]}),
        ));

        assert!(cache.running_pipeline_config("node-1", "cam-1").is_none());
        assert!(cache.running_pipeline_config("node-1", "cam-2").is_some());
        let snapshot = cache.node_info("node-1").unwrap();
        assert_eq!(snapshot.node_time.date, None);
        assert_eq!(snapshot.data.pipelines.len(), 1);
    }

    #[test]
    fn test_seen_and_online() {
        let cache = NodeStateCache::new();
        assert!(!cache.is_online("node-1", DEFAULT_ONLINE_WINDOW));

        cache.mark_node_as_seen("node-1", now_millis());
        assert!(cache.is_online("node-1", DEFAULT_ONLINE_WINDOW));

        cache.mark_node_as_seen("node-1", 1_000);
        assert_eq!(cache.last_seen("node-1"), Some(1_000));
        assert!(!cache.is_online("node-1", DEFAULT_ONLINE_WINDOW));

        // Seen without a heartbeat is not "known"
        assert!(cache.known_nodes().is_empty());
    }

    #[test]
    fn test_known_nodes_sorted() {
        let cache = NodeStateCache::new();
        cache.node_info_update(heartbeat("node-b", json!({})));
        cache.node_info_update(heartbeat("node-a", json!({})));
        assert_eq!(cache.known_nodes(), vec!["node-a", "node-b"]);
    }

    #[test]
    fn test_network_snapshots_per_supervisor() {
        let cache = NodeStateCache::new();
        let snapshot = NetworkSnapshot {
            received_at: 7,
            nodes: [("node-1".to_string(), json!({"working": "ONLINE"}))]
                .into_iter()
                .collect(),
        };
        cache.update_network_snapshot("sup-1", snapshot.clone());

        assert_eq!(cache.network_snapshot("sup-1"), Some(snapshot));
        assert!(cache.network_snapshot("sup-2").is_none());
    }

    #[tokio::test]
    async fn test_events() {
        let cache = NodeStateCache::new();
        let mut events = cache.subscribe();

        cache.node_info_update(camera_heartbeat());
        cache.update_network_snapshot(
            "sup-1",
            NetworkSnapshot {
                received_at: 0,
                nodes: Default::default(),
            },
        );

        assert_eq!(
            events.recv().await.unwrap(),
            StateEvent::NodeStateChanged {
                node: "node-1".into()
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            StateEvent::NetworkSnapshotUpdated {
                supervisor: "sup-1".into()
            }
        );
    }
}
