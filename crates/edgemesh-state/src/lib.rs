//! # edgemesh state
//!
//! The client's view of the fleet: the last heartbeat of every edge node,
//! when each node was last seen, and the network views reported by
//! supervisor nodes.
//!
//! ## Key Types
//!
//! - [`NodeStateCache`] - Thread-safe cache with a broadcast of [`StateEvent`]s
//! - [`Heartbeat`] - A heartbeat message decoded into a pipeline tree
//! - [`NodeSnapshot`] - What the cache stores per node
//! - [`NetworkSnapshot`] - A supervisor's view of the fleet
//!
//! ## Usage
//!
//! ```rust
//! use edgemesh_state::{Heartbeat, NodeStateCache};
//! use serde_json::json;
//!
//! let cache = NodeStateCache::new();
//! let heartbeat = Heartbeat::from_value(&json!({
//!     "EE_PAYLOAD_PATH": ["node-1", null, null, null],
//!     "CONFIG_STREAMS": [{"NAME": "cam-1", "PLUGINS": []}],
//! }))
//! .unwrap();
//!
//! cache.node_info_update(heartbeat);
//! assert!(cache.running_pipeline_config("node-1", "cam-1").is_some());
//! ```
//!
//! ## Design Notes
//!
//! - **Replace, never merge**: each heartbeat fully replaces the node's snapshot
//! - **Seen is not known**: any message marks a node as seen; only heartbeats
//!   create a snapshot

pub mod cache;
pub mod error;
pub mod heartbeat;
pub mod snapshot;

pub use cache::{NodeStateCache, StateEvent, DEFAULT_ONLINE_WINDOW};
pub use error::{Result, StateError};
pub use heartbeat::{network_snapshot_from_fields, Heartbeat, CURRENT_NETWORK};
pub use snapshot::{
    InstanceState, NetworkSnapshot, NodeData, NodeSnapshot, NodeTime, Object, PipelineState,
};
