//! # edgemesh testkit
//!
//! Testing utilities for edgemesh.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Keys, hashes and signatures fixed by OpenSSL
//! - **Generators**: Proptest strategies for identities, JSON and paths
//! - **Fixtures**: Wire-shaped message builders and a simulated edge node
//!
//! ## Golden Vectors
//!
//! ```rust
//! use edgemesh_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, actual) in verify_all_vectors() {
//!     assert!(matches, "{}: {}", name, actual);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use edgemesh_testkit::generators::{identity, json_object};
//!
//! proptest! {
//!     #[test]
//!     fn signed_messages_verify(identity in identity(), message in json_object()) {
//!         let envelope = identity.sign(&message.into()).unwrap();
//!         prop_assert!(envelope.verify());
//!     }
//! }
//! ```
//!
//! ## Simulated Nodes
//!
//! ```rust,no_run
//! use edgemesh_core::PathTuple;
//! use edgemesh_net::MemoryBroker;
//! use edgemesh_testkit::SimulatedNode;
//! use std::time::Duration;
//!
//! async fn example() {
//!     let broker = MemoryBroker::new();
//!     let node = SimulatedNode::connect(&broker, "edgemesh", "node-1").await.unwrap();
//!     if let Some(command) = node.next_command(Duration::from_secs(1)).await {
//!         let session = command["SESSION_ID"].as_str();
//!         node.notify(&PathTuple::pipeline("node-1", "cam-1"), session).await.unwrap();
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{exception, frame, heartbeat, notification, payload, SimulatedNode};
pub use generators::{identity, json_object, json_value, path_tuple, WatchParams};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
