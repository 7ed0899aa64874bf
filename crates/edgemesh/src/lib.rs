//! # edgemesh
//!
//! A control-plane client for a fleet of edge nodes: signed commands out,
//! heartbeats, notifications and payloads in.
//!
//! ## Overview
//!
//! - **Identity**: secp256k1 keys; every outbound command is signed
//! - **Commands**: each command is tracked until the notifications it
//!   expects arrive, or a timer fails it
//! - **Fleet state**: the last heartbeat of every node, and supervisor
//!   network views
//! - **Payloads**: delivered to subscribers by plugin signature
//!
//! ## Usage
//!
//! ```rust,no_run
//! use edgemesh::{Client, ClientConfig, ConnectOptions, Identity, MemoryBroker};
//! use serde_json::json;
//!
//! async fn example() -> edgemesh::Result<()> {
//!     let identity = Identity::load_or_create("client.pem")?;
//!     let broker = MemoryBroker::new();
//!     let transport = broker
//!         .connect(&ConnectOptions {
//!             client_id: "controller".into(),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     let client = Client::new(identity, transport, ClientConfig::default())?;
//!     let _routing = client.start().await?;
//!
//!     let outcome = client
//!         .update_pipeline_config("node-1", json!({"NAME": "cam-1", "TYPE": "VideoStream"}))
//!         .await?;
//!     println!("acknowledged by {} notification(s)", outcome.notifications.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `edgemesh::core` - Identity, signing, canonical hashing
//! - `edgemesh::state` - Node state cache
//! - `edgemesh::net` - Transport, routing and correlation

pub mod client;
pub mod config;
pub mod error;

// Re-export component crates
pub use edgemesh_core as core;
pub use edgemesh_net as net;
pub use edgemesh_state as state;

// Re-export main types for convenience
pub use client::{Client, InstanceUpdate, PendingCommand};
pub use config::ClientConfig;
pub use error::{ClientError, Result};

// Re-export commonly used component types
pub use edgemesh_core::{Address, Identity, IdentitySlot, PathTuple, SignedEnvelope};
pub use edgemesh_net::{
    Action, ClientEvent, CommandOutcome, ConnectOptions, EdgeMessage, Fleet, MemoryBroker,
    MemoryTransport, NetError, SignaturePolicy, Transport,
};
pub use edgemesh_state::{NetworkSnapshot, NodeSnapshot, NodeStateCache};
