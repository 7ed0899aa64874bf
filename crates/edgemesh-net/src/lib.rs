//! # edgemesh net
//!
//! Everything between the broker and the client: the transport boundary,
//! wire messages, the inbound routing pipeline and command correlation.
//!
//! ## Overview
//!
//! Edge nodes publish heartbeats, notifications and payloads on namespaced
//! topics. The [`MessageRouter`] turns each inbound [`Frame`] into an
//! [`EdgeMessage`] and hands it to the node state cache, the
//! [`RequestRegistry`] or the [`EventHub`]. Outbound commands are tracked as
//! [`TrackedRequest`]s until the expected notifications arrive or a timer
//! fires.
//!
//! ## Message Flow
//!
//! ```text
//! Client                      Broker                      Edge node
//!   |-- <ns>/<node>/config ---->|-------------------------->|
//!   |                           |<------- <ns>/notif -------|
//!   |<-------- NOTIFICATION ----|                           |
//!   |                           |<------- <ns>/ctrl --------|
//!   |<-------- HEARTBEAT -------|                           |
//! ```
//!
//! ## Key Properties
//!
//! - **One outcome per command**: callbacks run at most once
//! - **Ordered ingestion**: frames are routed in arrival order
//! - **Typed drops**: every discarded frame carries a [`DropReason`]

pub mod correlation;
pub mod error;
pub mod events;
pub mod formatter;
pub mod messages;
pub mod router;
pub mod transport;

pub use correlation::{
    CommandOutcome, Completion, FailureCallback, Progress, RequestRegistry, RequestState,
    RequestSummary, SuccessCallback, TimeoutKind, TrackedRequest, Watch,
};
pub use error::{NetError, Result};
pub use events::{ClientEvent, EventHub};
pub use formatter::{Formatter, FormatterRegistry, RawFormatter, RAW_FORMATTER};
pub use messages::{
    fields, new_session_id, Action, CommandEnvelope, EdgeMessage, EventType, Topics,
};
pub use router::{
    is_admin_path, DropReason, Fleet, MessageRouter, RouteOutcome, SignaturePolicy,
    ADMIN_PIPELINE, NET_MON_SIGNATURE,
};
pub use transport::{
    memory::MemoryBroker, memory::MemoryTransport, topic_matches, ConnectOptions, Frame,
    Transport,
};
