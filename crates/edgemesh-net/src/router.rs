//! Inbound message routing.
//!
//! Every frame goes through the same ordered stages and stops at the first
//! one that fails:
//!
//! 1. bytes → UTF-8 text
//! 2. signature policy
//! 3. text → JSON object
//! 4. `EE_PAYLOAD_PATH` present
//! 5. fleet membership; the node is marked as seen
//! 6. formatter lookup (`EE_FORMATTER`, default `raw`)
//! 7. decode and dispatch on `EE_EVENT_TYPE`
//!
//! A failed stage drops the frame. The [`DropReason`] is returned so callers
//! can see why.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use edgemesh_core::{has_signature, now_millis, verify, PathTuple};
use edgemesh_state::{
    network_snapshot_from_fields, Heartbeat, NodeStateCache, CURRENT_NETWORK,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::correlation::RequestRegistry;
use crate::error::NetError;
use crate::events::{ClientEvent, EventHub};
use crate::formatter::FormatterRegistry;
use crate::messages::{fields, EdgeMessage, EventType};
use crate::transport::Frame;

/// Pipeline of the supervisor's network monitor.
pub const ADMIN_PIPELINE: &str = "admin_pipeline";

/// Plugin signature of the supervisor's network monitor.
pub const NET_MON_SIGNATURE: &str = "NET_MON_01";

/// What to require of inbound signatures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignaturePolicy {
    /// Accept frames without looking at signatures.
    #[default]
    Skip,
    /// Require the signing fields but do not check them.
    RequirePresence,
    /// Require a valid signature.
    Verify,
}

/// The set of nodes the client accepts traffic from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Fleet {
    /// Every node.
    #[default]
    Any,
    /// Only these node ids or addresses.
    Only(BTreeSet<String>),
}

impl Fleet {
    pub fn only<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(members.into_iter().map(Into::into).collect())
    }

    /// Whether a node, identified by id or by sender address, is a member.
    pub fn allows(&self, node: &str, sender: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Only(members) => {
                members.contains(node) || sender.map_or(false, |s| members.contains(s))
            }
        }
    }

    /// Fail with `FleetMembership` for non-members.
    pub fn check(&self, node: &str) -> Result<(), NetError> {
        if self.allows(node, None) {
            Ok(())
        } else {
            Err(NetError::FleetMembership(node.to_string()))
        }
    }
}

/// Why a frame was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    InvalidUtf8,
    MissingSignature,
    InvalidSignature,
    InvalidJson(String),
    MissingPath,
    NotInFleet(String),
    UnknownFormat(String),
    Decode(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUtf8 => f.write_str("frame is not UTF-8"),
            Self::MissingSignature => f.write_str("frame is not signed"),
            Self::InvalidSignature => f.write_str("invalid signature"),
            Self::InvalidJson(e) => write!(f, "invalid JSON: {}", e),
            Self::MissingPath => write!(f, "missing {}", fields::PAYLOAD_PATH),
            Self::NotInFleet(node) => write!(f, "node not in fleet: {}", node),
            Self::UnknownFormat(name) => write!(f, "unknown formatter: {}", name),
            Self::Decode(e) => write!(f, "decode failed: {}", e),
        }
    }
}

impl From<DropReason> for NetError {
    fn from(reason: DropReason) -> Self {
        match reason {
            DropReason::NotInFleet(node) => NetError::FleetMembership(node),
            DropReason::UnknownFormat(name) => NetError::UnknownFormat(name),
            other => NetError::Parse(other.to_string()),
        }
    }
}

/// What happened to a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The node's snapshot was replaced.
    Heartbeat { node: String },
    /// Offered to the open requests; `completed` reached a terminal state.
    Notification { node: String, completed: usize },
    /// Delivered to `delivered` payload mailboxes.
    Payload { node: String, delivered: usize },
    Dropped(DropReason),
}

impl RouteOutcome {
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped(_))
    }
}

/// Routes inbound frames to the cache, the request registry and the hub.
pub struct MessageRouter {
    cache: Arc<NodeStateCache>,
    requests: RequestRegistry,
    formatters: Arc<FormatterRegistry>,
    events: Arc<EventHub>,
    fleet: Fleet,
    policy: SignaturePolicy,
}

impl MessageRouter {
    pub fn new(
        cache: Arc<NodeStateCache>,
        requests: RequestRegistry,
        formatters: Arc<FormatterRegistry>,
        events: Arc<EventHub>,
    ) -> Self {
        Self {
            cache,
            requests,
            formatters,
            events,
            fleet: Fleet::Any,
            policy: SignaturePolicy::Skip,
        }
    }

    pub fn with_fleet(mut self, fleet: Fleet) -> Self {
        self.fleet = fleet;
        self
    }

    pub fn with_signature_policy(mut self, policy: SignaturePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Route one frame.
    pub fn route(&self, frame: &Frame) -> RouteOutcome {
        match self.try_route(frame) {
            Ok(outcome) => outcome,
            Err(reason) => {
                match &reason {
                    DropReason::UnknownFormat(_) | DropReason::InvalidSignature => {
                        warn!(topic = %frame.topic, reason = %reason, "frame dropped")
                    }
                    _ => debug!(topic = %frame.topic, reason = %reason, "frame dropped"),
                }
                RouteOutcome::Dropped(reason)
            }
        }
    }

    fn try_route(&self, frame: &Frame) -> Result<RouteOutcome, DropReason> {
        let text = std::str::from_utf8(&frame.payload).map_err(|_| DropReason::InvalidUtf8)?;

        self.check_signature(text)?;

        let object = match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(object)) => object,
            Ok(_) => return Err(DropReason::InvalidJson("not an object".into())),
            Err(e) => return Err(DropReason::InvalidJson(e.to_string())),
        };

        let path = object
            .get(fields::PAYLOAD_PATH)
            .and_then(|p| PathTuple::from_value(p).ok())
            .ok_or(DropReason::MissingPath)?;

        let sender = object.get(fields::SENDER).and_then(Value::as_str);
        if !self.fleet.allows(&path.node, sender) {
            return Err(DropReason::NotInFleet(path.node));
        }
        self.cache.mark_node_as_seen(&path.node, now_millis());

        let formatter_name = object.get(fields::FORMATTER).and_then(Value::as_str);
        let formatter = self.formatters.resolve(formatter_name).map_err(|_| {
            DropReason::UnknownFormat(formatter_name.unwrap_or_default().to_string())
        })?;

        let decoded = formatter
            .decode(object)
            .map_err(|e| DropReason::Decode(e.to_string()))?;
        let message =
            EdgeMessage::from_object(decoded).map_err(|e| DropReason::Decode(e.to_string()))?;

        Ok(self.dispatch(message))
    }

    fn check_signature(&self, text: &str) -> Result<(), DropReason> {
        match self.policy {
            SignaturePolicy::Skip => Ok(()),
            SignaturePolicy::RequirePresence => {
                let signed = serde_json::from_str::<Value>(text)
                    .map(|v| has_signature(&v))
                    .unwrap_or(false);
                if signed {
                    Ok(())
                } else {
                    Err(DropReason::MissingSignature)
                }
            }
            SignaturePolicy::Verify => {
                if verify(text) {
                    Ok(())
                } else {
                    Err(DropReason::InvalidSignature)
                }
            }
        }
    }

    fn dispatch(&self, message: EdgeMessage) -> RouteOutcome {
        if is_admin_path(&message.path) {
            self.handle_admin(&message);
        }

        let node = message.node().to_string();
        match message.event_type {
            EventType::Heartbeat => match Heartbeat::from_fields(node.clone(), &message.data) {
                Ok(heartbeat) => {
                    self.cache.node_info_update(heartbeat);
                    self.events.emit(ClientEvent::Heartbeat { node: node.clone() });
                    RouteOutcome::Heartbeat { node }
                }
                Err(e) => RouteOutcome::Dropped(DropReason::Decode(e.to_string())),
            },
            EventType::Notification => {
                let completed = self.requests.process(&message);
                self.events.emit(ClientEvent::Notification(message));
                RouteOutcome::Notification { node, completed }
            }
            EventType::Payload => {
                let delivered = self.events.deliver_payload(message);
                RouteOutcome::Payload { node, delivered }
            }
        }
    }

    fn handle_admin(&self, message: &EdgeMessage) {
        let supervisor = message.node().to_string();
        if message.data.contains_key(CURRENT_NETWORK) {
            match network_snapshot_from_fields(&message.data, now_millis()) {
                Ok(snapshot) => self.cache.update_network_snapshot(&supervisor, snapshot),
                Err(e) => debug!(supervisor = %supervisor, error = %e, "bad network snapshot"),
            }
        }
        self.events.emit(ClientEvent::NetworkTopology {
            supervisor,
            message: message.clone(),
        });
    }
}

/// Whether the path is the reserved `(node, admin_pipeline, NET_MON_01, *)`.
pub fn is_admin_path(path: &PathTuple) -> bool {
    path.pipeline.as_deref() == Some(ADMIN_PIPELINE)
        && path.signature.as_deref() == Some(NET_MON_SIGNATURE)
}
