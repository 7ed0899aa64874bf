//! Wire messages exchanged with edge nodes.
//!
//! Inbound frames are UTF-8 JSON objects. After formatting they become an
//! [`EdgeMessage`]. Outbound commands are built with [`CommandEnvelope`] and
//! signed before publishing.

use std::fmt;
use std::str::FromStr;

use edgemesh_core::{PathTuple, PAYLOAD_PATH_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{NetError, Result};

/// Wire field names.
pub mod fields {
    pub const EVENT_TYPE: &str = "EE_EVENT_TYPE";
    pub const FORMATTER: &str = "EE_FORMATTER";
    pub const PAYLOAD_PATH: &str = super::PAYLOAD_PATH_FIELD;
    pub const NODE_ID: &str = "EE_ID";
    pub const SENDER: &str = "EE_SENDER";
    pub const SESSION_ID: &str = "SESSION_ID";
    pub const INITIATOR_ID: &str = "INITIATOR_ID";
    pub const TIMESTAMP: &str = "EE_TIMESTAMP";
    pub const TIME: &str = "TIME";
    pub const ACTION: &str = "ACTION";
    pub const PAYLOAD: &str = "PAYLOAD";
    pub const NOTIFICATION_TYPE: &str = "NOTIFICATION_TYPE";
    pub const NOTIFICATION_CODE: &str = "NOTIFICATION_CODE";
    pub const NOTIFICATION: &str = "NOTIFICATION";
    pub const INSTANCE_ID: &str = "INSTANCE_ID";
    pub const SIGNATURE: &str = "SIGNATURE";
    pub const NAME: &str = "NAME";
}

/// Notification type marking a failed command.
pub const NOTIFICATION_EXCEPTION: &str = "EXCEPTION";

/// Topic layout under a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    namespace: String,
}

impl Topics {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Heartbeats.
    pub fn ctrl(&self) -> String {
        format!("{}/ctrl", self.namespace)
    }

    /// Notifications.
    pub fn notifications(&self) -> String {
        format!("{}/notif", self.namespace)
    }

    /// Data payloads.
    pub fn payloads(&self) -> String {
        format!("{}/payloads", self.namespace)
    }

    /// Commands addressed to one node.
    pub fn node_config(&self, node: &str) -> String {
        format!("{}/{}/config", self.namespace, node)
    }

    /// All inbound topics.
    pub fn inbound(&self) -> [String; 3] {
        [self.ctrl(), self.notifications(), self.payloads()]
    }
}

/// The kind of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Heartbeat,
    Notification,
    Payload,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heartbeat => "HEARTBEAT",
            Self::Notification => "NOTIFICATION",
            Self::Payload => "PAYLOAD",
        }
    }
}

impl FromStr for EventType {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "HEARTBEAT" => Ok(Self::Heartbeat),
            "NOTIFICATION" => Ok(Self::Notification),
            "PAYLOAD" => Ok(Self::Payload),
            other => Err(NetError::Parse(format!("unknown event type: {}", other))),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeMessage {
    pub event_type: EventType,
    pub path: PathTuple,
    pub sender: Option<String>,
    pub session_id: Option<String>,
    pub initiator_id: Option<String>,
    /// Remote timestamp, as sent.
    pub timestamp: Option<String>,
    /// Every other field.
    pub data: Map<String, Value>,
}

/// Envelope fields lifted out of [`EdgeMessage::data`].
const ENVELOPE_FIELDS: &[&str] = &[
    fields::EVENT_TYPE,
    fields::FORMATTER,
    fields::PAYLOAD_PATH,
    fields::SENDER,
    fields::SESSION_ID,
    fields::INITIATOR_ID,
    fields::TIMESTAMP,
    edgemesh_core::envelope::HASH_FIELD,
    edgemesh_core::envelope::SIGN_FIELD,
];

impl EdgeMessage {
    /// Decode a formatted message object.
    pub fn from_object(mut object: Map<String, Value>) -> Result<Self> {
        let event_type = object
            .get(fields::EVENT_TYPE)
            .and_then(Value::as_str)
            .ok_or_else(|| NetError::Parse(format!("missing {}", fields::EVENT_TYPE)))?
            .parse()?;
        let path = object
            .get(fields::PAYLOAD_PATH)
            .map(PathTuple::from_value)
            .transpose()?
            .ok_or_else(|| NetError::Parse(format!("missing {}", fields::PAYLOAD_PATH)))?;

        let take_str = |object: &Map<String, Value>, key: &str| {
            object.get(key).and_then(Value::as_str).map(String::from)
        };
        let sender = take_str(&object, fields::SENDER);
        let session_id = take_str(&object, fields::SESSION_ID);
        let initiator_id = take_str(&object, fields::INITIATOR_ID);
        let timestamp = take_str(&object, fields::TIMESTAMP);

        for key in ENVELOPE_FIELDS {
            object.remove(*key);
        }

        Ok(Self {
            event_type,
            path,
            sender,
            session_id,
            initiator_id,
            timestamp,
            data: object,
        })
    }

    /// Rebuild the object form, path and envelope fields included.
    pub fn to_object(&self) -> Map<String, Value> {
        let mut object = self.data.clone();
        object.insert(
            fields::EVENT_TYPE.into(),
            Value::String(self.event_type.as_str().into()),
        );
        object.insert(fields::PAYLOAD_PATH.into(), self.path.to_value());
        let optional = [
            (fields::SENDER, &self.sender),
            (fields::SESSION_ID, &self.session_id),
            (fields::INITIATOR_ID, &self.initiator_id),
            (fields::TIMESTAMP, &self.timestamp),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                object.insert(key.into(), Value::String(value.clone()));
            }
        }
        object
    }

    pub fn node(&self) -> &str {
        &self.path.node
    }

    /// `NOTIFICATION_TYPE`, if present.
    pub fn notification_type(&self) -> Option<&str> {
        self.data.get(fields::NOTIFICATION_TYPE).and_then(Value::as_str)
    }

    pub fn is_exception(&self) -> bool {
        self.notification_type() == Some(NOTIFICATION_EXCEPTION)
    }

    /// `(code, message)` of a notification.
    pub fn notification_details(&self) -> (String, String) {
        let code = match self.data.get(fields::NOTIFICATION_CODE) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let message = self
            .data
            .get(fields::NOTIFICATION)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        (code, message)
    }
}

/// Command actions understood by edge nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    UpdateConfig,
    DeleteConfig,
    ArchiveConfig,
    UpdatePipelineInstance,
    BatchUpdatePipelineInstance,
    Restart,
    Stop,
    FullHeartbeat,
    TimersOnlyHeartbeat,
    Custom(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Self::UpdateConfig => "UPDATE_CONFIG",
            Self::DeleteConfig => "DELETE_CONFIG",
            Self::ArchiveConfig => "ARCHIVE_CONFIG",
            Self::UpdatePipelineInstance => "UPDATE_PIPELINE_INSTANCE",
            Self::BatchUpdatePipelineInstance => "BATCH_UPDATE_PIPELINE_INSTANCE",
            Self::Restart => "RESTART",
            Self::Stop => "STOP",
            Self::FullHeartbeat => "FULL_HEARTBEAT",
            Self::TimersOnlyHeartbeat => "TIMERS_ONLY_HEARTBEAT",
            Self::Custom(action) => action,
        }
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        match s {
            "UPDATE_CONFIG" => Self::UpdateConfig,
            "DELETE_CONFIG" => Self::DeleteConfig,
            "ARCHIVE_CONFIG" => Self::ArchiveConfig,
            "UPDATE_PIPELINE_INSTANCE" => Self::UpdatePipelineInstance,
            "BATCH_UPDATE_PIPELINE_INSTANCE" => Self::BatchUpdatePipelineInstance,
            "RESTART" => Self::Restart,
            "STOP" => Self::Stop,
            "FULL_HEARTBEAT" => Self::FullHeartbeat,
            "TIMERS_ONLY_HEARTBEAT" => Self::TimersOnlyHeartbeat,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unsigned outbound command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEnvelope {
    pub initiator_id: String,
    pub node: String,
    pub session_id: String,
    pub action: Action,
    pub payload: Value,
    /// Local time, `%Y-%m-%d %H:%M:%S%.6f`.
    pub time: String,
}

impl CommandEnvelope {
    /// Build a command with a fresh session id and the current local time.
    pub fn new(
        initiator_id: impl Into<String>,
        node: impl Into<String>,
        action: Action,
        payload: Value,
    ) -> Self {
        Self {
            initiator_id: initiator_id.into(),
            node: node.into(),
            session_id: new_session_id(),
            action,
            payload,
            time: chrono::Local::now()
                .format("%Y-%m-%d %H:%M:%S%.6f")
                .to_string(),
        }
    }

    /// The JSON object to sign.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert(fields::INITIATOR_ID.into(), Value::String(self.initiator_id.clone()));
        object.insert(fields::NODE_ID.into(), Value::String(self.node.clone()));
        object.insert(fields::TIME.into(), Value::String(self.time.clone()));
        object.insert(fields::SESSION_ID.into(), Value::String(self.session_id.clone()));
        object.insert(fields::ACTION.into(), Value::String(self.action.as_str().into()));
        object.insert(fields::PAYLOAD.into(), self.payload.clone());
        Value::Object(object)
    }
}

/// A fresh session id.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_topics() {
        let topics = Topics::new("lummetry");
        assert_eq!(topics.ctrl(), "lummetry/ctrl");
        assert_eq!(topics.notifications(), "lummetry/notif");
        assert_eq!(topics.payloads(), "lummetry/payloads");
        assert_eq!(topics.node_config("node-1"), "lummetry/node-1/config");
    }

    #[test]
    fn test_edge_message_from_object() {
        let message = EdgeMessage::from_object(object(json!({
            "EE_EVENT_TYPE": "NOTIFICATION",
            "EE_PAYLOAD_PATH": ["node-1", "cam-1", "DETECTOR", "det-1"],
            "EE_SENDER": "0xai_abc",
            "SESSION_ID": "s-1",
            "EE_SIGN": "sig",
            "NOTIFICATION_TYPE": "EXCEPTION",
            "NOTIFICATION_CODE": 12,
            "NOTIFICATION": "bad config",
        })))
        .unwrap();

        assert_eq!(message.event_type, EventType::Notification);
        assert_eq!(message.node(), "node-1");
        assert_eq!(message.path.instance.as_deref(), Some("det-1"));
        assert_eq!(message.sender.as_deref(), Some("0xai_abc"));
        assert_eq!(message.session_id.as_deref(), Some("s-1"));
        assert!(message.is_exception());
        assert_eq!(
            message.notification_details(),
            ("12".to_string(), "bad config".to_string())
        );
        assert!(!message.data.contains_key("EE_SIGN"));
        assert!(!message.data.contains_key("EE_PAYLOAD_PATH"));

        let rebuilt = EdgeMessage::from_object(message.to_object()).unwrap();
        assert_eq!(rebuilt, message);
    }

    #[test]
    fn test_edge_message_requires_type_and_path() {
        assert!(EdgeMessage::from_object(object(json!({
            "EE_PAYLOAD_PATH": ["node-1", null, null, null]
        })))
        .is_err());
        assert!(EdgeMessage::from_object(object(json!({
            "EE_EVENT_TYPE": "PAYLOAD"
        })))
        .is_err());
        assert!(EdgeMessage::from_object(object(json!({
            "EE_EVENT_TYPE": "SOMETHING",
            "EE_PAYLOAD_PATH": ["node-1", null, null, null]
        })))
        .is_err());
    }

    #[test]
    fn test_action_names() {
        assert_eq!(Action::from("UPDATE_CONFIG"), Action::UpdateConfig);
        assert_eq!(
            Action::from("BATCH_UPDATE_PIPELINE_INSTANCE").as_str(),
            "BATCH_UPDATE_PIPELINE_INSTANCE"
        );
        assert_eq!(
            Action::from("RELOAD_PLUGINS"),
            Action::Custom("RELOAD_PLUGINS".into())
        );
    }

    #[test]
    fn test_command_envelope_fields() {
        let command = CommandEnvelope::new(
            "controller",
            "node-1",
            Action::Restart,
            json!({}),
        );
        let value = command.to_value();
        assert_eq!(value["INITIATOR_ID"], json!("controller"));
        assert_eq!(value["EE_ID"], json!("node-1"));
        assert_eq!(value["ACTION"], json!("RESTART"));
        assert_eq!(value["SESSION_ID"], json!(command.session_id));
        assert!(value["TIME"].as_str().unwrap().len() >= 19);

        let other = CommandEnvelope::new("controller", "node-1", Action::Restart, json!({}));
        assert_ne!(command.session_id, other.session_id);
    }
}
