//! Test fixtures and helpers.
//!
//! Message builders in the edge wire shape, and a simulated edge node that
//! talks to a client through a [`MemoryBroker`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use edgemesh_core::{verify_value, Identity, PathTuple};
use edgemesh_net::{
    fields, ConnectOptions, EventType, Frame, MemoryBroker, MemoryTransport, Result, Topics,
    Transport,
};
use serde_json::{json, Map, Value};

/// A heartbeat for `node` running the given pipelines.
///
/// Each pipeline is `(name, [(signature, instance_id)])`.
pub fn heartbeat(node: &str, pipelines: &[(&str, &[(&str, &str)])]) -> Value {
    let streams: Vec<Value> = pipelines
        .iter()
        .map(|(name, instances)| {
            let plugins: Vec<Value> = instances
                .iter()
                .map(|(signature, instance_id)| {
                    json!({
                        "SIGNATURE": signature,
                        "INSTANCES": [{"INSTANCE_ID": instance_id}],
                    })
                })
                .collect();
            json!({"NAME": name, "TYPE": "VideoStream", "PLUGINS": plugins})
        })
        .collect();

    json!({
        fields::EVENT_TYPE: EventType::Heartbeat.as_str(),
        fields::PAYLOAD_PATH: PathTuple::node(node).to_value(),
        "CONFIG_STREAMS": streams,
        "CURRENT_TIME": "2026-01-14 12:00:00.000000",
        "EE_TIMEZONE": "UTC",
    })
}

/// A notification under `path`, optionally naming a session.
pub fn notification(path: &PathTuple, session_id: Option<&str>, kind: &str) -> Value {
    let mut message = json!({
        fields::EVENT_TYPE: EventType::Notification.as_str(),
        fields::PAYLOAD_PATH: path.to_value(),
        fields::NOTIFICATION_TYPE: kind,
        fields::NOTIFICATION: format!("{} on {}", kind, path),
    });
    if let Some(session_id) = session_id {
        message[fields::SESSION_ID] = Value::String(session_id.to_string());
    }
    message
}

/// An exception notification under `path`.
pub fn exception(path: &PathTuple, session_id: Option<&str>, code: &str, text: &str) -> Value {
    let mut message = notification(path, session_id, "EXCEPTION");
    message[fields::NOTIFICATION_CODE] = Value::String(code.to_string());
    message[fields::NOTIFICATION] = Value::String(text.to_string());
    message
}

/// A data payload under `path`.
pub fn payload(path: &PathTuple, data: Value) -> Value {
    let mut message = match data {
        Value::Object(object) => object,
        other => {
            let mut object = Map::new();
            object.insert("DATA".into(), other);
            object
        }
    };
    message.insert(
        fields::EVENT_TYPE.into(),
        Value::String(EventType::Payload.as_str().into()),
    );
    message.insert(fields::PAYLOAD_PATH.into(), path.to_value());
    Value::Object(message)
}

/// A frame carrying `message` as JSON.
pub fn frame(topic: &str, message: &Value) -> Frame {
    Frame::new(topic, message.to_string())
}

/// An edge node connected to a memory broker.
///
/// It receives commands on its config topic and publishes signed heartbeats,
/// notifications and payloads.
pub struct SimulatedNode {
    pub id: String,
    pub identity: Identity,
    topics: Topics,
    transport: MemoryTransport,
}

impl SimulatedNode {
    /// Connect and subscribe to the node's config topic.
    pub async fn connect(broker: &Arc<MemoryBroker>, namespace: &str, id: &str) -> Result<Self> {
        let topics = Topics::new(namespace);
        let transport = broker
            .connect(&ConnectOptions {
                client_id: format!("sim-{}", id),
                ..Default::default()
            })
            .await?;
        transport.subscribe(&topics.node_config(id)).await?;
        Ok(Self {
            id: id.to_string(),
            identity: Identity::generate(),
            topics,
            transport,
        })
    }

    /// Wait for the next command, returning it only if its signature holds.
    pub async fn next_command(&self, timeout: Duration) -> Option<Value> {
        let frame = self.transport.recv_timeout(timeout).await.ok()??;
        let command: Value = serde_json::from_slice(&frame.payload).ok()?;
        verify_value(&command).then_some(command)
    }

    /// Publish a signed message on a topic.
    pub async fn publish(&self, topic: &str, message: &Value) -> Result<()> {
        let envelope = self.identity.sign(message)?;
        self.transport
            .publish(topic, Bytes::from(envelope.to_json()))
            .await
    }

    pub async fn send_heartbeat(&self, pipelines: &[(&str, &[(&str, &str)])]) -> Result<()> {
        self.publish(&self.topics.ctrl(), &heartbeat(&self.id, pipelines))
            .await
    }

    pub async fn notify(&self, path: &PathTuple, session_id: Option<&str>) -> Result<()> {
        self.publish(
            &self.topics.notifications(),
            &notification(path, session_id, "NORMAL"),
        )
        .await
    }

    pub async fn reject(
        &self,
        path: &PathTuple,
        session_id: Option<&str>,
        text: &str,
    ) -> Result<()> {
        self.publish(
            &self.topics.notifications(),
            &exception(path, session_id, "CMD_FAILED", text),
        )
        .await
    }

    pub async fn send_payload(&self, path: &PathTuple, data: Value) -> Result<()> {
        self.publish(&self.topics.payloads(), &payload(path, data))
            .await
    }
}
