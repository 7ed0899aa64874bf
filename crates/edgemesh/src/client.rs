//! The Client: signed commands out, routed traffic in.
//!
//! The Client owns the identity, the node state cache, the request registry
//! and the event hub, and runs the routing loop over a [`Transport`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use edgemesh_core::{Address, IdentitySlot, PathTuple};
use edgemesh_net::{
    Action, ClientEvent, CommandEnvelope, CommandOutcome, EdgeMessage, EventHub, Fleet, Frame,
    FormatterRegistry, MessageRouter, NetError, RequestRegistry, RouteOutcome, Topics,
    TrackedRequest, Transport,
};
use edgemesh_state::NodeStateCache;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

type OutcomeSender = oneshot::Sender<std::result::Result<CommandOutcome, NetError>>;

/// A published command awaiting its outcome.
#[derive(Debug)]
pub struct PendingCommand {
    session_id: String,
    receiver: oneshot::Receiver<std::result::Result<CommandOutcome, NetError>>,
}

impl PendingCommand {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Wait for the command's single outcome.
    pub async fn outcome(self) -> Result<CommandOutcome> {
        match self.receiver.await {
            Ok(outcome) => Ok(outcome?),
            Err(_) => Err(ClientError::Cancelled(self.session_id)),
        }
    }
}

/// One instance change inside a batch update.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceUpdate {
    pub pipeline: String,
    pub signature: String,
    pub instance_id: String,
    pub config: Value,
}

impl InstanceUpdate {
    fn path(&self, node: &str) -> PathTuple {
        PathTuple::instance(node, &self.pipeline, &self.signature, &self.instance_id)
    }

    fn to_value(&self) -> Value {
        json!({
            "NAME": self.pipeline,
            "SIGNATURE": self.signature,
            "INSTANCE_ID": self.instance_id,
            "INSTANCE_CONFIG": self.config,
        })
    }
}

/// Control-plane client.
pub struct Client<T: Transport> {
    identity: IdentitySlot,
    transport: Arc<T>,
    config: ClientConfig,
    topics: Topics,
    fleet: Fleet,
    cache: Arc<NodeStateCache>,
    requests: RequestRegistry,
    formatters: Arc<FormatterRegistry>,
    events: Arc<EventHub>,
    router: Arc<MessageRouter>,
    started: AtomicBool,
}

impl<T: Transport + 'static> Client<T> {
    /// Create a client. Nothing is subscribed until [`Client::start`].
    pub fn new(
        identity: impl Into<IdentitySlot>,
        transport: T,
        config: ClientConfig,
    ) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(NodeStateCache::with_capacity(config.channel_capacity));
        let requests = RequestRegistry::new(Arc::clone(&cache));
        let formatters = Arc::new(FormatterRegistry::new());
        let events = Arc::new(EventHub::with_capacity(config.channel_capacity));
        let fleet = config.fleet();
        let router = MessageRouter::new(
            Arc::clone(&cache),
            requests.clone(),
            Arc::clone(&formatters),
            Arc::clone(&events),
        )
        .with_fleet(fleet.clone())
        .with_signature_policy(config.signature_policy);

        Ok(Self {
            identity: identity.into(),
            transport: Arc::new(transport),
            topics: Topics::new(&config.namespace),
            config,
            fleet,
            cache,
            requests,
            formatters,
            events,
            router: Arc::new(router),
            started: AtomicBool::new(false),
        })
    }

    /// Subscribe to the inbound topics and spawn the routing loop.
    ///
    /// The loop ends when the transport closes. Only one loop may run per
    /// client; a second call fails with [`ClientError::AlreadyStarted`].
    pub async fn start(&self) -> Result<JoinHandle<()>> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyStarted);
        }
        for topic in self.topics.inbound() {
            if let Err(e) = self.transport.subscribe(&topic).await {
                self.started.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        }

        let transport = Arc::clone(&self.transport);
        let router = Arc::clone(&self.router);
        info!(namespace = %self.config.namespace, "client started");

        Ok(tokio::spawn(async move {
            loop {
                match transport.recv().await {
                    Ok(frame) => {
                        router.route(&frame);
                    }
                    Err(e) => {
                        info!(error = %e, "routing loop stopped");
                        break;
                    }
                }
            }
        }))
    }

    /// Route a single frame outside the routing loop.
    pub fn route(&self, frame: &Frame) -> RouteOutcome {
        self.router.route(frame)
    }

    /// Sign and publish a command, tracking the given watches.
    ///
    /// Without watches the command resolves as soon as it is published.
    pub async fn submit_command(
        &self,
        node: &str,
        action: Action,
        payload: Value,
        watches: Vec<PathTuple>,
    ) -> Result<PendingCommand> {
        self.fleet.check(node)?;

        let command = CommandEnvelope::new(&self.config.initiator_id, node, action, payload);
        let envelope = self.identity.sign(&command.to_value())?;
        let bytes = Bytes::from(envelope.to_json());
        let topic = self.topics.node_config(node);
        let session_id = command.session_id.clone();

        let (tx, rx) = oneshot::channel();
        let pending = PendingCommand {
            session_id: session_id.clone(),
            receiver: rx,
        };

        if watches.is_empty() {
            self.transport.publish(&topic, bytes).await?;
            let outcome = CommandOutcome {
                session_id: session_id.clone(),
                action: command.action,
                notifications: Vec::new(),
                node_snapshot: self.cache.node_info(node),
            };
            let _ = tx.send(Ok(outcome));
            debug!(session_id = %session_id, node = %node, "command published");
            return Ok(pending);
        }

        // Registered before publishing so a fast reply cannot be missed
        let sender: Arc<Mutex<Option<OutcomeSender>>> = Arc::new(Mutex::new(Some(tx)));
        let on_success = Arc::clone(&sender);
        let on_fail = Arc::clone(&sender);
        let mut request = TrackedRequest::new(
            &session_id,
            command.action,
            Box::new(move |outcome| {
                if let Some(tx) = on_success.lock().take() {
                    let _ = tx.send(Ok(outcome));
                }
            }),
            Box::new(move |error| {
                if let Some(tx) = on_fail.lock().take() {
                    let _ = tx.send(Err(error));
                }
            }),
        );
        for path in watches {
            request.watch(path);
        }
        self.requests.register(request);
        // Armed before publishing: the request must expire even if this future is dropped
        self.requests.arm_timers(
            &session_id,
            self.config.first_response_timeout(),
            self.config.ceiling_timeout(),
        );

        if let Err(e) = self.transport.publish(&topic, bytes).await {
            self.requests.destroy(&session_id);
            return Err(e.into());
        }
        debug!(session_id = %session_id, node = %node, "command published, awaiting notifications");

        Ok(pending)
    }

    /// Sign, publish and wait for the outcome.
    pub async fn send_command(
        &self,
        node: &str,
        action: Action,
        payload: Value,
        watches: Vec<PathTuple>,
    ) -> Result<CommandOutcome> {
        self.submit_command(node, action, payload, watches)
            .await?
            .outcome()
            .await
    }

    /// Create or replace a pipeline. `config` must carry its `NAME`.
    pub async fn update_pipeline_config(
        &self,
        node: &str,
        config: Value,
    ) -> Result<CommandOutcome> {
        let name = pipeline_name(&config)?;
        let watch = PathTuple::pipeline(node, &name);
        self.send_command(node, Action::UpdateConfig, config, vec![watch])
            .await
    }

    /// Stop and remove a pipeline.
    pub async fn delete_pipeline(&self, node: &str, pipeline: &str) -> Result<CommandOutcome> {
        self.send_command(
            node,
            Action::DeleteConfig,
            Value::String(pipeline.to_string()),
            vec![PathTuple::pipeline(node, pipeline)],
        )
        .await
    }

    /// Stop a pipeline and archive its config on the node.
    pub async fn archive_pipeline(&self, node: &str, pipeline: &str) -> Result<CommandOutcome> {
        self.send_command(
            node,
            Action::ArchiveConfig,
            Value::String(pipeline.to_string()),
            vec![PathTuple::pipeline(node, pipeline)],
        )
        .await
    }

    /// Change the config of one plugin instance.
    pub async fn update_instance_config(
        &self,
        node: &str,
        update: InstanceUpdate,
    ) -> Result<CommandOutcome> {
        let watch = update.path(node);
        self.send_command(
            node,
            Action::UpdatePipelineInstance,
            update.to_value(),
            vec![watch],
        )
        .await
    }

    /// Change several plugin instances with one command.
    pub async fn batch_update_instances(
        &self,
        node: &str,
        updates: Vec<InstanceUpdate>,
    ) -> Result<CommandOutcome> {
        let watches = updates.iter().map(|u| u.path(node)).collect();
        let payload = Value::Array(updates.iter().map(InstanceUpdate::to_value).collect());
        self.send_command(node, Action::BatchUpdatePipelineInstance, payload, watches)
            .await
    }

    /// Restart the node's execution engine.
    pub async fn restart_node(&self, node: &str) -> Result<CommandOutcome> {
        self.send_command(node, Action::Restart, json!({}), Vec::new())
            .await
    }

    /// Shut the node's execution engine down.
    pub async fn stop_node(&self, node: &str) -> Result<CommandOutcome> {
        self.send_command(node, Action::Stop, json!({}), Vec::new())
            .await
    }

    /// Ask the node for a heartbeat, full or timers only.
    pub async fn request_heartbeat(&self, node: &str, full: bool) -> Result<CommandOutcome> {
        let action = if full {
            Action::FullHeartbeat
        } else {
            Action::TimersOnlyHeartbeat
        };
        self.send_command(node, action, json!({}), Vec::new()).await
    }

    /// The client's address, if an identity is loaded.
    pub fn address(&self) -> Result<&Address> {
        Ok(self.identity.get()?.address())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn cache(&self) -> &Arc<NodeStateCache> {
        &self.cache
    }

    pub fn requests(&self) -> &RequestRegistry {
        &self.requests
    }

    /// Formatters used by the router; new ones may be registered at any time.
    pub fn formatters(&self) -> &Arc<FormatterRegistry> {
        &self.formatters
    }

    /// Stream of inbound traffic.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Payloads from plugins with this signature.
    pub fn subscribe_payloads(&self, signature: &str) -> mpsc::Receiver<EdgeMessage> {
        self.events.subscribe_payloads(signature)
    }
}

fn pipeline_name(config: &Value) -> Result<String> {
    config
        .get("NAME")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .ok_or_else(|| ClientError::Config("pipeline config without NAME".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgemesh_core::Identity;
    use edgemesh_net::{ConnectOptions, MemoryBroker, MemoryTransport};
    use std::time::Duration;

    async fn client(identity: IdentitySlot, config: ClientConfig) -> Client<MemoryTransport> {
        let broker = MemoryBroker::new();
        let transport = broker
            .connect(&ConnectOptions {
                client_id: "client".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        Client::new(identity, transport, config).unwrap()
    }

    #[tokio::test]
    async fn test_no_identity() {
        let client = client(IdentitySlot::empty(), ClientConfig::default()).await;
        assert!(client.address().is_err());
        let result = client.restart_node("node-1").await;
        assert!(matches!(
            result,
            Err(ClientError::Core(edgemesh_core::CoreError::NoIdentity))
        ));
    }

    #[tokio::test]
    async fn test_fleet_check_before_publish() {
        let config = ClientConfig {
            fleet: Some(vec!["node-1".into()]),
            ..Default::default()
        };
        let client = client(Identity::generate().into(), config).await;
        let result = client.restart_node("node-2").await;
        assert!(matches!(
            result,
            Err(ClientError::Net(NetError::FleetMembership(node))) if node == "node-2"
        ));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_command_without_watches_resolves() {
        let client = client(Identity::generate().into(), ClientConfig::default()).await;
        let outcome = client.request_heartbeat("node-1", true).await.unwrap();
        assert_eq!(outcome.action, Action::FullHeartbeat);
        assert!(outcome.notifications.is_empty());
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_config_needs_name() {
        let client = client(Identity::generate().into(), ClientConfig::default()).await;
        let result = client
            .update_pipeline_config("node-1", json!({"TYPE": "VideoStream"}))
            .await;
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[tokio::test]
    async fn test_second_start_fails() {
        let client = client(Identity::generate().into(), ClientConfig::default()).await;
        let handle = client.start().await.unwrap();
        assert!(matches!(
            client.start().await,
            Err(ClientError::AlreadyStarted)
        ));
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_publish_still_expires() {
        let broker = MemoryBroker::new();
        let options = |id: &str| ConnectOptions {
            client_id: id.into(),
            ..Default::default()
        };
        let client = Client::new(
            Identity::generate(),
            broker.connect(&options("client")).await.unwrap(),
            ClientConfig::default(),
        )
        .unwrap();

        // A node that never reads its config topic
        let node = broker.connect(&options("node-1")).await.unwrap();
        node.subscribe("edgemesh/node-1/config").await.unwrap();
        loop {
            let publish = client.request_heartbeat("node-1", false);
            if tokio::time::timeout(Duration::from_millis(10), publish)
                .await
                .is_err()
            {
                break;
            }
        }

        let blocked = client.submit_command(
            "node-1",
            Action::UpdateConfig,
            json!({"NAME": "cam-1"}),
            vec![PathTuple::pipeline("node-1", "cam-1")],
        );
        assert!(tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .is_err());
        assert_eq!(client.requests().len(), 1);

        tokio::time::sleep(client.config().ceiling_timeout()).await;
        tokio::task::yield_now().await;
        assert!(client.requests().is_empty());
    }

    #[test]
    fn test_instance_update_payload() {
        let update = InstanceUpdate {
            pipeline: "cam-1".into(),
            signature: "DETECTOR".into(),
            instance_id: "det-1".into(),
            config: json!({"THRESHOLD": 0.7}),
        };
        assert_eq!(
            update.path("node-1"),
            PathTuple::instance("node-1", "cam-1", "DETECTOR", "det-1")
        );
        assert_eq!(update.to_value()["INSTANCE_CONFIG"]["THRESHOLD"], json!(0.7));
    }
}
