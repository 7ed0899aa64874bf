//! Command correlation.
//!
//! A command published to a node is acknowledged asynchronously by one or
//! more notifications. A [`TrackedRequest`] holds one watch per expected
//! notification and resolves once every watch is satisfied, or fails when
//! either of its two timers fires first.
//!
//! The [`RequestRegistry`] owns the open requests, indexes them by node and
//! by session id, and arms the timers. Callbacks always run after the
//! registry lock is released.
//!
//! ## Lifecycle
//!
//! ```text
//! Pending ──all watches matched──▶ Satisfied
//!    │
//!    ├──first-response or ceiling timer──▶ TimedOut
//!    └──EXCEPTION notification on a watch──▶ Rejected
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use edgemesh_core::PathTuple;
use edgemesh_state::{NodeSnapshot, NodeStateCache};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::NetError;
use crate::messages::{Action, EdgeMessage};

/// Called once with the outcome of a satisfied request.
pub type SuccessCallback = Box<dyn FnOnce(CommandOutcome) + Send>;

/// Called once with the reason a request failed.
pub type FailureCallback = Box<dyn FnOnce(NetError) + Send>;

/// What a satisfied command produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub session_id: String,
    pub action: Action,
    /// One notification per watch, in watch order.
    pub notifications: Vec<EdgeMessage>,
    /// The target node's snapshot when the request resolved.
    pub node_snapshot: Option<NodeSnapshot>,
}

/// Lifecycle state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Satisfied,
    TimedOut,
    Rejected,
}

/// Which timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// No watch matched within the first-response window.
    FirstResponse,
    /// The request did not complete within the ceiling.
    Ceiling,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstResponse => f.write_str("no response"),
            Self::Ceiling => f.write_str("request did not complete"),
        }
    }
}

/// An expected notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Watch {
    pub path: PathTuple,
    pub matched: Option<EdgeMessage>,
}

impl Watch {
    pub fn is_satisfied(&self) -> bool {
        self.matched.is_some()
    }
}

/// A terminal transition whose callback has not run yet.
#[must_use = "the request callback only runs when the completion is run"]
pub enum Completion {
    Success(SuccessCallback, CommandOutcome),
    Failure(FailureCallback, NetError),
}

impl Completion {
    /// Run the callback.
    pub fn run(self) {
        match self {
            Self::Success(callback, outcome) => callback(outcome),
            Self::Failure(callback, error) => callback(error),
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(_, outcome) => f.debug_tuple("Success").field(outcome).finish(),
            Self::Failure(_, error) => f.debug_tuple("Failure").field(error).finish(),
        }
    }
}

/// Effect of offering a message to a request.
#[derive(Debug)]
pub enum Progress {
    /// No open watch matched.
    Ignored,
    /// A watch matched; others remain.
    Matched,
    /// The request reached a terminal state.
    Completed(Completion),
}

/// One in-flight command.
pub struct TrackedRequest {
    session_id: String,
    action: Action,
    watches: Vec<Watch>,
    state: RequestState,
    first_response_timer: Option<JoinHandle<()>>,
    ceiling_timer: Option<JoinHandle<()>>,
    on_success: Option<SuccessCallback>,
    on_fail: Option<FailureCallback>,
}

impl TrackedRequest {
    /// A pending request with no watches.
    pub fn new(
        session_id: impl Into<String>,
        action: Action,
        on_success: SuccessCallback,
        on_fail: FailureCallback,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            action,
            watches: Vec::new(),
            state: RequestState::Pending,
            first_response_timer: None,
            ceiling_timer: None,
            on_success: Some(on_success),
            on_fail: Some(on_fail),
        }
    }

    /// Expect a notification under `path`.
    pub fn watch(&mut self, path: PathTuple) -> &mut Self {
        self.watches.push(Watch {
            path,
            matched: None,
        });
        self
    }

    /// Hand over the two timer tasks. Both are aborted on the first terminal
    /// transition; the first-response timer also when any watch matches.
    /// Timers handed over earlier are aborted and replaced.
    pub fn set_timeout_ids(&mut self, first_response: JoinHandle<()>, ceiling: JoinHandle<()>) {
        self.cancel_timers();
        if self.is_closed() {
            first_response.abort();
            ceiling.abort();
            return;
        }
        if self.watches.iter().any(Watch::is_satisfied) {
            first_response.abort();
        } else {
            self.first_response_timer = Some(first_response);
        }
        self.ceiling_timer = Some(ceiling);
    }

    /// Offer a notification.
    pub fn process(&mut self, message: &EdgeMessage) -> Progress {
        if self.is_closed() {
            return Progress::Ignored;
        }

        let Some(watch) = self
            .watches
            .iter_mut()
            .find(|w| !w.is_satisfied() && w.path.matches(&message.path))
        else {
            return Progress::Ignored;
        };

        if message.is_exception() {
            let (code, message) = message.notification_details();
            return Progress::Completed(self.fail(
                RequestState::Rejected,
                NetError::Rejected { code, message },
            ));
        }

        watch.matched = Some(message.clone());
        if let Some(timer) = self.first_response_timer.take() {
            timer.abort();
        }

        if self.watches.iter().all(Watch::is_satisfied) {
            self.state = RequestState::Satisfied;
            self.cancel_timers();
            let outcome = CommandOutcome {
                session_id: self.session_id.clone(),
                action: self.action.clone(),
                notifications: self
                    .watches
                    .iter()
                    .filter_map(|w| w.matched.clone())
                    .collect(),
                node_snapshot: None,
            };
            self.on_fail = None;
            match self.on_success.take() {
                Some(callback) => Progress::Completed(Completion::Success(callback, outcome)),
                None => Progress::Matched,
            }
        } else {
            Progress::Matched
        }
    }

    /// Fire a timer.
    ///
    /// Returns `None` if the request is already closed, or if the
    /// first-response timer fires after a watch matched.
    pub fn time_out(&mut self, kind: TimeoutKind) -> Option<Completion> {
        if self.is_closed() {
            return None;
        }
        if kind == TimeoutKind::FirstResponse && self.watches.iter().any(Watch::is_satisfied) {
            return None;
        }
        let error = NetError::Timeout(format!("{} ({})", kind, self.session_id));
        Some(self.fail(RequestState::TimedOut, error))
    }

    fn fail(&mut self, state: RequestState, error: NetError) -> Completion {
        self.state = state;
        self.cancel_timers();
        self.on_success = None;
        let callback = self.on_fail.take().unwrap_or_else(|| Box::new(|_| {}));
        Completion::Failure(callback, error)
    }

    fn cancel_timers(&mut self) {
        for timer in [self.first_response_timer.take(), self.ceiling_timer.take()]
            .into_iter()
            .flatten()
        {
            timer.abort();
        }
    }

    /// Satisfied, timed out or rejected.
    pub fn is_closed(&self) -> bool {
        self.state != RequestState::Pending
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn watches(&self) -> &[Watch] {
        &self.watches
    }

    fn nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self.watches.iter().map(|w| w.path.node.clone()).collect();
        nodes.sort();
        nodes.dedup();
        nodes
    }
}

impl Drop for TrackedRequest {
    fn drop(&mut self) {
        self.cancel_timers();
    }
}

impl fmt::Debug for TrackedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedRequest")
            .field("session_id", &self.session_id)
            .field("action", &self.action)
            .field("state", &self.state)
            .field("watches", &self.watches)
            .finish()
    }
}

/// Read-only view of an open request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSummary {
    pub session_id: String,
    pub action: Action,
    pub pending: Vec<PathTuple>,
}

#[derive(Default)]
struct RegistryInner {
    requests: HashMap<String, TrackedRequest>,
    /// node → open session ids in creation order.
    by_node: HashMap<String, Vec<String>>,
}

impl RegistryInner {
    fn remove(&mut self, session_id: &str) -> Option<TrackedRequest> {
        let request = self.requests.remove(session_id)?;
        for node in request.nodes() {
            if let Some(sessions) = self.by_node.get_mut(&node) {
                sessions.retain(|s| s != session_id);
                if sessions.is_empty() {
                    self.by_node.remove(&node);
                }
            }
        }
        Some(request)
    }
}

/// Open requests, indexed by node and session.
#[derive(Clone)]
pub struct RequestRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    cache: Arc<NodeStateCache>,
}

impl RequestRegistry {
    pub fn new(cache: Arc<NodeStateCache>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner::default())),
            cache,
        }
    }

    /// Start tracking a request.
    ///
    /// A request with the same session id replaces the old one, which is
    /// dropped without running its callbacks.
    pub fn register(&self, request: TrackedRequest) {
        let session_id = request.session_id().to_string();
        let mut inner = self.inner.lock();
        inner.remove(&session_id);
        for node in request.nodes() {
            inner.by_node.entry(node).or_default().push(session_id.clone());
        }
        debug!(session_id = %session_id, watches = request.watches().len(), "request registered");
        inner.requests.insert(session_id, request);
    }

    /// Spawn the two timers for an open request.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm_timers(&self, session_id: &str, first_response: Duration, ceiling: Duration) {
        let first = self.spawn_timer(session_id, TimeoutKind::FirstResponse, first_response);
        let max = self.spawn_timer(session_id, TimeoutKind::Ceiling, ceiling);

        let mut inner = self.inner.lock();
        match inner.requests.get_mut(session_id) {
            Some(request) => request.set_timeout_ids(first, max),
            None => {
                first.abort();
                max.abort();
            }
        }
    }

    fn spawn_timer(&self, session_id: &str, kind: TimeoutKind, after: Duration) -> JoinHandle<()> {
        let registry: Weak<Mutex<RegistryInner>> = Arc::downgrade(&self.inner);
        let cache = Arc::clone(&self.cache);
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(inner) = registry.upgrade() {
                RequestRegistry { inner, cache }.expire(&session_id, kind);
            }
        })
    }

    /// Fire a timer for a request. Returns whether the request failed.
    pub fn expire(&self, session_id: &str, kind: TimeoutKind) -> bool {
        let completion = {
            let mut inner = self.inner.lock();
            let Some(request) = inner.requests.get_mut(session_id) else {
                return false;
            };
            let completion = request.time_out(kind);
            if completion.is_some() {
                inner.remove(session_id);
            }
            completion
        };

        match completion {
            Some(completion) => {
                warn!(session_id = %session_id, kind = ?kind, "request timed out");
                completion.run();
                true
            }
            None => false,
        }
    }

    /// Offer a notification to the open requests of its node.
    ///
    /// If the notification's session id names an open request for the same
    /// node, only that request sees it. Returns the number of requests that
    /// reached a terminal state.
    pub fn process(&self, message: &EdgeMessage) -> usize {
        let completions = {
            let mut inner = self.inner.lock();
            let Some(sessions) = inner.by_node.get(message.node()) else {
                return 0;
            };

            let candidates: Vec<String> = match &message.session_id {
                Some(session) if sessions.contains(session) => vec![session.clone()],
                _ => sessions.clone(),
            };

            let mut completions = Vec::new();
            for session_id in candidates {
                let Some(request) = inner.requests.get_mut(&session_id) else {
                    continue;
                };
                if let Progress::Completed(completion) = request.process(message) {
                    inner.remove(&session_id);
                    completions.push((session_id, completion));
                }
            }
            completions
        };

        let count = completions.len();
        for (session_id, completion) in completions {
            match completion {
                Completion::Success(callback, mut outcome) => {
                    outcome.node_snapshot = self.cache.node_info(message.node());
                    info!(session_id = %session_id, action = %outcome.action, "request satisfied");
                    callback(outcome);
                }
                failure => {
                    warn!(session_id = %session_id, "request rejected by node");
                    failure.run();
                }
            }
        }
        count
    }

    /// Open requests on the path's node with a watch covering the path.
    pub fn find(&self, path: &PathTuple) -> Vec<RequestSummary> {
        let inner = self.inner.lock();
        let Some(sessions) = inner.by_node.get(&path.node) else {
            return Vec::new();
        };
        sessions
            .iter()
            .filter_map(|s| inner.requests.get(s))
            .filter(|r| r.watches().iter().any(|w| w.path.matches(path)))
            .map(summarize)
            .collect()
    }

    /// The open request with this session id.
    pub fn get(&self, session_id: &str) -> Option<RequestSummary> {
        self.inner.lock().requests.get(session_id).map(summarize)
    }

    /// Drop a request without running its callbacks. Idempotent.
    pub fn destroy(&self, session_id: &str) -> bool {
        let removed = self.inner.lock().remove(session_id);
        removed.is_some()
    }

    /// Drop every open request with a watch covering the path. Idempotent.
    pub fn destroy_path(&self, path: &PathTuple) -> usize {
        let sessions: Vec<String> = self
            .find(path)
            .into_iter()
            .map(|summary| summary.session_id)
            .collect();
        let mut inner = self.inner.lock();
        sessions
            .iter()
            .filter(|s| inner.remove(s).is_some())
            .count()
    }

    /// Number of open requests.
    pub fn len(&self) -> usize {
        self.inner.lock().requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn summarize(request: &TrackedRequest) -> RequestSummary {
    RequestSummary {
        session_id: request.session_id().to_string(),
        action: request.action().clone(),
        pending: request
            .watches()
            .iter()
            .filter(|w| !w.is_satisfied())
            .map(|w| w.path.clone())
            .collect(),
    }
}
