//! Scripted transport for synchronizer tests.
//!
//! Routes are keyed by method and path. A path registered without a query
//! string also matches calls that carry one, unless a route with the exact
//! query is registered too. Each route holds a queue of replies; the last
//! reply repeats once the queue drains. Unmatched calls reject with a 404.

use async_trait::async_trait;
use casework_core::effects::{Method, RequestOptions, TransportEffects, TransportError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;

// ============================================================================
// Gates
// ============================================================================

/// Latch holding gated replies open until the test releases them.
#[derive(Debug, Clone)]
pub struct Gate {
    tx: Arc<watch::Sender<bool>>,
}

impl Gate {
    /// A closed gate.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Release every reply waiting on this gate. Idempotent.
    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`open`](Self::open) has been called.
    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Replies
// ============================================================================

/// One scripted response.
#[derive(Debug, Clone)]
pub struct Reply {
    result: Result<Value, TransportError>,
    gate: Option<Gate>,
    ignore_abort: bool,
}

impl Reply {
    /// 2xx with a JSON body.
    pub fn json(body: Value) -> Self {
        Self {
            result: Ok(body),
            gate: None,
            ignore_abort: false,
        }
    }

    /// 2xx with an empty body.
    pub fn empty() -> Self {
        Self::json(Value::Null)
    }

    /// Non-2xx with a message.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::error(TransportError::Status {
            status,
            message: message.into(),
        })
    }

    /// Arbitrary transport rejection.
    pub fn error(error: TransportError) -> Self {
        Self {
            result: Err(error),
            gate: None,
            ignore_abort: false,
        }
    }

    /// Hold the reply until `gate` opens.
    pub fn gated(mut self, gate: &Gate) -> Self {
        self.gate = Some(gate.clone());
        self
    }

    /// Deliver the reply even if the request's signal aborts, modelling a
    /// transport that does not honor cancellation.
    pub fn ignoring_abort(mut self) -> Self {
        self.ignore_abort = true;
        self
    }
}

// ============================================================================
// Transport
// ============================================================================

/// A call observed by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// HTTP method.
    pub method: Method,
    /// Request path, query included.
    pub path: String,
    /// JSON body, if one was sent.
    pub body: Option<Value>,
    /// Whether the caller attached an abort signal
    pub had_signal: bool,
}

#[derive(Debug)]
struct Route {
    method: Method,
    path: String,
    replies: VecDeque<Reply>,
}

#[derive(Debug, Default)]
struct MockState {
    routes: Vec<Route>,
    calls: Vec<RecordedCall>,
}

impl MockState {
    fn next_reply(&mut self, method: Method, path: &str) -> Option<Reply> {
        let bare = path.split('?').next().unwrap_or(path);
        let index = self
            .routes
            .iter()
            .position(|r| r.method == method && r.path == path)
            .or_else(|| {
                self.routes
                    .iter()
                    .position(|r| r.method == method && r.path == bare)
            })?;
        let replies = &mut self.routes[index].replies;
        if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        }
    }
}

/// In-memory [`TransportEffects`] driven by scripted replies.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Transport with no routes; every call 404s.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `method path`.
    pub fn respond(&self, method: Method, path: impl Into<String>, reply: Reply) -> &Self {
        let path = path.into();
        let mut state = self.state.lock();
        match state
            .routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
        {
            Some(route) => route.replies.push_back(reply),
            None => state.routes.push(Route {
                method,
                path,
                replies: VecDeque::from([reply]),
            }),
        }
        self
    }

    /// Replace every queued reply for `method path`.
    pub fn reset_route(&self, method: Method, path: impl Into<String>, reply: Reply) -> &Self {
        let path = path.into();
        self.state
            .lock()
            .routes
            .retain(|r| !(r.method == method && r.path == path));
        self.respond(method, path, reply)
    }

    /// Shorthand for a JSON `GET` reply.
    pub fn on_get(&self, path: impl Into<String>, body: Value) -> &Self {
        self.respond(Method::Get, path, Reply::json(body))
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Calls whose method matches and whose path starts with `prefix`.
    pub fn calls_to(&self, method: Method, prefix: &str) -> Vec<RecordedCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.method == method && c.path.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of calls matching [`calls_to`](Self::calls_to).
    pub fn count(&self, method: Method, prefix: &str) -> usize {
        self.calls_to(method, prefix).len()
    }

    /// Total number of calls.
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Forget recorded calls, keeping routes.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value, TransportError> {
        let reply = {
            let mut state = self.state.lock();
            state.calls.push(RecordedCall {
                method,
                path: path.to_string(),
                body,
                had_signal: options.signal.is_some(),
            });
            state.next_reply(method, path)
        };
        tracing::trace!(%method, path, matched = reply.is_some(), "mock transport call");

        let Some(reply) = reply else {
            return Err(TransportError::Status {
                status: 404,
                message: format!("no route for {method} {path}"),
            });
        };

        let signal = options.signal.filter(|_| !reply.ignore_abort);
        if let Some(gate) = &reply.gate {
            match &signal {
                Some(signal) => {
                    if signal.run(gate.wait()).await.is_none() {
                        return Err(TransportError::Aborted);
                    }
                }
                None => gate.wait().await,
            }
        }
        if signal.as_ref().is_some_and(|s| s.is_aborted()) {
            return Err(TransportError::Aborted);
        }
        reply.result
    }
}

#[async_trait]
impl TransportEffects for MockTransport {
    async fn get(&self, path: &str, options: RequestOptions) -> Result<Value, TransportError> {
        self.dispatch(Method::Get, path, None, options).await
    }

    async fn post(
        &self,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value, TransportError> {
        self.dispatch(Method::Post, path, body, options).await
    }

    async fn patch(
        &self,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value, TransportError> {
        self.dispatch(Method::Patch, path, body, options).await
    }

    async fn delete(&self, path: &str, options: RequestOptions) -> Result<Value, TransportError> {
        self.dispatch(Method::Delete, path, None, options).await
    }
}
