// ABOUTME: Test utilities for waypoint-client, including a scripted stub transport.
// ABOUTME: Used in tests to simulate backend route shapes without real HTTP calls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use ulid::Ulid;

use waypoint_core::Method;

use crate::diagnostics::TransportObserver;
use crate::transport::{ApiResponse, Transport, TransportError, classify};

/// One scripted reply for a method + path.
#[derive(Debug, Clone)]
pub enum Reply {
    Status { status: u16, body: Value },
    NetworkFailure(String),
}

/// A call the transport received, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub payload: Option<Value>,
    pub query: Vec<(String, String)>,
}

/// A stub transport that answers from a script keyed by method and path.
///
/// Unscripted routes answer 404. Scripting the same route more than once
/// queues the replies; the last one repeats forever.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a status reply for `method path`.
    pub fn respond(self, method: Method, path: &str, status: u16, body: Value) -> Self {
        self.push(method, path, Reply::Status { status, body });
        self
    }

    /// Queue a network-level failure (no response) for `method path`.
    pub fn fail(self, method: Method, path: &str, message: &str) -> Self {
        self.push(method, path, Reply::NetworkFailure(message.to_string()));
        self
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a reply on a transport that is already shared.
    pub fn push(&self, method: Method, path: &str, reply: Reply) {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        script
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// Drop any queued replies for `method path` and script a new one.
    pub fn replace(&self, method: Method, path: &str, reply: Reply) {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        script.insert((method, path.to_string()), VecDeque::from([reply]));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.path).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn next_reply(&self, method: Method, path: &str) -> Reply {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        let scripted = match script.get_mut(&(method, path.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        scripted.unwrap_or_else(|| Reply::Status {
            status: 404,
            body: json!({"message": format!("Cannot {method} {path}")}),
        })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        query: &[(String, String)],
    ) -> Result<ApiResponse, TransportError> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(RecordedCall {
            method,
            path: path.to_string(),
            payload: payload.cloned(),
            query: query.to_vec(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_reply(method, path) {
            Reply::Status { status, body } => classify(method, path, status, body),
            Reply::NetworkFailure(message) => Err(TransportError::Network {
                method,
                path: path.to_string(),
                message,
                timed_out: false,
            }),
        }
    }
}

/// Observer that records a one-line summary of every hook call.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, line: String) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(line);
    }
}

impl TransportObserver for RecordingObserver {
    fn on_request(&self, _request_id: Ulid, method: Method, url: &str) {
        self.record(format!("request {method} {url}"));
    }

    fn on_response(
        &self,
        _request_id: Ulid,
        method: Method,
        url: &str,
        status: u16,
        _elapsed: Duration,
    ) {
        self.record(format!("response {method} {url} {status}"));
    }

    fn on_error(&self, _request_id: Ulid, error: &TransportError, _elapsed: Duration) {
        self.record(format!("error {error}"));
    }
}
