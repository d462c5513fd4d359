// ABOUTME: Candidate route resolution: tries each guessed path shape until one answers.
// ABOUTME: A 404 advances to the next candidate; any other failure stops resolution immediately.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use waypoint_core::{CandidateRequest, EndpointConfig, Method, RouteError, normalize_prefix};

use crate::transport::{ApiResponse, HttpTransport, Transport, TransportError};

/// Why a candidate request could not be satisfied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("invalid candidate request: {0}")]
    Route(#[from] RouteError),

    /// The server answered with a non-404 error status.
    #[error("{0}")]
    Operation(TransportError),

    /// No response at all (connection refused, timeout, ...).
    #[error("{0}")]
    Transport(TransportError),

    /// Every candidate answered 404. `last` is the final miss.
    #[error("no route matched {method} after {} attempts; last: {last}", .attempts.len())]
    Exhausted {
        method: Method,
        attempts: Vec<String>,
        last: TransportError,
    },
}

impl ResolveError {
    fn source_error(&self) -> Option<&TransportError> {
        match self {
            ResolveError::Route(_) => None,
            ResolveError::Operation(e) | ResolveError::Transport(e) => Some(e),
            ResolveError::Exhausted { last, .. } => Some(last),
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.source_error().and_then(TransportError::status)
    }

    pub fn body(&self) -> Option<&Value> {
        self.source_error().and_then(TransportError::body)
    }

    pub fn server_message(&self) -> Option<String> {
        self.source_error().and_then(TransportError::server_message)
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ResolveError::Transport(_))
    }
}

/// Executes candidate requests against a transport, prefixed form first.
#[derive(Clone)]
pub struct CandidateResolver {
    transport: Arc<dyn Transport>,
    route_prefix: String,
}

impl CandidateResolver {
    pub fn new(transport: Arc<dyn Transport>, route_prefix: &str) -> Self {
        Self {
            transport,
            route_prefix: normalize_prefix(Some(route_prefix)),
        }
    }

    /// Build the production stack: an HTTP transport bound to the config.
    pub fn from_config(config: &EndpointConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport), &config.route_prefix))
    }

    pub fn route_prefix(&self) -> &str {
        &self.route_prefix
    }

    /// Concrete paths `execute` would try, in order, without any I/O.
    pub fn plan(&self, request: &CandidateRequest) -> Result<Vec<String>, RouteError> {
        request.attempt_paths(&self.route_prefix)
    }

    /// Try each candidate path in order and return the first success.
    pub async fn execute(&self, request: &CandidateRequest) -> Result<ApiResponse, ResolveError> {
        let attempts = self.plan(request)?;
        let mut last_miss: Option<TransportError> = None;

        for (index, path) in attempts.iter().enumerate() {
            let result = self
                .transport
                .send(
                    request.method,
                    path,
                    request.payload.as_ref(),
                    &request.query,
                )
                .await;

            match result {
                Ok(response) => {
                    if index > 0 {
                        tracing::debug!(
                            method = %request.method,
                            path = %path,
                            attempt = index + 1,
                            "resolved route after misses"
                        );
                    }
                    return Ok(response);
                }
                Err(err) if err.is_not_found() => {
                    tracing::debug!(method = %request.method, path = %path, "route miss, trying next candidate");
                    last_miss = Some(err);
                }
                Err(err @ TransportError::Status { .. }) => return Err(ResolveError::Operation(err)),
                Err(err) => return Err(ResolveError::Transport(err)),
            }
        }

        // `plan` never returns an empty list, so at least one miss was recorded.
        let last = last_miss.ok_or(ResolveError::Route(RouteError::NoCandidates))?;
        tracing::debug!(method = %request.method, attempts = attempts.len(), "all candidates missed");
        Err(ResolveError::Exhausted {
            method: request.method,
            attempts,
            last,
        })
    }
}
